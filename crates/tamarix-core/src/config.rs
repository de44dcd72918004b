//! Task configuration — the one-time textual setup an external controller
//! hands over before the first observation.
//!
//! The format is a whitespace-separated keyword string:
//!
//! ```text
//! habitats 4 discount 0.9 rewards -10000 0 budget 100
//! edges (6, 7) (4, 6) (5, 6) (0, 4) (1, 4) (2, 5) (3, 5)
//! ```
//!
//! Edge pairs are `(child, parent)`. The penalty for invalid actions is the
//! reward-range minimum, as in the original task description.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topology::RiverNetwork;

/// Parsed per-task constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Habitat slots per reach.
    pub reach_size: usize,
    /// Discount factor handed to any planning layer.
    pub discount: f64,
    /// Minimum reward; doubles as the invalid-action penalty.
    pub reward_min: f64,
    /// Maximum reward.
    pub reward_max: f64,
    /// Management budget per step.
    pub budget: f64,
    /// `(child, parent)` flow edges.
    pub edges: Vec<(usize, usize)>,
}

impl TaskConfig {
    /// Parses the textual task configuration.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reach_size = None;
        let mut discount = None;
        let mut reward_min = None;
        let mut reward_max = None;
        let mut budget = None;
        let mut edges = Vec::new();

        let mut tokens = text.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            match token {
                "habitats" => reach_size = Some(parse_value(&mut tokens, "habitats")?),
                "discount" => discount = Some(parse_value(&mut tokens, "discount")?),
                "budget" => budget = Some(parse_value(&mut tokens, "budget")?),
                "rewards" => {
                    reward_min = Some(parse_value(&mut tokens, "rewards")?);
                    reward_max = Some(parse_value(&mut tokens, "rewards")?);
                }
                "edges" => {
                    // Consume "(c, p)" pairs (one or two tokens each) until a
                    // non-edge token shows up.
                    while tokens.peek().map_or(false, |t| t.starts_with('(')) {
                        let left = tokens.next().unwrap_or_default();
                        if left.ends_with(')') {
                            edges.push(parse_edge_single(left)?);
                        } else {
                            let right = tokens.next().ok_or_else(|| {
                                Error::MalformedConfig(format!("dangling edge token {:?}", left))
                            })?;
                            edges.push(parse_edge(left, right)?);
                        }
                    }
                }
                other => {
                    return Err(Error::MalformedConfig(format!(
                        "unknown keyword {:?}",
                        other
                    )))
                }
            }
        }

        let reach_size: f64 = reach_size
            .ok_or_else(|| Error::MalformedConfig("missing 'habitats'".into()))?;
        if reach_size.fract() != 0.0 || reach_size < 1.0 {
            return Err(Error::MalformedConfig(format!(
                "'habitats' must be a positive integer, got {}",
                reach_size
            )));
        }
        if edges.is_empty() {
            return Err(Error::MalformedConfig("missing 'edges'".into()));
        }

        Ok(Self {
            reach_size: reach_size as usize,
            discount: discount.ok_or_else(|| Error::MalformedConfig("missing 'discount'".into()))?,
            reward_min: reward_min.ok_or_else(|| Error::MalformedConfig("missing 'rewards'".into()))?,
            reward_max: reward_max.ok_or_else(|| Error::MalformedConfig("missing 'rewards'".into()))?,
            budget: budget.ok_or_else(|| Error::MalformedConfig("missing 'budget'".into()))?,
            edges,
        })
    }

    /// Builds the river network this configuration describes.
    pub fn build_network(&self) -> Result<RiverNetwork> {
        RiverNetwork::from_edge_list(&self.edges, self.reach_size, self.budget, self.reward_min)
    }
}

fn parse_value<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    keyword: &str,
) -> Result<f64> {
    let token = tokens
        .next()
        .ok_or_else(|| Error::MalformedConfig(format!("'{}' without a value", keyword)))?;
    token
        .parse()
        .map_err(|_| Error::MalformedConfig(format!("bad value {:?} for '{}'", token, keyword)))
}

fn parse_edge_single(token: &str) -> Result<(usize, usize)> {
    let inner = token.trim_start_matches('(').trim_end_matches(')');
    let (child, parent) = inner
        .split_once(',')
        .ok_or_else(|| Error::MalformedConfig(format!("bad edge token {:?}", token)))?;
    let child = child
        .trim()
        .parse()
        .map_err(|_| Error::MalformedConfig(format!("bad edge token {:?}", token)))?;
    let parent = parent
        .trim()
        .parse()
        .map_err(|_| Error::MalformedConfig(format!("bad edge token {:?}", token)))?;
    Ok((child, parent))
}

fn parse_edge(left: &str, right: &str) -> Result<(usize, usize)> {
    let child = left
        .trim_start_matches('(')
        .trim_end_matches(',')
        .parse()
        .map_err(|_| Error::MalformedConfig(format!("bad edge token {:?}", left)))?;
    let parent = right
        .trim_end_matches(')')
        .parse()
        .map_err(|_| Error::MalformedConfig(format!("bad edge token {:?}", right)))?;
    Ok((child, parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCHING: &str = "habitats 4 discount 0.9 rewards -10000 0 budget 100 \
                             edges (6, 7) (4, 6) (5, 6) (0, 4) (1, 4) (2, 5) (3, 5)";

    #[test]
    fn parses_branching_task() {
        let config = TaskConfig::parse(BRANCHING).unwrap();
        assert_eq!(config.reach_size, 4);
        assert_eq!(config.budget, 100.0);
        assert_eq!(config.reward_min, -10_000.0);
        assert_eq!(config.edges.len(), 7);
        assert_eq!(config.edges[0], (6, 7));

        let net = config.build_network().unwrap();
        assert_eq!(net.num_reaches(), 7);
        assert_eq!(net.penalty(), -10_000.0);
        assert_eq!(net.budget(), 100.0);
    }

    #[test]
    fn parses_tight_edge_spacing() {
        let config =
            TaskConfig::parse("habitats 2 discount 0.9 rewards -5 5 budget 10 edges (1,0) (0,2)")
                .unwrap();
        assert_eq!(config.edges, vec![(1, 0), (0, 2)]);
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(TaskConfig::parse("habitats 4 discount 0.9").is_err());
        assert!(TaskConfig::parse("").is_err());
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert!(TaskConfig::parse("habitats 4 turtles 9").is_err());
    }
}
