//! River topology — the rooted tree of reaches.
//!
//! The network is built once per task from a `(child, parent)` edge list and
//! is immutable afterwards. Edges point child → parent, i.e. in the direction
//! of the water flow. The parent that never appears as a child is the sink
//! (the sea); it holds no habitats itself, so the reaches are exactly the
//! nodes `0..num_reaches` and the sink carries index `num_reaches`.
//!
//! Reaches are addressed by dense integer index throughout; parent/child
//! relations are stored as indices, never as owning references.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};

/// The immutable structure of the river: tree topology plus the per-task
/// constants that every state, model and estimator shares.
#[derive(Debug, Clone)]
pub struct RiverNetwork {
    /// Child → parent flow graph over all nodes including the sink.
    graph: DiGraph<usize, ()>,
    /// petgraph handle per node index.
    node_handles: Vec<NodeIndex>,
    /// Parent reach per reach, `None` for the root reach (its parent is the sink).
    parents: Vec<Option<usize>>,
    /// Child reaches per reach, in ascending index order.
    children: Vec<Vec<usize>>,
    /// The reach all other reaches drain into.
    root_reach: usize,
    /// Habitat slots per reach.
    reach_size: usize,
    /// Management budget per step.
    budget: f64,
    /// Reward floor for invalid or over-budget actions.
    penalty: f64,
}

impl RiverNetwork {
    /// Builds the network from `(child, parent)` index pairs.
    ///
    /// The edge list must describe a single tree: one sink node that never
    /// appears as a child, every other node a child exactly once, dense
    /// indices with the sink carrying the highest one, and no cycles.
    pub fn from_edge_list(
        edges: &[(usize, usize)],
        reach_size: usize,
        budget: f64,
        penalty: f64,
    ) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::MalformedTopology("empty edge list".into()));
        }
        if reach_size == 0 {
            return Err(Error::MalformedTopology("reach size must be positive".into()));
        }

        let num_nodes = edges
            .iter()
            .map(|&(c, p)| c.max(p))
            .max()
            .unwrap_or(0)
            + 1;

        // Child -> parent map over all nodes; the sink is the one node
        // that is never a child.
        let mut parent_of: Vec<Option<usize>> = vec![None; num_nodes];
        let mut seen_as_child = vec![false; num_nodes];
        for &(child, parent) in edges {
            if child == parent {
                return Err(Error::MalformedTopology(format!(
                    "self-loop at node {}",
                    child
                )));
            }
            if seen_as_child[child] {
                return Err(Error::MalformedTopology(format!(
                    "node {} has more than one parent",
                    child
                )));
            }
            seen_as_child[child] = true;
            parent_of[child] = Some(parent);
        }

        let sinks: Vec<usize> = (0..num_nodes).filter(|&n| !seen_as_child[n]).collect();
        let sink = match sinks.as_slice() {
            [s] => *s,
            [] => return Err(Error::MalformedTopology("no root node: every node is a child".into())),
            many => {
                return Err(Error::MalformedTopology(format!(
                    "multiple root candidates: {:?}",
                    many
                )))
            }
        };
        if sink != num_nodes - 1 {
            return Err(Error::MalformedTopology(format!(
                "sink node {} must carry the highest index ({})",
                sink,
                num_nodes - 1
            )));
        }

        let num_reaches = num_nodes - 1;

        let mut graph = DiGraph::new();
        let node_handles: Vec<NodeIndex> = (0..num_nodes).map(|i| graph.add_node(i)).collect();
        for &(child, parent) in edges {
            graph.add_edge(node_handles[child], node_handles[parent], ());
        }
        if is_cyclic_directed(&graph) {
            return Err(Error::MalformedTopology("edge list contains a cycle".into()));
        }

        // Every node must drain into the sink; with in-degree one and no
        // cycles this is equivalent to single-tree connectivity.
        for start in 0..num_reaches {
            let mut node = start;
            let mut hops = 0;
            while let Some(p) = parent_of[node] {
                node = p;
                hops += 1;
                if hops > num_nodes {
                    return Err(Error::MalformedTopology(format!(
                        "node {} does not reach the sink",
                        start
                    )));
                }
            }
            if node != sink {
                return Err(Error::MalformedTopology(format!(
                    "node {} drains into {} instead of the sink",
                    start, node
                )));
            }
        }

        let mut root_children: Vec<usize> = (0..num_reaches)
            .filter(|&n| parent_of[n] == Some(sink))
            .collect();
        let root_reach = match root_children.as_slice() {
            [r] => *r,
            _ => {
                root_children.sort_unstable();
                return Err(Error::MalformedTopology(format!(
                    "sink must have exactly one child reach, found {:?}",
                    root_children
                )));
            }
        };

        // Reach-level parent/child tables; the sink is not a reach.
        let mut parents = vec![None; num_reaches];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); num_reaches];
        for reach in 0..num_reaches {
            match parent_of[reach] {
                Some(p) if p != sink => {
                    parents[reach] = Some(p);
                    children[p].push(reach);
                }
                _ => {}
            }
        }
        for kids in &mut children {
            kids.sort_unstable();
        }

        Ok(Self {
            graph,
            node_handles,
            parents,
            children,
            root_reach,
            reach_size,
            budget,
            penalty,
        })
    }

    /// Number of reaches (habitat-bearing nodes, excluding the sink).
    pub fn num_reaches(&self) -> usize {
        self.parents.len()
    }

    /// Habitat slots per reach.
    pub fn reach_size(&self) -> usize {
        self.reach_size
    }

    /// Total habitat slots over the whole river.
    pub fn num_habitats(&self) -> usize {
        self.num_reaches() * self.reach_size
    }

    /// Management budget per step.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Reward floor for invalid or over-budget actions.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// The reach every other reach drains into.
    pub fn root_reach(&self) -> usize {
        self.root_reach
    }

    /// The parent reach, or `None` for the root reach.
    pub fn parent(&self, reach: usize) -> Option<usize> {
        self.parents[reach]
    }

    /// Child reaches in ascending index order.
    pub fn children(&self, reach: usize) -> &[usize] {
        &self.children[reach]
    }

    /// Sibling reaches: other children of the same parent.
    pub fn siblings(&self, reach: usize) -> Vec<usize> {
        match self.parents[reach] {
            Some(p) => self.children[p]
                .iter()
                .copied()
                .filter(|&c| c != reach)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Flow edges `(child, parent)` over reaches only, for inspection.
    pub fn reach_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = (0..self.num_reaches())
            .filter_map(|r| self.parents[r].map(|p| (r, p)))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// The underlying flow graph, including the sink node.
    pub fn graph(&self) -> &DiGraph<usize, ()> {
        &self.graph
    }

    /// petgraph handle for a node index.
    pub fn node_handle(&self, node: usize) -> NodeIndex {
        self.node_handles[node]
    }
}
