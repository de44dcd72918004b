//! Population-based search over the transition model's parameter space.
//!
//! Chromosomes are flat gene vectors in [0, 1] mapping onto [`EnvParams`].
//! Fitness scores a candidate model against every recorded transition in the
//! corpus; selection is by tournament with the fittest individual carried
//! over unchanged each generation.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use tamarix_core::error::{Error, Result};
use tamarix_core::model::{EnvParams, TransitionModel};
use tamarix_core::topology::RiverNetwork;

use crate::corpus::TrajectoryCorpus;

/// A candidate parameter encoding: genes in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    genes: Vec<f64>,
}

impl Chromosome {
    pub fn from_genes(genes: Vec<f64>) -> Self {
        Self { genes }
    }

    /// Uniform random chromosome of the given length.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self {
            genes: (0..len).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Perturbs each gene with the given probability.
    ///
    /// The delta is a uniform draw in [-intensity, intensity]; the result is
    /// clamped to [0, 1] rather than wrapped.
    pub fn mutate<R: Rng + ?Sized>(&mut self, probability: f64, intensity: f64, rng: &mut R) {
        for gene in &mut self.genes {
            if rng.gen::<f64>() < probability {
                let delta = (rng.gen::<f64>() * 2.0 - 1.0) * intensity;
                *gene = (*gene + delta).clamp(0.0, 1.0);
            }
        }
    }

    /// Single-point crossover with another chromosome of the same length.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> (Self, Self) {
        debug_assert_eq!(self.genes.len(), other.genes.len());
        if self.genes.len() < 2 {
            return (self.clone(), other.clone());
        }
        let point = rng.gen_range(1..self.genes.len());
        let mut first = self.genes[..point].to_vec();
        first.extend_from_slice(&other.genes[point..]);
        let mut second = other.genes[..point].to_vec();
        second.extend_from_slice(&self.genes[point..]);
        (Self { genes: first }, Self { genes: second })
    }
}

/// Tuning knobs for [`GeneticSearch`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Individuals per generation.
    pub population_size: usize,
    /// Tournament size for parent selection.
    pub tournament_size: usize,
    /// Per-gene mutation probability.
    pub mutation_probability: f64,
    /// Half-width of the mutation delta.
    pub mutation_intensity: f64,
    /// Top individuals copied unchanged into the next generation.
    pub elites: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: 200,
            tournament_size: 3,
            mutation_probability: 0.1,
            mutation_intensity: 0.3,
            elites: 1,
        }
    }
}

/// Generational search for the gene vector best explaining the corpus.
#[derive(Debug, Clone)]
pub struct GeneticSearch {
    network: Arc<RiverNetwork>,
    config: SearchConfig,
    population: Vec<Chromosome>,
    generation: u64,
}

impl GeneticSearch {
    pub fn new(network: Arc<RiverNetwork>) -> Self {
        Self::with_config(network, SearchConfig::default())
    }

    pub fn with_config(network: Arc<RiverNetwork>, config: SearchConfig) -> Self {
        Self {
            network,
            config,
            population: Vec::new(),
            generation: 0,
        }
    }

    /// Generations evolved since construction or the last reinitialise.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Drops the population and generation counter; the next evolve call
    /// starts from a fresh random population.
    pub fn reinitialise(&mut self) {
        self.population.clear();
        self.generation = 0;
    }

    /// Mean transition score of the chromosome's model over the whole corpus.
    ///
    /// Deterministic, and independent of episode order since every triple
    /// contributes symmetrically to the mean.
    pub fn fitness(&self, chromosome: &Chromosome, corpus: &TrajectoryCorpus) -> Result<f64> {
        if corpus.is_empty() {
            return Err(Error::InsufficientData(
                "no recorded transitions to score against".into(),
            ));
        }
        let model = TransitionModel::from_genes(Arc::clone(&self.network), chromosome.genes())?;
        let mut total = 0.0;
        let mut count = 0usize;
        for episode in corpus.episodes() {
            for i in 0..episode.num_transitions() {
                total += model.evaluate_transition(
                    &episode.states[i],
                    &episode.actions[i],
                    &episode.states[i + 1],
                );
                count += 1;
            }
        }
        Ok(total / count as f64)
    }

    /// Runs the generational loop and returns the fittest chromosome.
    pub fn evolve<R: Rng + ?Sized>(
        &mut self,
        corpus: &TrajectoryCorpus,
        generations: usize,
        rng: &mut R,
    ) -> Result<Chromosome> {
        if corpus.is_empty() {
            return Err(Error::InsufficientData(
                "no recorded transitions to fit against".into(),
            ));
        }
        let gene_count = EnvParams::gene_count(self.network.num_reaches());
        if self.population.is_empty() {
            self.population = (0..self.config.population_size)
                .map(|_| Chromosome::random(gene_count, rng))
                .collect();
        }

        let mut scored = self.score_population(corpus)?;
        for _ in 0..generations {
            let mut next = Vec::with_capacity(self.config.population_size);
            for (elite, _) in scored.iter().take(self.config.elites) {
                next.push(elite.clone());
            }
            while next.len() < self.config.population_size {
                let a = self.tournament(&scored, rng);
                let b = self.tournament(&scored, rng);
                let (mut first, mut second) = a.crossover(b, rng);
                first.mutate(
                    self.config.mutation_probability,
                    self.config.mutation_intensity,
                    rng,
                );
                second.mutate(
                    self.config.mutation_probability,
                    self.config.mutation_intensity,
                    rng,
                );
                next.push(first);
                if next.len() < self.config.population_size {
                    next.push(second);
                }
            }
            self.population = next;
            self.generation += 1;
            scored = self.score_population(corpus)?;
        }
        Ok(scored[0].0.clone())
    }

    /// Scores and sorts the population, fittest first.
    fn score_population(&self, corpus: &TrajectoryCorpus) -> Result<Vec<(Chromosome, f64)>> {
        let mut scored = Vec::with_capacity(self.population.len());
        for chromosome in &self.population {
            let score = self.fitness(chromosome, corpus)?;
            scored.push((chromosome.clone(), score));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }

    /// The fittest of `tournament_size` uniformly drawn individuals.
    ///
    /// `scored` is sorted fittest-first, so the winner is the lowest index.
    fn tournament<'a, R: Rng + ?Sized>(
        &self,
        scored: &'a [(Chromosome, f64)],
        rng: &mut R,
    ) -> &'a Chromosome {
        let mut winner = rng.gen_range(0..scored.len());
        for _ in 1..self.config.tournament_size {
            let challenger = rng.gen_range(0..scored.len());
            if challenger < winner {
                winner = challenger;
            }
        }
        &scored[winner].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tamarix_core::state::RiverState;
    use tamarix_core::types::ActionVec;

    fn linear_network() -> Arc<RiverNetwork> {
        Arc::new(RiverNetwork::from_edge_list(&[(1, 0), (0, 2)], 3, 100.0, -10_000.0).unwrap())
    }

    fn recorded_corpus(network: &Arc<RiverNetwork>, episodes: usize) -> TrajectoryCorpus {
        let model = TransitionModel::new(Arc::clone(network), EnvParams::defaults(2));
        let mut rng = StdRng::seed_from_u64(7);
        let mut corpus = TrajectoryCorpus::new();
        for _ in 0..episodes {
            corpus.start_episode();
            let mut state =
                RiverState::from_observation(network, &[1, 2, 3, 3, 1, 2]).unwrap();
            corpus.add_state(state.clone());
            for _ in 0..4 {
                let actions = ActionVec::nothing(2);
                let next = model.sample_next(&state, &actions, &mut rng).unwrap();
                corpus.add_action(actions);
                corpus.add_state(next.clone());
                state = next;
            }
        }
        corpus
    }

    fn small_config() -> SearchConfig {
        SearchConfig {
            population_size: 16,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn mutation_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut chromosome = Chromosome::random(11, &mut rng);
        for _ in 0..50 {
            chromosome.mutate(1.0, 0.8, &mut rng);
            for gene in chromosome.genes() {
                assert!((0.0..=1.0).contains(gene));
            }
        }
    }

    #[test]
    fn crossover_swaps_a_suffix() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = Chromosome::from_genes(vec![0.0; 6]);
        let b = Chromosome::from_genes(vec![1.0; 6]);
        let (first, second) = a.crossover(&b, &mut rng);
        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 6);
        // Children are complementary: genes sum to one parent pair at each slot.
        for (x, y) in first.genes().iter().zip(second.genes()) {
            assert_eq!(x + y, 1.0);
        }
        // The cut point is interior, so both parents contribute.
        assert!(first.genes().contains(&0.0) && first.genes().contains(&1.0));
    }

    #[test]
    fn fitness_requires_transitions() {
        let network = linear_network();
        let search = GeneticSearch::new(Arc::clone(&network));
        let mut rng = StdRng::seed_from_u64(3);
        let chromosome = Chromosome::random(EnvParams::gene_count(2), &mut rng);
        let empty = TrajectoryCorpus::new();
        assert!(matches!(
            search.fitness(&chromosome, &empty),
            Err(Error::InsufficientData(_))
        ));
        let mut search = search;
        assert!(matches!(
            search.evolve(&empty, 1, &mut rng),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn fitness_ignores_episode_order() {
        let network = linear_network();
        let search = GeneticSearch::new(Arc::clone(&network));
        let model = TransitionModel::new(Arc::clone(&network), EnvParams::defaults(2));
        let mut rng = StdRng::seed_from_u64(4);

        let start = RiverState::from_observation(&network, &[1, 1, 3, 2, 3, 3]).unwrap();
        let mid = model
            .sample_next(&start, &ActionVec::nothing(2), &mut rng)
            .unwrap();
        let other = RiverState::from_observation(&network, &[2, 2, 2, 1, 1, 3]).unwrap();
        let other_next = model
            .sample_next(&other, &ActionVec::nothing(2), &mut rng)
            .unwrap();

        let mut forward = TrajectoryCorpus::new();
        forward.start_episode();
        forward.add_state(start.clone());
        forward.add_action(ActionVec::nothing(2));
        forward.add_state(mid.clone());
        forward.start_episode();
        forward.add_state(other.clone());
        forward.add_action(ActionVec::nothing(2));
        forward.add_state(other_next.clone());

        let mut reversed = TrajectoryCorpus::new();
        reversed.start_episode();
        reversed.add_state(other);
        reversed.add_action(ActionVec::nothing(2));
        reversed.add_state(other_next);
        reversed.start_episode();
        reversed.add_state(start);
        reversed.add_action(ActionVec::nothing(2));
        reversed.add_state(mid);

        let chromosome = Chromosome::random(EnvParams::gene_count(2), &mut rng);
        let a = search.fitness(&chromosome, &forward).unwrap();
        let b = search.fitness(&chromosome, &reversed).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn elitism_keeps_best_fitness_monotone() {
        let network = linear_network();
        let corpus = recorded_corpus(&network, 3);
        let mut search = GeneticSearch::with_config(Arc::clone(&network), small_config());
        let mut rng = StdRng::seed_from_u64(5);

        let mut previous = f64::NEG_INFINITY;
        for _ in 0..4 {
            let best = search.evolve(&corpus, 1, &mut rng).unwrap();
            let score = search.fitness(&best, &corpus).unwrap();
            assert!(score >= previous - 1e-12);
            previous = score;
        }
        assert_eq!(search.generation(), 4);
    }

    #[test]
    fn reinitialise_restarts_the_population() {
        let network = linear_network();
        let corpus = recorded_corpus(&network, 1);
        let mut search = GeneticSearch::with_config(Arc::clone(&network), small_config());
        let mut rng = StdRng::seed_from_u64(6);
        search.evolve(&corpus, 2, &mut rng).unwrap();
        assert_eq!(search.generation(), 2);
        search.reinitialise();
        assert_eq!(search.generation(), 0);
        search.evolve(&corpus, 1, &mut rng).unwrap();
        assert_eq!(search.generation(), 1);
    }
}
