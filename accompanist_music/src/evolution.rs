// Genetic search for the best accompaniment of a fixed melody.
//
// One run:
// 1. Init: `generation_size` random candidates (a random catalogue chord on
//    every beat of the melody), scored and sorted ascending by score.
// 2. Step: take the `best_parents_num` best candidates plus
//    `random_parents_num` drawn without replacement from the rest. Draw two
//    distinct parents at a time and cross them over until `generation_size`
//    children exist (the last odd child is dropped). Every child goes through
//    mutation, then the children are scored, sorted, and replace the whole
//    population.
// 3. Stop on the configured condition: a target score reached
//    (`best <= target`) or a number of steps run.
//
// Scoring is the only parallel phase (rayon). Every random draw happens on
// the calling thread in a fixed order, so a seed reproduces a run exactly
// regardless of thread count.
//
// `evolve_with_checkpoint` reports each generation (the initial one
// included) to a callback that may break the loop before the next
// generation starts.

use crate::composition::Composition;
use crate::crossover::{crossover, validate_similarity};
use crate::error::ConfigError;
use crate::fitness::FitnessEvaluator;
use crate::mutation::{MutationConfig, mutate, random_candidate, validate_mutation_chance};
use accompanist_prng::SearchRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// When a run ends. Exactly one condition is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop once the best score is at or below this value.
    TargetFitness(f64),
    /// Stop after this many reproduction steps.
    IterationsNum(usize),
}

impl StopCondition {
    /// Build from the two optional settings; exactly one must be given.
    pub fn from_options(
        target_fitness: Option<f64>,
        iterations_num: Option<usize>,
    ) -> Result<Self, ConfigError> {
        match (target_fitness, iterations_num) {
            (Some(target), None) => Ok(StopCondition::TargetFitness(target)),
            (None, Some(iterations)) => Ok(StopCondition::IterationsNum(iterations)),
            _ => Err(ConfigError::AmbiguousStopCondition),
        }
    }

    pub fn is_met(&self, generations: usize, best_score: f64) -> bool {
        match *self {
            StopCondition::TargetFitness(target) => best_score <= target,
            StopCondition::IterationsNum(iterations) => generations >= iterations,
        }
    }
}

/// Generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub generation_size: usize,
    /// Per-slot probability that mutation rebuilds a child's chord.
    pub mutation_chance: f64,
    pub best_parents_num: usize,
    pub random_parents_num: usize,
    /// Probability that a child keeps its own parent's chord at a slot.
    pub similarity_to_single_parent: f64,
    pub stop: StopCondition,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            generation_size: 64,
            mutation_chance: 0.1,
            best_parents_num: 8,
            random_parents_num: 8,
            similarity_to_single_parent: 0.5,
            stop: StopCondition::IterationsNum(200),
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.stop {
            StopCondition::TargetFitness(target) if !target.is_finite() => {
                return Err(ConfigError::NonFiniteTarget(target));
            }
            _ => {}
        }
        if self.generation_size < 2 {
            return Err(ConfigError::GenerationTooSmall(self.generation_size));
        }
        validate_mutation_chance(self.mutation_chance)?;
        validate_similarity(self.similarity_to_single_parent)?;
        let parents = self.best_parents_num + self.random_parents_num;
        if parents < 2 {
            return Err(ConfigError::TooFewParents {
                best: self.best_parents_num,
                random: self.random_parents_num,
            });
        }
        if parents > self.generation_size {
            return Err(ConfigError::ParentPoolTooLarge {
                requested: parents,
                population: self.generation_size,
            });
        }
        Ok(())
    }
}

/// A candidate with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub candidate: Composition,
    pub score: f64,
}

/// One generation, sorted ascending by score (best first).
#[derive(Debug, Clone)]
pub struct Population {
    members: Vec<Scored>,
}

impl Population {
    /// Score `candidates` in parallel and sort them best first.
    pub fn score(candidates: Vec<Composition>, evaluator: &FitnessEvaluator) -> Self {
        let mut members: Vec<Scored> = candidates
            .into_par_iter()
            .map(|candidate| {
                let score = evaluator.score(&candidate);
                log::trace!("scored {} notes: {score:.3}", candidate.notes().len());
                Scored { candidate, score }
            })
            .collect();
        members.sort_by(|a, b| a.score.total_cmp(&b.score));
        Population { members }
    }

    pub fn members(&self) -> &[Scored] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best(&self) -> Option<&Scored> {
        self.members.first()
    }

    pub fn into_best(self) -> Option<Scored> {
        self.members.into_iter().next()
    }

    /// The `best` top candidates followed by `random` others drawn uniformly
    /// without replacement from the remainder.
    pub fn select_parents(
        &self,
        best: usize,
        random: usize,
        rng: &mut SearchRng,
    ) -> Result<Vec<&Composition>, ConfigError> {
        if best + random > self.members.len() {
            return Err(ConfigError::ParentPoolTooLarge {
                requested: best + random,
                population: self.members.len(),
            });
        }
        let mut parents: Vec<&Composition> =
            self.members[..best].iter().map(|s| &s.candidate).collect();
        let rest = &self.members[best..];
        for i in rng.sample_indices(rest.len(), random) {
            parents.push(&rest[i].candidate);
        }
        Ok(parents)
    }

    pub fn report(&self, generation: usize) -> GenerationReport {
        let scores = self.members.iter().map(|s| s.score);
        let best_score = scores.clone().next().unwrap_or(f64::INFINITY);
        let worst_score = scores.clone().last().unwrap_or(f64::INFINITY);
        let mean_score = if self.members.is_empty() {
            f64::INFINITY
        } else {
            scores.sum::<f64>() / self.members.len() as f64
        };
        GenerationReport {
            generation,
            population_size: self.members.len(),
            best_score,
            mean_score,
            worst_score,
        }
    }
}

/// Summary of one generation, handed to checkpoints and the log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// 0 for the initial population.
    pub generation: usize,
    pub population_size: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub worst_score: f64,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    pub best: Composition,
    pub best_score: f64,
    /// Reproduction steps completed.
    pub generations: usize,
    /// The checkpoint stopped the run before its stop condition was met.
    pub cancelled: bool,
}

/// The scored initial population of random candidates.
pub fn initial_population(
    evaluator: &FitnessEvaluator,
    config: &EvolutionConfig,
    mutation: &MutationConfig,
    rng: &mut SearchRng,
) -> Population {
    let melody = evaluator.melody();
    let candidates = (0..config.generation_size)
        .map(|_| random_candidate(melody, mutation, rng))
        .collect();
    Population::score(candidates, evaluator)
}

/// Breed, mutate and score the generation that replaces `population`.
pub fn next_generation(
    population: &Population,
    evaluator: &FitnessEvaluator,
    config: &EvolutionConfig,
    mutation: &MutationConfig,
    rng: &mut SearchRng,
) -> Result<Population, ConfigError> {
    let parents = population.select_parents(config.best_parents_num, config.random_parents_num, rng)?;
    if parents.len() < 2 {
        return Err(ConfigError::TooFewParents {
            best: config.best_parents_num,
            random: config.random_parents_num,
        });
    }
    let mut children = Vec::with_capacity(config.generation_size + 1);
    while children.len() < config.generation_size {
        let pair = rng.sample_indices(parents.len(), 2);
        let (a, b) = crossover(
            parents[pair[0]],
            parents[pair[1]],
            config.similarity_to_single_parent,
            rng,
        )?;
        children.push(a);
        children.push(b);
    }
    children.truncate(config.generation_size);
    let mutated = children
        .iter()
        .map(|child| mutate(child, config.mutation_chance, mutation, rng))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Population::score(mutated, evaluator))
}

/// Run the search for an accompaniment of the evaluator's melody until the
/// stop condition is met.
pub fn evolve(
    evaluator: &FitnessEvaluator,
    config: &EvolutionConfig,
    mutation: &MutationConfig,
    rng: &mut SearchRng,
) -> Result<EvolutionResult, ConfigError> {
    evolve_with_checkpoint(evaluator, config, mutation, rng, |_| ControlFlow::Continue(()))
}

/// Run the search, calling `checkpoint` after every generation.
///
/// Returning `ControlFlow::Break` ends the run before the next generation;
/// the result then holds the best candidate so far with `cancelled` set.
pub fn evolve_with_checkpoint(
    evaluator: &FitnessEvaluator,
    config: &EvolutionConfig,
    mutation: &MutationConfig,
    rng: &mut SearchRng,
    mut checkpoint: impl FnMut(&GenerationReport) -> ControlFlow<()>,
) -> Result<EvolutionResult, ConfigError> {
    config.validate()?;
    mutation.validate()?;
    let melody = evaluator.melody();
    if melody.is_empty() {
        return Err(ConfigError::EmptyMelody);
    }
    log::info!(
        "evolving {} candidates over {} beats, stop: {:?}",
        config.generation_size,
        melody.beat_count(),
        config.stop
    );

    let mut population = initial_population(evaluator, config, mutation, rng);
    let mut generations = 0;
    let mut cancelled = false;
    loop {
        let report = population.report(generations);
        log::debug!(
            "generation {}: best {:.3}, mean {:.3}",
            report.generation,
            report.best_score,
            report.mean_score
        );
        if checkpoint(&report).is_break() {
            cancelled = true;
            break;
        }
        if config.stop.is_met(generations, report.best_score) {
            break;
        }
        population = next_generation(&population, evaluator, config, mutation, rng)?;
        generations += 1;
    }

    let best = population.into_best().ok_or(ConfigError::GenerationTooSmall(config.generation_size))?;
    log::info!(
        "finished after {} generations{}: best score {:.3}",
        generations,
        if cancelled { " (cancelled)" } else { "" },
        best.score
    );
    Ok(EvolutionResult {
        best: best.candidate,
        best_score: best.score,
        generations,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::FitnessConfig;
    use crate::note::PlacedNote;

    const TPB: u32 = 384;

    fn melody(pitches: &[u8]) -> Composition {
        let notes = pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| PlacedNote::new(p, i as u32 * TPB, TPB).unwrap())
            .collect();
        Composition::new(notes, TPB as u16, 500_000).unwrap()
    }

    fn small_config(stop: StopCondition) -> EvolutionConfig {
        EvolutionConfig {
            generation_size: 16,
            best_parents_num: 4,
            random_parents_num: 4,
            stop,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_iterations_returns_initial_best() {
        let melody = melody(&[72, 76]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let config = small_config(StopCondition::IterationsNum(0));
        let mutation = MutationConfig::default();

        let mut rng = SearchRng::new(42);
        let result = evolve(&evaluator, &config, &mutation, &mut rng).unwrap();

        let mut replay = SearchRng::new(42);
        let initial = initial_population(&evaluator, &config, &mutation, &mut replay);
        let initial_best = initial.best().unwrap();

        assert_eq!(result.generations, 0);
        assert!(!result.cancelled);
        assert_eq!(result.best, initial_best.candidate);
        assert_eq!(result.best_score, initial_best.score);
        assert_eq!(result.best_score, evaluator.score(&result.best));
        // No reproduction happened, so the generator is where init left it.
        assert_eq!(rng, replay);
    }

    #[test]
    fn test_same_seed_same_result() {
        let melody = melody(&[60, 62, 64, 65, 67, 65, 64, 62]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let config = small_config(StopCondition::IterationsNum(5));
        let mutation = MutationConfig::default();
        let a = evolve(&evaluator, &config, &mutation, &mut SearchRng::new(9)).unwrap();
        let b = evolve(&evaluator, &config, &mutation, &mut SearchRng::new(9)).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.best_score, b.best_score);
        assert_eq!(a.generations, 5);
    }

    #[test]
    fn test_reports_every_generation() {
        let melody = melody(&[60, 64, 67, 72]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let config = small_config(StopCondition::IterationsNum(3));
        let mut reports = Vec::new();
        let result = evolve_with_checkpoint(
            &evaluator,
            &config,
            &MutationConfig::default(),
            &mut SearchRng::new(1),
            |report| {
                reports.push(*report);
                ControlFlow::Continue(())
            },
        )
        .unwrap();
        assert_eq!(result.generations, 3);
        assert_eq!(reports.len(), 4);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.generation, i);
            assert_eq!(report.population_size, 16);
            assert!(report.best_score <= report.mean_score + 1e-9);
            assert!(report.mean_score <= report.worst_score + 1e-9);
        }
        assert_eq!(reports[3].best_score, result.best_score);
    }

    #[test]
    fn test_checkpoint_cancels() {
        let melody = melody(&[60, 64]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let config = small_config(StopCondition::IterationsNum(100));
        let result = evolve_with_checkpoint(
            &evaluator,
            &config,
            &MutationConfig::default(),
            &mut SearchRng::new(1),
            |report| {
                if report.generation >= 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
        .unwrap();
        assert!(result.cancelled);
        assert_eq!(result.generations, 2);
    }

    #[test]
    fn test_target_fitness_stop() {
        let melody = melody(&[60, 64]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        // Any score satisfies the largest finite target.
        let config = small_config(StopCondition::TargetFitness(f64::MAX));
        let result = evolve(
            &evaluator,
            &config,
            &MutationConfig::default(),
            &mut SearchRng::new(3),
        )
        .unwrap();
        assert_eq!(result.generations, 0);
        assert!(StopCondition::TargetFitness(-5.0).is_met(0, -5.0));
        assert!(!StopCondition::TargetFitness(-5.0).is_met(0, -4.9));
    }

    #[test]
    fn test_population_sorted_and_parents_selected() {
        let melody = melody(&[60, 62, 64, 65]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let config = small_config(StopCondition::IterationsNum(0));
        let mut rng = SearchRng::new(5);
        let population =
            initial_population(&evaluator, &config, &MutationConfig::default(), &mut rng);
        assert_eq!(population.len(), 16);
        assert!(population.members().windows(2).all(|w| w[0].score <= w[1].score));

        let parents = population.select_parents(4, 4, &mut rng).unwrap();
        assert_eq!(parents.len(), 8);
        for (i, parent) in parents.iter().take(4).enumerate() {
            assert_eq!(**parent, population.members()[i].candidate);
        }
        assert!(matches!(
            population.select_parents(10, 10, &mut rng),
            Err(ConfigError::ParentPoolTooLarge { requested: 20, population: 16 })
        ));
    }

    #[test]
    fn test_stop_condition_exactly_one() {
        assert_eq!(
            StopCondition::from_options(None, Some(3)).unwrap(),
            StopCondition::IterationsNum(3)
        );
        assert_eq!(
            StopCondition::from_options(Some(-10.0), None).unwrap(),
            StopCondition::TargetFitness(-10.0)
        );
        assert!(matches!(
            StopCondition::from_options(Some(1.0), Some(3)),
            Err(ConfigError::AmbiguousStopCondition)
        ));
        assert!(matches!(
            StopCondition::from_options(None, None),
            Err(ConfigError::AmbiguousStopCondition)
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(EvolutionConfig::default().validate().is_ok());
        let bad_chance = EvolutionConfig {
            mutation_chance: -0.5,
            ..Default::default()
        };
        assert!(matches!(bad_chance.validate(), Err(ConfigError::ProbabilityOutOfRange { .. })));
        let bad_similarity = EvolutionConfig {
            similarity_to_single_parent: 2.0,
            ..Default::default()
        };
        assert!(bad_similarity.validate().is_err());
        let one_parent = EvolutionConfig {
            best_parents_num: 1,
            random_parents_num: 0,
            ..Default::default()
        };
        assert!(matches!(one_parent.validate(), Err(ConfigError::TooFewParents { .. })));
        let too_many = EvolutionConfig {
            generation_size: 10,
            ..Default::default()
        };
        assert!(matches!(too_many.validate(), Err(ConfigError::ParentPoolTooLarge { .. })));
    }

    #[test]
    fn test_non_finite_target_rejected() {
        for target in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let config = small_config(StopCondition::TargetFitness(target));
            assert!(matches!(config.validate(), Err(ConfigError::NonFiniteTarget(_))));
        }
        assert!(small_config(StopCondition::TargetFitness(-1e6)).validate().is_ok());
    }

    #[test]
    fn test_evaluator_supplies_the_melody() {
        let melody = melody(&[60, 64, 67, 72]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        assert_eq!(evaluator.melody(), &melody);
        let config = small_config(StopCondition::IterationsNum(0));
        let population =
            initial_population(&evaluator, &config, &MutationConfig::default(), &mut SearchRng::new(4));
        for member in population.members() {
            assert_eq!(member.candidate.min_duration(), melody.duration());
            assert!(member.candidate.notes().iter().all(|n| n.start_time < 4 * TPB));
        }
    }

    #[test]
    fn test_empty_melody_rejected() {
        let melody = Composition::new(vec![], TPB as u16, 500_000).unwrap();
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), &melody);
        let result = evolve(
            &evaluator,
            &EvolutionConfig::default(),
            &MutationConfig::default(),
            &mut SearchRng::new(0),
        );
        assert!(matches!(result, Err(ConfigError::EmptyMelody)));
    }

    #[test]
    fn test_stop_condition_serde() {
        let json = serde_json::to_string(&StopCondition::IterationsNum(200)).unwrap();
        assert_eq!(json, r#"{"iterations_num":200}"#);
        let parsed: StopCondition = serde_json::from_str(r#"{"target_fitness":-120.5}"#).unwrap();
        assert_eq!(parsed, StopCondition::TargetFitness(-120.5));
    }
}
