// Data-driven search configuration.
//
// Every tunable parameter of a run lives in `AccompanistConfig`: the fitness
// metric switches, weights and thresholds (`FitnessConfig`), the pitch bounds
// of generated chords (`MutationConfig`), and the generation parameters with
// the stop condition (`EvolutionConfig`). Each group supplies its defaults
// through `Default`, and every struct is `#[serde(default)]`, so a JSON file
// only needs to name the values it changes.
//
// The config is immutable for the length of a run. `validate` runs every
// check the engine relies on before the first generation.
//
// See also: fitness.rs, mutation.rs and evolution.rs for what each group
// controls, and main.rs for how CLI flags override loaded values.

use crate::error::ConfigError;
use crate::evolution::EvolutionConfig;
use crate::fitness::FitnessConfig;
use crate::mutation::MutationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The whole tunable surface of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccompanistConfig {
    pub fitness: FitnessConfig,
    pub mutation: MutationConfig,
    pub evolution: EvolutionConfig,
}

impl AccompanistConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AccompanistConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mutation.validate()?;
        self.evolution.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::StopCondition;
    use crate::fitness::Metric;

    #[test]
    fn test_default_roundtrip() {
        let config = AccompanistConfig::default();
        let json = config.to_json().unwrap();
        let restored = AccompanistConfig::from_json(&json).unwrap();
        assert_eq!(restored.fitness.weights, config.fitness.weights);
        assert_eq!(restored.fitness.enabled, config.fitness.enabled);
        assert_eq!(restored.mutation, config.mutation);
        assert_eq!(restored.evolution.stop, config.evolution.stop);
        assert_eq!(restored.evolution.generation_size, 64);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "evolution": { "generation_size": 32, "stop": { "target_fitness": -250.0 } },
            "fitness": { "weights": { "too_low_chord": -40.0 } }
        }"#;
        let config = AccompanistConfig::from_json(json).unwrap();
        assert_eq!(config.evolution.generation_size, 32);
        assert_eq!(config.evolution.best_parents_num, 8);
        assert_eq!(config.evolution.stop, StopCondition::TargetFitness(-250.0));
        // A weights table replaces the default table wholesale.
        assert_eq!(config.fitness.weights.len(), 1);
        assert_eq!(config.fitness.weights[&Metric::TooLowChord], -40.0);
        assert_eq!(config.mutation.max_note, 84);
        assert!(config.fitness.is_enabled(Metric::CompletedProgression));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let json = r#"{ "evolution": { "mutation_chance": 1.5 } }"#;
        assert!(matches!(
            AccompanistConfig::from_json(json),
            Err(ConfigError::ProbabilityOutOfRange { name: "mutation_chance", .. })
        ));
        let json = r#"{ "mutation": { "max_note": 200 } }"#;
        assert!(matches!(
            AccompanistConfig::from_json(json),
            Err(ConfigError::MaxNoteOutOfRange(200))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AccompanistConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        let json = r#"{ "evolution": { "stop": { "target_fitness": 1.0, "iterations_num": 3 } } }"#;
        assert!(matches!(AccompanistConfig::from_json(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AccompanistConfig::load(Path::new("/nonexistent/accompanist.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
