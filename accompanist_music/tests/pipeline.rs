// End-to-end pipeline: MIDI bytes -> melody -> evolve -> merged MIDI -> decode.

use accompanist_music::composition::Composition;
use accompanist_music::config::AccompanistConfig;
use accompanist_music::evolution::{StopCondition, evolve};
use accompanist_music::fitness::{FitnessEvaluator, Metric};
use accompanist_music::midi::{load_melody, read_melody, save_midi, write_smf};
use accompanist_music::note::PlacedNote;
use accompanist_prng::SearchRng;

const TPB: u16 = 384;

/// "Twinkle twinkle" opening, one note per beat, in C major.
fn twinkle() -> Composition {
    let pitches = [72, 72, 79, 79, 81, 81, 79, 79, 77, 77, 76, 76, 74, 74, 72, 72];
    let notes = pitches
        .iter()
        .enumerate()
        .map(|(i, &p)| PlacedNote::new(p, i as u32 * TPB as u32, TPB as u32).unwrap())
        .collect();
    Composition::new(notes, TPB, 500_000).unwrap()
}

fn quick_config(iterations: usize) -> AccompanistConfig {
    let mut config = AccompanistConfig::default();
    config.evolution.generation_size = 24;
    config.evolution.best_parents_num = 4;
    config.evolution.random_parents_num = 4;
    config.evolution.stop = StopCondition::IterationsNum(iterations);
    config
}

#[test]
fn two_beat_melody_zero_iterations() {
    let notes = vec![
        PlacedNote::new(72, 0, 384).unwrap(),
        PlacedNote::new(76, 384, 384).unwrap(),
    ];
    let melody = Composition::new(notes, 384, 500_000).unwrap();
    let config = quick_config(0);
    let evaluator = FitnessEvaluator::new(config.fitness.clone(), &melody);
    let result = evolve(
        &evaluator,
        &config.evolution,
        &config.mutation,
        &mut SearchRng::new(17),
    )
    .unwrap();
    assert_eq!(result.generations, 0);
    assert_eq!(result.best_score, evaluator.score(&result.best));
    // Chords only on the two beats of the melody.
    assert!(result.best.notes().iter().all(|n| n.start_time == 0 || n.start_time == 384));
}

#[test]
fn full_pipeline_roundtrip() {
    let melody_bytes = write_smf(&twinkle()).unwrap();
    let melody = read_melody(&melody_bytes).unwrap();
    assert_eq!(melody.notes().len(), 16);

    let config = quick_config(10);
    let evaluator = FitnessEvaluator::new(config.fitness.clone(), &melody);
    let result = evolve(
        &evaluator,
        &config.evolution,
        &config.mutation,
        &mut SearchRng::new(2024),
    )
    .unwrap();
    assert_eq!(result.generations, 10);
    assert!(!result.cancelled);
    assert!(
        result
            .best
            .notes()
            .iter()
            .all(|n| n.pitch() <= config.mutation.max_note && n.start_time % TPB as u32 == 0)
    );

    let merged = &melody + &result.best;
    assert_eq!(
        merged.notes().len(),
        melody.notes().len() + result.best.notes().len()
    );
    let decoded = read_melody(&write_smf(&merged).unwrap()).unwrap();
    assert_eq!(decoded.notes().len(), merged.notes().len());
    assert_eq!(decoded.tempo(), melody.tempo());
}

#[test]
fn silent_accompaniment_pays_for_every_onset() {
    let melody = twinkle();
    let evaluator = FitnessEvaluator::new(AccompanistConfig::default().fitness, &melody);
    let evaluation = evaluator.evaluate(&melody.with_notes(Vec::new()));
    assert_eq!(evaluation.metrics.get(Metric::MissingAccompanimentForMelodyTick), 16.0);
    assert_eq!(evaluation.metrics.get(Metric::AccompanimentChordExists), 0.0);
    // Only the -10 per uncovered onset applies.
    assert_eq!(evaluation.score, 160.0);
    assert!(evaluation.unweighted.is_empty());
}

#[test]
fn reported_score_matches_evaluation() {
    let melody = twinkle();
    let config = quick_config(4);
    let evaluator = FitnessEvaluator::new(config.fitness.clone(), &melody);
    let result = evolve(
        &evaluator,
        &config.evolution,
        &config.mutation,
        &mut SearchRng::new(5),
    )
    .unwrap();
    let evaluation = evaluator.evaluate(&result.best);
    assert_eq!(evaluation.score, result.best_score);
    for metric in Metric::COMPUTED {
        assert!(evaluation.metrics.iter().any(|(m, _)| m == metric), "{metric} missing");
    }
}

#[test]
fn files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let melody_path = dir.path().join("melody.mid");
    save_midi(&twinkle(), &melody_path).unwrap();
    let melody = load_melody(&melody_path).unwrap();
    assert_eq!(melody.duration(), twinkle().duration());

    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, quick_config(3).to_json().unwrap()).unwrap();
    let config = AccompanistConfig::load(&config_path).unwrap();
    assert_eq!(config.evolution.generation_size, 24);
    assert_eq!(config.evolution.stop, StopCondition::IterationsNum(3));
}

#[test]
fn mismatched_timing_cannot_merge() {
    let melody = twinkle();
    let other = Composition::new(Vec::new(), 480, 500_000).unwrap();
    let err = melody.merge(&other).unwrap_err();
    assert!(err.to_string().contains("different timing"));
}
