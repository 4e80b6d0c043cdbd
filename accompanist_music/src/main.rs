// Accompanist CLI entry point.
//
// Reads a melody from a MIDI file, evolves a chord accompaniment for it, and
// writes two MIDI files: the accompaniment alone and the melody merged with
// it. The pipeline: load melody -> build evaluator -> evolve -> write MIDI.
//
// Usage:
//   cargo run -p accompanist_music -- melody.mid [--output-dir DIR]
//     [--config FILE] [--seed N] [--generation-size N]
//     [--iterations N | --target-fitness X] [--max-generations N]
//
// Log verbosity follows RUST_LOG (default: info).

use accompanist_music::config::AccompanistConfig;
use accompanist_music::evolution::{StopCondition, evolve_with_checkpoint};
use accompanist_music::fitness::FitnessEvaluator;
use accompanist_music::midi::{load_melody, save_midi};
use accompanist_prng::SearchRng;
use clap::Parser;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Parser)]
#[command(
    name = "accompany",
    version,
    about = "Evolve a chord accompaniment for a MIDI melody"
)]
struct Cli {
    /// Melody .mid file
    melody: PathBuf,

    /// Directory for accompaniment.mid and merged.mid
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON config file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed (same seed => same accompaniment); random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Candidates per generation
    #[arg(long)]
    generation_size: Option<usize>,

    /// Stop after this many generations
    #[arg(long, conflicts_with = "target_fitness")]
    iterations: Option<usize>,

    /// Stop once the best score is at or below this value
    #[arg(long, allow_negative_numbers = true)]
    target_fitness: Option<f64>,

    /// Give up on a target-fitness run after this many generations
    #[arg(long)]
    max_generations: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AccompanistConfig::load(path)?,
        None => AccompanistConfig::default(),
    };
    if let Some(size) = cli.generation_size {
        config.evolution.generation_size = size;
    }
    if cli.iterations.is_some() || cli.target_fitness.is_some() {
        config.evolution.stop = StopCondition::from_options(cli.target_fitness, cli.iterations)?;
    }
    config.validate()?;

    let seed = cli.seed.unwrap_or_else(clock_seed);

    println!("=== Accompanist ===");
    println!("Melody: {}", cli.melody.display());
    println!("Output: {}", cli.output_dir.display());
    println!("Generation size: {}", config.evolution.generation_size);
    println!("Stop: {:?}", config.evolution.stop);
    println!("Seed: {}", seed);
    println!();

    println!("[1/4] Loading melody...");
    let melody = load_melody(&cli.melody)?;
    println!(
        "  {} notes, {} beats, {} ticks/beat, tempo {}",
        melody.notes().len(),
        melody.beat_count(),
        melody.ticks_per_beat(),
        melody.tempo()
    );

    println!("[2/4] Analysing melody...");
    let evaluator = FitnessEvaluator::new(config.fitness.clone(), &melody);
    match evaluator.key() {
        Some(key) => println!("  Key: {}", key),
        None => println!("  Key: none (empty melody)"),
    }

    println!("[3/4] Evolving accompaniment...");
    let mut rng = SearchRng::new(seed);
    let mut initial_best = None;
    let result = evolve_with_checkpoint(
        &evaluator,
        &config.evolution,
        &config.mutation,
        &mut rng,
        |report| {
            initial_best.get_or_insert(report.best_score);
            match cli.max_generations {
                Some(max) if report.generation >= max => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        },
    )?;
    if let Some(initial) = initial_best {
        println!(
            "  Score: {:.1} -> {:.1} (delta {:+.1})",
            initial,
            result.best_score,
            result.best_score - initial
        );
    }
    println!(
        "  Generations: {}{}",
        result.generations,
        if result.cancelled { " (stopped at --max-generations)" } else { "" }
    );
    let evaluation = evaluator.evaluate(&result.best);
    for (metric, value) in evaluation.metrics.iter() {
        println!("    {:<40} {:>8.2}", metric, value);
    }
    print!("{}", result.best.summary());

    println!("[4/4] Writing MIDI to {}...", cli.output_dir.display());
    std::fs::create_dir_all(&cli.output_dir)?;
    let accompaniment_path = cli.output_dir.join("accompaniment.mid");
    let merged_path = cli.output_dir.join("merged.mid");
    save_midi(&result.best, &accompaniment_path)?;
    save_midi(&melody.merge(&result.best)?, &merged_path)?;
    println!("  {}", accompaniment_path.display());
    println!("  {}", merged_path.display());
    println!("Done.");
    Ok(())
}

/// Seed from the wall clock when none is given; printed so the run can be replayed.
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
