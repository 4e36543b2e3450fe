//! Word2vec Training and Query-Latency Benchmark CLI
//!
//! Runs the full pipeline: train a word-vector model over a corpus, load
//! it once, warm the query paths, then time repeated batches of
//! distance + analogy search pairs and report steady-state statistics.
//!
//! ## Quick Start
//!
//! ```bash
//! # Train on Corpus.txt and benchmark the default phrase
//! ./word2vec-benchmark run
//!
//! # Custom corpus and phrase set
//! ./word2vec-benchmark run --corpus ./news.txt --phrases-file ./capitals.json
//!
//! # Benchmark an already-trained vector file
//! ./word2vec-benchmark bench --model Vectors.bin --outer-batches 10
//! ```
//!
//! Training hyperparameters come from a TOML profile (`--profile`); any
//! field left out keeps the built-in default.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use word2vec_benchmark::bench::{run_steady_state, warm_up};
use word2vec_benchmark::config::{BenchOptions, ModelKind, TrainingConfig};
use word2vec_benchmark::monitor::TrainingMonitor;
use word2vec_benchmark::phrases::PhraseSet;
use word2vec_benchmark::timer::{Resolution, Stopwatch, Timer};
use word2vec_benchmark::word2vec::{AnalogySearch, DistanceSearch, VectorModel, Word2Vec};

#[derive(Parser)]
#[command(name = "word2vec-benchmark")]
#[command(about = "Steady-state latency benchmark for word2vec training and search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model, then run the full latency benchmark against it
    Run {
        #[command(flatten)]
        train: TrainArgs,

        #[command(flatten)]
        bench: BenchArgs,
    },

    /// Train a model and exit
    Train {
        #[command(flatten)]
        train: TrainArgs,
    },

    /// Benchmark queries against an existing vector file
    Bench {
        /// Trained vector file to load
        #[arg(short, long, default_value = "Vectors.bin")]
        model: PathBuf,

        #[command(flatten)]
        bench: BenchArgs,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Training profile TOML; unset fields keep their defaults
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Corpus text file (overrides the profile)
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// Output vector file (overrides the profile)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Training objective (overrides the profile)
    #[arg(long, value_enum)]
    model: Option<ModelKind>,
}

impl TrainArgs {
    fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.profile {
            Some(path) => TrainingConfig::load(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(corpus) = self.corpus {
            config.corpus = corpus;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        Ok(config)
    }
}

#[derive(Args)]
struct BenchArgs {
    /// Outer batches per phrase
    #[arg(long, default_value_t = 5)]
    outer_batches: usize,

    /// Timed search pairs per batch
    #[arg(long, default_value_t = 11)]
    inner_reps: usize,

    /// Warm-up passes over the phrase list before timing starts
    #[arg(long, default_value_t = 1)]
    warmup_reps: usize,

    /// Query phrase (repeatable; overrides the built-in set)
    #[arg(long = "phrase")]
    phrases: Vec<String>,

    /// JSON phrase-set file
    #[arg(long)]
    phrases_file: Option<PathBuf>,
}

impl BenchArgs {
    fn options(&self) -> BenchOptions {
        BenchOptions {
            outer_batches: self.outer_batches,
            inner_reps: self.inner_reps,
            warmup_reps: self.warmup_reps,
        }
    }

    fn phrase_list(&self) -> Result<Vec<String>> {
        if let Some(path) = &self.phrases_file {
            let set = PhraseSet::load(path)?;
            eprintln!(
                "Loaded {} phrases from '{}'",
                set.phrases.len(),
                set.metadata.name
            );
            return Ok(set.phrases);
        }
        if !self.phrases.is_empty() {
            return Ok(self.phrases.clone());
        }
        Ok(PhraseSet::default_set().phrases)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { train, bench } => {
            let config = train.into_config()?;
            run_training(&config)?;
            run_queries(&config.output, &bench)?;
        }

        Commands::Train { train } => {
            let config = train.into_config()?;
            run_training(&config)?;
        }

        Commands::Bench { model, bench } => {
            run_queries(&model, &bench)?;
        }
    }

    Ok(())
}

/// Train once, timing the whole blocking call and tracking its memory.
fn run_training(config: &TrainingConfig) -> Result<()> {
    config.validate()?;

    eprintln!(
        "Training {} model on {:?} ({} dims, {} iterations, {} threads)",
        config.model.name(),
        config.corpus,
        config.size,
        config.iter,
        config.threads
    );

    let mut monitor = TrainingMonitor::new();
    monitor.snapshot_baseline();
    let sampling = monitor.start_sampling();

    let mut sw = Stopwatch::start_new();
    let stats = Word2Vec::new(config.clone()).train()?;
    sw.stop();
    drop(sampling);

    println!("Training took {}ms", sw.elapsed_millis());

    let resources = monitor.finalize(sw.elapsed(), stats.words_trained);
    eprintln!("  {}", resources.format_summary());
    tracing::info!(
        vocab_size = stats.vocab_size,
        words_trained = stats.words_trained,
        "training complete"
    );

    Ok(())
}

/// Load the model once, warm the query paths, then run the timed batches.
fn run_queries(model_path: &Path, args: &BenchArgs) -> Result<()> {
    let opts = args.options();
    opts.validate()?;
    let phrases = args.phrase_list()?;

    let model = Arc::new(VectorModel::load(model_path)?);
    eprintln!(
        "Loaded {} vectors ({} dims) from {}",
        model.word_count(),
        model.dim(),
        model_path.display()
    );

    let distance = DistanceSearch::new(Arc::clone(&model));
    let analogy = AnalogySearch::new(model);

    let resolution = Resolution::detect();
    tracing::info!(
        high_resolution = resolution.is_high_resolution(),
        "timer resolution selected"
    );

    let warm = warm_up(&distance, &analogy, &phrases, opts.warmup_reps)?;
    println!("Search took {}ms", warm.as_millis());

    let mut timer = Stopwatch::start_new();
    run_steady_state(&mut timer, resolution, &distance, &analogy, &phrases, &opts)?;

    Ok(())
}
