//! Benchmark configuration
//!
//! Defines the training profile (all word2vec hyperparameters and file
//! paths) and the benchmark loop options. Defaults match the fixed
//! scenario the benchmark was built around; a TOML profile file can
//! override any subset of the training fields.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training objective
///
/// - `Cbow`: predict a word from its averaged context
/// - `Skipgram`: predict context words from a center word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Cbow,
    Skipgram,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cbow => "cbow",
            Self::Skipgram => "skipgram",
        }
    }
}

/// Full training profile, assembled once before the run and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Corpus text file to train on
    pub corpus: PathBuf,

    /// Output path for the trained vectors (or word classes)
    pub output: PathBuf,

    /// Save the vocabulary here after counting
    pub save_vocab: Option<PathBuf>,

    /// Read the vocabulary from here instead of counting the corpus
    pub read_vocab: Option<PathBuf>,

    /// Word vector dimensionality
    pub size: usize,

    /// Progress verbosity during training (0 = quiet)
    pub debug: u32,

    /// Write vectors in the binary format rather than text
    pub binary: bool,

    /// Training objective
    pub model: ModelKind,

    /// Starting learning rate
    pub alpha: f32,

    /// Subsampling threshold for frequent words (0 disables)
    pub sample: f32,

    /// Use hierarchical softmax for the output layer
    pub hs: bool,

    /// Negative examples per update (0 disables negative sampling)
    pub negative: usize,

    /// Worker threads for training
    pub threads: usize,

    /// Training iterations over the corpus
    pub iter: u64,

    /// When nonzero, write this many k-means word classes instead of vectors
    pub classes: usize,

    /// Maximum skip length between words
    pub window: usize,

    /// Discard words appearing fewer times than this
    pub min_count: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("Corpus.txt"),
            output: PathBuf::from("Vectors.bin"),
            save_vocab: None,
            read_vocab: None,
            size: 100,
            debug: 1,
            binary: true,
            model: ModelKind::Cbow,
            alpha: 0.05,
            sample: 1e-4,
            hs: false,
            negative: 5,
            threads: 12,
            iter: 15,
            classes: 0,
            window: 12,
            min_count: 5,
        }
    }
}

impl TrainingConfig {
    /// Load a profile from a TOML file; unset fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read training profile: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse training profile: {}", path.display()))?;
        Ok(config)
    }

    /// Reject an unusable profile before any training work starts.
    pub fn validate(&self) -> Result<()> {
        if !self.corpus.exists() {
            bail!("corpus file does not exist: {}", self.corpus.display());
        }
        if self.size == 0 {
            bail!("vector size must be nonzero");
        }
        if self.window == 0 {
            bail!("context window must be nonzero");
        }
        if self.iter == 0 {
            bail!("iteration count must be nonzero");
        }
        if self.threads == 0 {
            bail!("thread count must be nonzero");
        }
        if !(self.alpha > 0.0) {
            bail!("learning rate must be positive, got {}", self.alpha);
        }
        if self.sample < 0.0 {
            bail!("subsampling threshold must not be negative, got {}", self.sample);
        }
        if !self.hs && self.negative == 0 {
            bail!("no output layer strategy: enable hierarchical softmax or negative sampling");
        }
        Ok(())
    }
}

/// Benchmark loop options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchOptions {
    /// Outer batches per phrase
    pub outer_batches: usize,

    /// Timed search pairs per batch
    pub inner_reps: usize,

    /// Untimed warm-up passes over the phrase list before the first batch
    pub warmup_reps: usize,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            outer_batches: 5,
            inner_reps: 11,
            warmup_reps: 1,
        }
    }
}

impl BenchOptions {
    pub fn validate(&self) -> Result<()> {
        if self.outer_batches == 0 {
            bail!("outer batch count must be nonzero");
        }
        if self.inner_reps == 0 {
            bail!("inner repetition count must be nonzero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_corpus(dir: &tempfile::TempDir) -> TrainingConfig {
        let corpus = dir.path().join("corpus.txt");
        let mut f = std::fs::File::create(&corpus).unwrap();
        writeln!(f, "the quick brown fox").unwrap();
        TrainingConfig {
            corpus,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_defaults_are_valid_given_a_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_corpus(&dir);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_corpus_fails_fast() {
        let config = TrainingConfig {
            corpus: PathBuf::from("/nonexistent/corpus.txt"),
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_dimensionality() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_corpus(&dir);
        config.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_disabled_output_layer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_corpus(&dir);
        config.hs = false;
        config.negative = 0;
        assert!(config.validate().is_err());

        config.hs = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_toml_partial_override() {
        let toml_str = r#"
corpus = "data/news.txt"
size = 300
model = "skipgram"
hs = true
negative = 0
"#;
        let config: TrainingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.corpus, PathBuf::from("data/news.txt"));
        assert_eq!(config.size, 300);
        assert_eq!(config.model, ModelKind::Skipgram);
        assert!(config.hs);
        // untouched fields keep their defaults
        assert_eq!(config.window, 12);
        assert_eq!(config.iter, 15);
        assert!(config.binary);
    }

    #[test]
    fn test_bench_options_defaults() {
        let opts = BenchOptions::default();
        assert_eq!(opts.outer_batches, 5);
        assert_eq!(opts.inner_reps, 11);
        assert_eq!(opts.warmup_reps, 1);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_bench_options_reject_empty_loop() {
        let opts = BenchOptions {
            inner_reps: 0,
            ..BenchOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
