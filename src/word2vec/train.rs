//! CBOW / skip-gram training over a tokenized corpus.
//!
//! Sentences are sharded across worker threads; the weight matrices are
//! shared as atomic f32 bit-cells and updated with relaxed
//! read-modify-write, so concurrent updates may overwrite each other.
//! That loss is tolerated: stochastic gradient noise dominates it.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::model::save_vectors;
use super::vocab::Vocab;
use crate::config::{ModelKind, TrainingConfig};

/// Gradient updates are skipped outside this sigmoid input range.
const MAX_SIGMOID_INPUT: f32 = 6.0;

/// Entries in the negative-sampling table.
const UNIGRAM_TABLE_SIZE: usize = 10_000_000;

/// Exponent flattening the unigram distribution for negative sampling.
const UNIGRAM_POWER: f64 = 0.75;

/// The learning rate never decays below this fraction of its start.
const MIN_ALPHA_RATIO: f32 = 1e-4;

/// Alpha is re-derived after this many locally processed words.
const ALPHA_UPDATE_INTERVAL: u64 = 10_000;

/// Summary of one completed training run.
#[derive(Debug, Clone)]
pub struct TrainedStats {
    pub vocab_size: usize,
    pub words_trained: u64,
}

/// One-shot trainer: consumes a profile, writes the model file.
pub struct Word2Vec {
    config: TrainingConfig,
}

impl Word2Vec {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Run the full training pipeline as a single blocking call.
    ///
    /// On return the configured output path holds the persisted vectors
    /// (or word classes), and the vocabulary file if one was requested.
    pub fn train(&self) -> Result<TrainedStats> {
        let config = &self.config;

        let mut vocab = match &config.read_vocab {
            Some(path) => Vocab::read(path, config.min_count)?,
            None => Vocab::build(&config.corpus, config.min_count)?,
        };
        if vocab.is_empty() {
            bail!(
                "no words in {} survived the minimum count of {}",
                config.corpus.display(),
                config.min_count
            );
        }
        if let Some(path) = &config.save_vocab {
            vocab.save(path)?;
        }
        if config.hs {
            vocab.assign_huffman_codes();
        }

        let sentences = load_sentences(&config.corpus, &vocab)?;
        if config.debug > 0 {
            eprintln!(
                "Vocab size: {}, words in train file: {}",
                vocab.len(),
                vocab.total_count
            );
        }

        let vocab_n = vocab.len();
        let dim = config.size;

        let mut seed_rng = StdRng::seed_from_u64(1);
        let syn0: Vec<AtomicU32> = (0..vocab_n * dim)
            .map(|_| {
                let v = (seed_rng.gen::<f32>() - 0.5) / dim as f32;
                AtomicU32::new(v.to_bits())
            })
            .collect();
        let syn1: Vec<AtomicU32> = if config.hs {
            (0..vocab_n * dim).map(|_| AtomicU32::new(0)).collect()
        } else {
            Vec::new()
        };
        let syn1neg: Vec<AtomicU32> = if config.negative > 0 {
            (0..vocab_n * dim).map(|_| AtomicU32::new(0)).collect()
        } else {
            Vec::new()
        };
        let table = if config.negative > 0 {
            build_unigram_table(&vocab, UNIGRAM_TABLE_SIZE)
        } else {
            Vec::new()
        };

        let word_count_actual = AtomicU64::new(0);
        let params = SharedParams {
            dim,
            window: config.window,
            starting_alpha: config.alpha,
            sample: config.sample,
            hs: config.hs,
            negative: config.negative,
            kind: config.model,
            iter: config.iter,
            debug: config.debug,
            total_words: vocab.total_count * config.iter + 1,
            vocab: &vocab,
            syn0: &syn0,
            syn1: &syn1,
            syn1neg: &syn1neg,
            table: &table,
            word_count_actual: &word_count_actual,
        };

        let shard_size = sentences.len().div_ceil(config.threads).max(1);
        std::thread::scope(|scope| {
            for (tid, shard) in sentences.chunks(shard_size).enumerate() {
                let params = &params;
                scope.spawn(move || train_shard(params, shard, tid as u64 + 1));
            }
        });

        let raw: Vec<f32> = syn0
            .iter()
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)))
            .collect();
        let words: Vec<String> = vocab.words.iter().map(|w| w.word.clone()).collect();

        if config.classes > 0 {
            write_classes(config, &words, dim, &raw)?;
        } else {
            save_vectors(&config.output, &words, dim, &raw, config.binary)?;
        }

        Ok(TrainedStats {
            vocab_size: vocab_n,
            words_trained: word_count_actual.into_inner(),
        })
    }
}

/// Everything a worker thread shares, read-only except the atomics.
struct SharedParams<'a> {
    dim: usize,
    window: usize,
    starting_alpha: f32,
    sample: f32,
    hs: bool,
    negative: usize,
    kind: ModelKind,
    iter: u64,
    debug: u32,
    total_words: u64,
    vocab: &'a Vocab,
    syn0: &'a [AtomicU32],
    syn1: &'a [AtomicU32],
    syn1neg: &'a [AtomicU32],
    table: &'a [u32],
    word_count_actual: &'a AtomicU64,
}

/// Tokenize the corpus into sentences of vocabulary indices.
///
/// One line is one sentence; out-of-vocabulary tokens are dropped.
fn load_sentences(corpus: &std::path::Path, vocab: &Vocab) -> Result<Vec<Vec<usize>>> {
    let file = File::open(corpus)
        .with_context(|| format!("Failed to open corpus: {}", corpus.display()))?;
    let reader = BufReader::new(file);

    let mut sentences = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read corpus: {}", corpus.display()))?;
        let sentence: Vec<usize> = line
            .split_whitespace()
            .filter_map(|token| vocab.lookup(token))
            .collect();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }
    Ok(sentences)
}

/// Sampling table proportional to count^0.75.
fn build_unigram_table(vocab: &Vocab, table_size: usize) -> Vec<u32> {
    let powered_total: f64 = vocab
        .words
        .iter()
        .map(|w| (w.count as f64).powf(UNIGRAM_POWER))
        .sum();

    let mut table = Vec::with_capacity(table_size);
    let mut cumulative = (vocab.words[0].count as f64).powf(UNIGRAM_POWER) / powered_total;
    let mut word = 0usize;
    for i in 0..table_size {
        table.push(word as u32);
        if i as f64 / table_size as f64 > cumulative {
            if word < vocab.len() - 1 {
                word += 1;
            }
            cumulative += (vocab.words[word].count as f64).powf(UNIGRAM_POWER) / powered_total;
        }
    }
    table
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

fn add_f32(cell: &AtomicU32, delta: f32) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f32::from_bits(current) + delta).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

fn dot_rows(probe: &[f32], row: &[AtomicU32]) -> f32 {
    probe
        .iter()
        .zip(row.iter())
        .map(|(p, cell)| p * load_f32(cell))
        .sum()
}

/// Keep-probability test for frequent-word subsampling.
fn keep_word(count: u64, total: u64, sample: f32, rng: &mut StdRng) -> bool {
    if sample <= 0.0 {
        return true;
    }
    let threshold = sample as f64 * total as f64;
    let frequency = count as f64;
    let keep = (threshold / frequency).sqrt() + threshold / frequency;
    keep >= rng.gen::<f64>()
}

/// Train one shard of sentences for the full iteration count.
fn train_shard(params: &SharedParams<'_>, sentences: &[Vec<usize>], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut alpha = params.starting_alpha;
    let mut pending: u64 = 0;

    let mut neu1 = vec![0.0f32; params.dim];
    let mut neu1e = vec![0.0f32; params.dim];

    for _ in 0..params.iter {
        for sentence in sentences {
            pending += sentence.len() as u64;
            if pending >= ALPHA_UPDATE_INTERVAL {
                let seen = params.word_count_actual.fetch_add(pending, Ordering::Relaxed) + pending;
                pending = 0;
                let progress = seen as f32 / params.total_words as f32;
                alpha = (params.starting_alpha * (1.0 - progress))
                    .max(params.starting_alpha * MIN_ALPHA_RATIO);
                if params.debug > 1 {
                    eprintln!("Alpha: {:.6}  Progress: {:.2}%", alpha, progress * 100.0);
                }
            }

            let kept: Vec<usize> = sentence
                .iter()
                .copied()
                .filter(|&w| {
                    keep_word(
                        params.vocab.words[w].count,
                        params.vocab.total_count,
                        params.sample,
                        &mut rng,
                    )
                })
                .collect();

            for pos in 0..kept.len() {
                let word = kept[pos];
                let shrink = rng.gen_range(0..params.window);
                let span = params.window - shrink;
                let lo = pos.saturating_sub(span);
                let hi = (pos + span).min(kept.len() - 1);

                match params.kind {
                    ModelKind::Cbow => {
                        cbow_step(params, &kept, pos, word, lo, hi, alpha, &mut rng, &mut neu1, &mut neu1e)
                    }
                    ModelKind::Skipgram => {
                        skipgram_step(params, &kept, pos, word, lo, hi, alpha, &mut rng, &mut neu1e)
                    }
                }
            }
        }
    }

    params.word_count_actual.fetch_add(pending, Ordering::Relaxed);
}

/// One output-layer pass: accumulates the input-side gradient in `neu1e`
/// and applies the output-side updates.
fn output_layer(
    params: &SharedParams<'_>,
    probe: &[f32],
    word: usize,
    alpha: f32,
    rng: &mut StdRng,
    neu1e: &mut [f32],
) {
    let dim = params.dim;

    if params.hs {
        let entry = &params.vocab.words[word];
        for (code, &node) in entry.code.iter().zip(entry.point.iter()) {
            let row = &params.syn1[node * dim..(node + 1) * dim];
            let f = dot_rows(probe, row);
            if !(-MAX_SIGMOID_INPUT..=MAX_SIGMOID_INPUT).contains(&f) {
                continue;
            }
            let f = sigmoid(f);
            let g = (1.0 - *code as f32 - f) * alpha;
            for ((e, p), cell) in neu1e.iter_mut().zip(probe).zip(row) {
                *e += g * load_f32(cell);
                add_f32(cell, g * p);
            }
        }
    }

    if params.negative > 0 {
        for d in 0..=params.negative {
            let (target, label) = if d == 0 {
                (word, 1.0f32)
            } else {
                let pick = params.table[rng.gen_range(0..params.table.len())] as usize;
                if pick == word {
                    continue;
                }
                (pick, 0.0)
            };
            let row = &params.syn1neg[target * dim..(target + 1) * dim];
            let f = dot_rows(probe, row);
            let g = if f > MAX_SIGMOID_INPUT {
                (label - 1.0) * alpha
            } else if f < -MAX_SIGMOID_INPUT {
                label * alpha
            } else {
                (label - sigmoid(f)) * alpha
            };
            for ((e, p), cell) in neu1e.iter_mut().zip(probe).zip(row) {
                *e += g * load_f32(cell);
                add_f32(cell, g * p);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cbow_step(
    params: &SharedParams<'_>,
    sentence: &[usize],
    pos: usize,
    word: usize,
    lo: usize,
    hi: usize,
    alpha: f32,
    rng: &mut StdRng,
    neu1: &mut [f32],
    neu1e: &mut [f32],
) {
    let dim = params.dim;
    neu1.fill(0.0);
    neu1e.fill(0.0);

    let mut context = 0usize;
    for c in lo..=hi {
        if c == pos {
            continue;
        }
        let row = &params.syn0[sentence[c] * dim..(sentence[c] + 1) * dim];
        for (acc, cell) in neu1.iter_mut().zip(row) {
            *acc += load_f32(cell);
        }
        context += 1;
    }
    if context == 0 {
        return;
    }
    let scale = 1.0 / context as f32;
    for acc in neu1.iter_mut() {
        *acc *= scale;
    }

    output_layer(params, neu1, word, alpha, rng, neu1e);

    for c in lo..=hi {
        if c == pos {
            continue;
        }
        let row = &params.syn0[sentence[c] * dim..(sentence[c] + 1) * dim];
        for (e, cell) in neu1e.iter().zip(row) {
            add_f32(cell, *e);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn skipgram_step(
    params: &SharedParams<'_>,
    sentence: &[usize],
    pos: usize,
    word: usize,
    lo: usize,
    hi: usize,
    alpha: f32,
    rng: &mut StdRng,
    neu1e: &mut [f32],
) {
    let dim = params.dim;

    for c in lo..=hi {
        if c == pos {
            continue;
        }
        let context_word = sentence[c];
        let row = &params.syn0[context_word * dim..(context_word + 1) * dim];
        neu1e.fill(0.0);

        let probe: Vec<f32> = row.iter().map(load_f32).collect();
        output_layer(params, &probe, word, alpha, rng, neu1e);

        for (e, cell) in neu1e.iter().zip(row) {
            add_f32(cell, *e);
        }
    }
}

/// Cluster the trained vectors with k-means and write "word class" lines.
fn write_classes(config: &TrainingConfig, words: &[String], dim: usize, raw: &[f32]) -> Result<()> {
    const KMEANS_ITERATIONS: usize = 10;

    let n = words.len();
    let k = config.classes.min(n);
    let mut assignment: Vec<usize> = (0..n).map(|i| i % k).collect();
    let mut centroids = vec![0.0f32; k * dim];

    for _ in 0..KMEANS_ITERATIONS {
        // centroid = normalized mean of member vectors
        centroids.fill(0.0);
        let mut members = vec![0usize; k];
        for (i, &cluster) in assignment.iter().enumerate() {
            members[cluster] += 1;
            let row = &raw[i * dim..(i + 1) * dim];
            let centroid = &mut centroids[cluster * dim..(cluster + 1) * dim];
            for (c, v) in centroid.iter_mut().zip(row) {
                *c += v;
            }
        }
        for cluster in 0..k {
            let centroid = &mut centroids[cluster * dim..(cluster + 1) * dim];
            let count = members[cluster].max(1) as f32;
            for c in centroid.iter_mut() {
                *c /= count;
            }
            let norm = centroid.iter().map(|c| c * c).sum::<f32>().sqrt();
            if norm > 0.0 {
                for c in centroid.iter_mut() {
                    *c /= norm;
                }
            }
        }

        for (i, slot) in assignment.iter_mut().enumerate() {
            let row = &raw[i * dim..(i + 1) * dim];
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for cluster in 0..k {
                let centroid = &centroids[cluster * dim..(cluster + 1) * dim];
                let score: f32 = row.iter().zip(centroid).map(|(a, b)| a * b).sum();
                if score > best_score {
                    best_score = score;
                    best = cluster;
                }
            }
            *slot = best;
        }
    }

    let file = File::create(&config.output)
        .with_context(|| format!("Failed to create class file: {}", config.output.display()))?;
    let mut writer = BufWriter::new(file);
    for (word, cluster) in words.iter().zip(assignment.iter()) {
        writeln!(writer, "{} {}", word, cluster)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word2vec::model::VectorModel;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn write_corpus(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("corpus.txt");
        let mut f = File::create(&path).unwrap();
        // tiny repetitive corpus so every word clears min_count
        for _ in 0..60 {
            writeln!(f, "the cat chased the mouse").unwrap();
            writeln!(f, "the dog chased the cat").unwrap();
            writeln!(f, "birds fly over the house").unwrap();
        }
        path
    }

    fn small_config(dir: &tempfile::TempDir) -> TrainingConfig {
        TrainingConfig {
            corpus: write_corpus(dir),
            output: dir.path().join("vectors.bin"),
            size: 16,
            threads: 2,
            iter: 3,
            window: 3,
            min_count: 5,
            debug: 0,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_train_writes_loadable_binary_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(&dir);
        let output = config.output.clone();

        let stats = Word2Vec::new(config).train().unwrap();
        assert!(stats.vocab_size >= 8);
        assert!(stats.words_trained > 0);

        let model = VectorModel::load(&output).unwrap();
        assert_eq!(model.word_count(), stats.vocab_size);
        assert_eq!(model.dim(), 16);
        assert!(model.lookup("cat").is_some());
        for i in 0..model.word_count() {
            assert!(model.vector(i).iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_train_text_output_and_skipgram_hs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(&dir);
        config.output = dir.path().join("vectors.txt");
        config.binary = false;
        config.model = ModelKind::Skipgram;
        config.hs = true;
        config.negative = 0;
        let output = config.output.clone();

        Word2Vec::new(config).train().unwrap();
        let model = VectorModel::load(&output).unwrap();
        assert_eq!(model.dim(), 16);
        assert!(model.word_count() >= 8);
    }

    #[test]
    fn test_train_saves_vocab_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(&dir);
        let vocab_path = dir.path().join("vocab.txt");
        config.save_vocab = Some(vocab_path.clone());

        Word2Vec::new(config).train().unwrap();
        let vocab = Vocab::read(&vocab_path, 1).unwrap();
        assert!(vocab.lookup("the").is_some());
        assert_eq!(vocab.lookup("the"), Some(0)); // most frequent word first
    }

    #[test]
    fn test_train_fails_on_empty_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(&dir);
        config.min_count = 10_000;
        assert!(Word2Vec::new(config).train().is_err());
    }

    #[test]
    fn test_train_fails_on_missing_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(&dir);
        config.corpus = dir.path().join("no-such-file.txt");
        assert!(Word2Vec::new(config).train().is_err());
    }

    #[test]
    fn test_classes_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(&dir);
        config.classes = 3;
        config.output = dir.path().join("classes.txt");
        let output = config.output.clone();

        let stats = Word2Vec::new(config).train().unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), stats.vocab_size);
        for line in lines {
            let mut parts = line.split_whitespace();
            let _word = parts.next().unwrap();
            let cluster: usize = parts.next().unwrap().parse().unwrap();
            assert!(cluster < 3);
        }
    }

    #[test]
    fn test_unigram_table_tracks_frequency() {
        let vocab = Vocab::from_counts(
            vec![
                ("common".to_string(), 1000),
                ("middling".to_string(), 100),
                ("rare".to_string(), 10),
            ],
            1,
        );
        let table = build_unigram_table(&vocab, 10_000);
        assert_eq!(table.len(), 10_000);

        let mut hits = [0usize; 3];
        for &entry in &table {
            hits[entry as usize] += 1;
        }
        assert!(hits[0] > hits[1]);
        assert!(hits[1] > hits[2]);
        assert!(hits[2] > 0);
    }

    #[test]
    fn test_subsampling_keeps_rare_words() {
        let mut rng = StdRng::seed_from_u64(7);
        // rare words pass the threshold test outright
        for _ in 0..100 {
            assert!(keep_word(1, 1_000_000, 1e-4, &mut rng));
        }
        // a word making up most of the corpus is dropped sometimes
        let kept = (0..1000)
            .filter(|_| keep_word(900_000, 1_000_000, 1e-4, &mut rng))
            .count();
        assert!(kept < 1000);
        // disabled subsampling keeps everything
        for _ in 0..100 {
            assert!(keep_word(900_000, 1_000_000, 0.0, &mut rng));
        }
    }

    #[test]
    fn test_atomic_f32_cells() {
        let cell = AtomicU32::new(1.5f32.to_bits());
        add_f32(&cell, 2.25);
        assert_eq!(load_f32(&cell), 3.75);
        add_f32(&cell, -3.75);
        assert_eq!(load_f32(&cell), 0.0);
    }
}
