//! Vocabulary construction and persistence.
//!
//! Words are counted from whitespace-tokenized corpus lines, filtered by
//! a minimum count, and kept in descending-count order. When hierarchical
//! softmax is enabled, every word additionally carries its Huffman code
//! and the output-node path that code descends through.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One vocabulary entry.
#[derive(Debug, Clone)]
pub struct VocabWord {
    pub word: String,
    pub count: u64,
    /// Huffman code, root to leaf; empty until codes are assigned.
    pub code: Vec<u8>,
    /// Output-layer node index for each code position.
    pub point: Vec<usize>,
}

/// Corpus vocabulary, ordered by descending count.
#[derive(Debug, Clone)]
pub struct Vocab {
    pub words: Vec<VocabWord>,
    index: HashMap<String, usize>,
    /// Total occurrences of all kept words.
    pub total_count: u64,
}

impl Vocab {
    /// Count words in a corpus file and keep those at or above `min_count`.
    pub fn build(corpus: &Path, min_count: u64) -> Result<Self> {
        let file = File::open(corpus)
            .with_context(|| format!("Failed to open corpus: {}", corpus.display()))?;
        let reader = BufReader::new(file);

        let mut counts: HashMap<String, u64> = HashMap::new();
        for line in reader.lines() {
            let line = line.with_context(|| format!("Failed to read corpus: {}", corpus.display()))?;
            for token in line.split_whitespace() {
                *counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }

        Ok(Self::from_counts(counts.into_iter().collect(), min_count))
    }

    /// Build from raw (word, count) pairs.
    pub fn from_counts(counts: Vec<(String, u64)>, min_count: u64) -> Self {
        let mut kept: Vec<(String, u64)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .collect();
        // descending count, ties broken alphabetically for determinism
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let total_count = kept.iter().map(|(_, count)| count).sum();
        let index = kept
            .iter()
            .enumerate()
            .map(|(i, (word, _))| (word.clone(), i))
            .collect();
        let words = kept
            .into_iter()
            .map(|(word, count)| VocabWord {
                word,
                count,
                code: Vec::new(),
                point: Vec::new(),
            })
            .collect();

        Self {
            words,
            index,
            total_count,
        }
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Write the vocabulary as "word count" lines.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create vocab file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for entry in &self.words {
            writeln!(writer, "{} {}", entry.word, entry.count)?;
        }
        Ok(())
    }

    /// Read a vocabulary previously written by [`Vocab::save`].
    pub fn read(path: &Path, min_count: u64) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open vocab file: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut counts = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (word, count) = match (parts.next(), parts.next()) {
                (Some(word), Some(count)) => (word, count),
                _ => bail!("malformed vocab line {} in {}", lineno + 1, path.display()),
            };
            let count: u64 = count.parse().with_context(|| {
                format!("bad count on vocab line {} in {}", lineno + 1, path.display())
            })?;
            counts.push((word.to_string(), count));
        }

        Ok(Self::from_counts(counts, min_count))
    }

    /// Assign Huffman codes and output-node paths from word counts.
    ///
    /// Builds the tree over the descending-count ordering with the
    /// two-pointer merge: leaves occupy indices `0..n`, internal nodes
    /// `n..2n-1`, the root is `2n-2`. Output-layer rows are indexed by
    /// `internal node - n`, so every word's path starts at row `n - 2`.
    pub fn assign_huffman_codes(&mut self) {
        let n = self.words.len();
        if n < 2 {
            return;
        }

        let total = 2 * n - 1;
        let root = total - 1;
        let mut count = vec![u64::MAX; total];
        let mut binary = vec![0u8; total];
        let mut parent = vec![0usize; total];
        for (i, entry) in self.words.iter().enumerate() {
            count[i] = entry.count;
        }

        // pos1 walks the sorted leaves downward, pos2 the merged nodes upward
        let mut pos1: isize = n as isize - 1;
        let mut pos2: usize = n;
        for a in 0..n - 1 {
            let mut pick = || {
                if pos1 >= 0 && count[pos1 as usize] < count[pos2] {
                    pos1 -= 1;
                    (pos1 + 1) as usize
                } else {
                    pos2 += 1;
                    pos2 - 1
                }
            };
            let min1 = pick();
            let min2 = pick();
            count[n + a] = count[min1] + count[min2];
            parent[min1] = n + a;
            parent[min2] = n + a;
            binary[min2] = 1;
        }

        for (a, entry) in self.words.iter_mut().enumerate() {
            let mut bits = Vec::new();
            let mut nodes = Vec::new();
            let mut b = a;
            while b != root {
                bits.push(binary[b]);
                nodes.push(b);
                b = parent[b];
            }

            let depth = bits.len();
            entry.code = (0..depth).map(|d| bits[depth - 1 - d]).collect();
            entry.point = (0..depth)
                .map(|d| if d == 0 { n - 2 } else { nodes[depth - d] - n })
                .collect();
        }
    }
}
