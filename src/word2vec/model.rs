//! Persisted vector model: save, load, shared read-only access.
//!
//! Two on-disk variants share the header line `"{words} {dim}\n"`:
//! binary rows are `word`, a space, `dim` little-endian f32 values and a
//! newline; text rows are the word followed by space-separated decimal
//! floats. The loader sniffs the variant and L2-normalizes every row, so
//! inner products over loaded vectors are cosine similarities.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// A loaded, normalized, read-only vector model.
///
/// Loaded once per run and shared by reference between the query views;
/// nothing mutates it after construction.
#[derive(Debug)]
pub struct VectorModel {
    words: Vec<String>,
    index: HashMap<String, usize>,
    dim: usize,
    /// Row-major `words.len() × dim`, each row unit length.
    vectors: Vec<f32>,
}

impl VectorModel {
    /// Build a model from in-memory rows, normalizing each one.
    pub fn from_parts(words: Vec<String>, dim: usize, mut vectors: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            bail!("vector model dimensionality must be nonzero");
        }
        if vectors.len() != words.len() * dim {
            bail!(
                "vector data length {} does not match {} words x {} dims",
                vectors.len(),
                words.len(),
                dim
            );
        }

        for row in vectors.chunks_mut(dim) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in row.iter_mut() {
                    *v /= norm;
                }
            }
        }

        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        Ok(Self {
            words,
            index,
            dim,
            vectors,
        })
    }

    /// Load a model file, sniffing the binary or text variant.
    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .with_context(|| format!("Failed to open vector file: {}", path.display()))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read vector file: {}", path.display()))?;

        let header_end = bytes
            .iter()
            .position(|&b| b == b'\n')
            .context("vector file has no header line")?;
        let header = std::str::from_utf8(&bytes[..header_end])
            .context("vector file header is not UTF-8")?;
        let mut fields = header.split_whitespace();
        let word_count: usize = fields
            .next()
            .context("vector file header missing word count")?
            .parse()
            .context("bad word count in vector file header")?;
        let dim: usize = fields
            .next()
            .context("vector file header missing dimensionality")?
            .parse()
            .context("bad dimensionality in vector file header")?;
        if dim == 0 {
            bail!("vector file declares zero dimensionality");
        }

        let body = &bytes[header_end + 1..];
        let (words, vectors) = if looks_like_text(body, dim) {
            parse_text_rows(body, word_count, dim)?
        } else {
            parse_binary_rows(body, word_count, dim)?
        };

        Self::from_parts(words, dim, vectors)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, idx: usize) -> &str {
        &self.words[idx]
    }

    pub fn vector(&self, idx: usize) -> &[f32] {
        &self.vectors[idx * self.dim..(idx + 1) * self.dim]
    }
}

/// A body is text when its first line splits into one word plus exactly
/// `dim` parseable floats. A binary body fails either the UTF-8 or the
/// parse check.
fn looks_like_text(body: &[u8], dim: usize) -> bool {
    let line_end = body.iter().position(|&b| b == b'\n').unwrap_or(body.len());
    let Ok(line) = std::str::from_utf8(&body[..line_end]) else {
        return false;
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    fields.len() == dim + 1 && fields[1..].iter().all(|f| f.parse::<f32>().is_ok())
}

fn parse_text_rows(body: &[u8], word_count: usize, dim: usize) -> Result<(Vec<String>, Vec<f32>)> {
    let text = std::str::from_utf8(body).context("text vector body is not UTF-8")?;
    let mut words = Vec::with_capacity(word_count);
    let mut vectors = Vec::with_capacity(word_count * dim);

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let word = fields.next().context("vector row missing word")?;
        words.push(word.to_string());
        let mut seen = 0;
        for field in fields {
            let value: f32 = field
                .parse()
                .with_context(|| format!("bad vector component for word '{}'", word))?;
            vectors.push(value);
            seen += 1;
        }
        if seen != dim {
            bail!("word '{}' has {} components, expected {}", word, seen, dim);
        }
    }

    if words.len() != word_count {
        bail!(
            "vector file declares {} words but contains {}",
            word_count,
            words.len()
        );
    }
    Ok((words, vectors))
}

fn parse_binary_rows(body: &[u8], word_count: usize, dim: usize) -> Result<(Vec<String>, Vec<f32>)> {
    let mut words = Vec::with_capacity(word_count);
    let mut vectors = Vec::with_capacity(word_count * dim);
    let mut at = 0;

    for _ in 0..word_count {
        let word_end = body[at..]
            .iter()
            .position(|&b| b == b' ')
            .context("truncated binary vector row")?;
        let word = std::str::from_utf8(&body[at..at + word_end])
            .context("binary vector row has non-UTF-8 word")?;
        words.push(word.to_string());
        at += word_end + 1;

        let row_bytes = dim * 4;
        if at + row_bytes > body.len() {
            bail!("truncated vector data for word '{}'", word);
        }
        for chunk in body[at..at + row_bytes].chunks_exact(4) {
            vectors.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        at += row_bytes;

        // each row ends with a newline
        if body.get(at) == Some(&b'\n') {
            at += 1;
        }
    }

    Ok((words, vectors))
}

/// Persist raw (unnormalized) vectors in the binary or text variant.
pub fn save_vectors(
    path: &Path,
    words: &[String],
    dim: usize,
    vectors: &[f32],
    binary: bool,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create vector file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{} {}", words.len(), dim)?;
    for (i, word) in words.iter().enumerate() {
        let row = &vectors[i * dim..(i + 1) * dim];
        if binary {
            write!(writer, "{} ", word)?;
            for value in row {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.write_all(b"\n")?;
        } else {
            write!(writer, "{}", word)?;
            for value in row {
                write!(writer, " {}", value)?;
            }
            writeln!(writer)?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write vector file: {}", path.display()))?;
    Ok(())
}
