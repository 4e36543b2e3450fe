//! Distance and analogy query views over a loaded vector model.
//!
//! Both views share one [`VectorModel`] by reference counting and never
//! mutate it, so repeated and concurrent queries are safe. Results are
//! cosine-ranked and capped at [`MAX_NEIGHBORS`] rows; the query's own
//! words are excluded from the ranking.

use anyhow::{bail, Result};
use std::sync::Arc;

use super::model::VectorModel;
use crate::bench::{Neighbor, PhraseSearcher};

/// Maximum neighbors returned per query.
pub const MAX_NEIGHBORS: usize = 40;

/// Nearest-word search for a phrase.
///
/// The phrase's word vectors are averaged into a single probe vector and
/// every other vocabulary word is ranked by cosine similarity to it.
pub struct DistanceSearch {
    model: Arc<VectorModel>,
}

impl DistanceSearch {
    pub fn new(model: Arc<VectorModel>) -> Self {
        Self { model }
    }
}

impl PhraseSearcher for DistanceSearch {
    fn search(&self, phrase: &str) -> Result<Vec<Neighbor>> {
        let ids = resolve_words(&self.model, phrase)?;
        if ids.is_empty() {
            bail!("empty query phrase");
        }

        let dim = self.model.dim();
        let mut probe = vec![0.0f32; dim];
        for &id in &ids {
            for (p, v) in probe.iter_mut().zip(self.model.vector(id)) {
                *p += v;
            }
        }
        let scale = 1.0 / ids.len() as f32;
        for p in probe.iter_mut() {
            *p *= scale;
        }

        Ok(nearest(&self.model, &probe, &ids))
    }
}

/// Analogy search: "a b c" asks which word relates to `c` as `b` relates
/// to `a`, probing with `v(b) - v(a) + v(c)`.
pub struct AnalogySearch {
    model: Arc<VectorModel>,
}

impl AnalogySearch {
    pub fn new(model: Arc<VectorModel>) -> Self {
        Self { model }
    }
}

impl PhraseSearcher for AnalogySearch {
    fn search(&self, phrase: &str) -> Result<Vec<Neighbor>> {
        let ids = resolve_words(&self.model, phrase)?;
        if ids.len() != 3 {
            bail!(
                "analogy query needs exactly three words, got {} in '{}'",
                ids.len(),
                phrase
            );
        }

        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let probe: Vec<f32> = self
            .model
            .vector(b)
            .iter()
            .zip(self.model.vector(a))
            .zip(self.model.vector(c))
            .map(|((vb, va), vc)| vb - va + vc)
            .collect();

        Ok(nearest(&self.model, &probe, &ids))
    }
}

/// Map every phrase word to its vocabulary index; unknown words are fatal.
fn resolve_words(model: &VectorModel, phrase: &str) -> Result<Vec<usize>> {
    let mut ids = Vec::new();
    for word in phrase.split_whitespace() {
        match model.lookup(word) {
            Some(id) => ids.push(id),
            None => bail!("word '{}' is not in the vocabulary", word),
        }
    }
    Ok(ids)
}

/// Rank all words by cosine similarity to `probe`, skipping `exclude`.
fn nearest(model: &VectorModel, probe: &[f32], exclude: &[usize]) -> Vec<Neighbor> {
    let norm = probe.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = (0..model.word_count())
        .filter(|id| !exclude.contains(id))
        .map(|id| {
            let dot: f32 = probe
                .iter()
                .zip(model.vector(id))
                .map(|(p, v)| p * v)
                .sum();
            (id, dot / norm)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_NEIGHBORS);

    scored
        .into_iter()
        .map(|(id, distance)| Neighbor {
            word: model.word(id).to_string(),
            distance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capital_model() -> Arc<VectorModel> {
        // a small parallelogram: madrid - paris ≈ spain - france
        let words = vec![
            "paris".to_string(),
            "france".to_string(),
            "madrid".to_string(),
            "spain".to_string(),
            "banana".to_string(),
        ];
        let vectors = vec![
            1.0, 0.0, 2.0, 0.0, // paris: city + fr
            0.0, 1.0, 2.0, 0.0, // france: country + fr
            1.0, 0.0, 0.0, 1.0, // madrid: city + es
            0.0, 1.0, 0.0, 1.0, // spain: country + es
            0.0, 0.0, -1.0, -1.0, // banana: points away from everything
        ];
        Arc::new(VectorModel::from_parts(words, 4, vectors).unwrap())
    }

    #[test]
    fn test_distance_ranks_by_cosine_and_excludes_inputs() {
        let model = capital_model();
        let search = DistanceSearch::new(Arc::clone(&model));

        let results = search.search("paris").unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|n| n.word != "paris"));
        // france shares the fr component; banana points away
        assert_eq!(results[0].word, "france");
        assert_eq!(results.last().unwrap().word, "banana");
        // scores arrive in descending order
        for pair in results.windows(2) {
            assert!(pair[0].distance >= pair[1].distance);
        }
    }

    #[test]
    fn test_distance_averages_multi_word_phrase() {
        let model = capital_model();
        let search = DistanceSearch::new(model);

        let results = search.search("paris france").unwrap();
        assert!(results.iter().all(|n| n.word != "paris" && n.word != "france"));
        assert!(!results.is_empty());
    }

    #[test]
    fn test_analogy_finds_the_fourth_corner() {
        let model = capital_model();
        let search = AnalogySearch::new(model);

        // france - paris + madrid = spain
        let results = search.search("paris france madrid").unwrap();
        assert_eq!(results[0].word, "spain");
        for n in &results {
            assert!(n.word != "paris" && n.word != "france" && n.word != "madrid");
        }
    }

    #[test]
    fn test_analogy_requires_three_words() {
        let model = capital_model();
        let search = AnalogySearch::new(model);
        assert!(search.search("paris france").is_err());
        assert!(search.search("paris france madrid spain").is_err());
    }

    #[test]
    fn test_unknown_word_is_fatal() {
        let model = capital_model();
        let distance = DistanceSearch::new(Arc::clone(&model));
        let analogy = AnalogySearch::new(model);
        assert!(distance.search("paris atlantis").is_err());
        assert!(analogy.search("paris france atlantis").is_err());
    }

    #[test]
    fn test_result_set_is_bounded() {
        let n = MAX_NEIGHBORS + 20;
        let dim = 8;
        let words: Vec<String> = (0..n).map(|i| format!("w{}", i)).collect();
        let vectors: Vec<f32> = (0..n * dim)
            .map(|i| ((i * 7 + 13) as f32).sin())
            .collect();
        let model = Arc::new(VectorModel::from_parts(words, dim, vectors).unwrap());

        let search = DistanceSearch::new(model);
        let results = search.search("w0").unwrap();
        assert_eq!(results.len(), MAX_NEIGHBORS);
    }

    #[test]
    fn test_repeated_queries_are_deterministic() {
        let model = capital_model();
        let search = DistanceSearch::new(model);
        let first = search.search("paris france madrid").unwrap();
        let second = search.search("paris france madrid").unwrap();
        assert_eq!(first, second);
    }
}
