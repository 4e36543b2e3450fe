//! Query phrase sets
//!
//! The benchmark runs its warm-up and timed batches over a list of
//! phrases. The built-in set matches the fixed scenario; larger sets can
//! be loaded from a JSON file:
//!
//! ```json
//! {
//!   "metadata": { "name": "capitals", "description": "capital analogies" },
//!   "phrases": ["paris france madrid", "berlin germany rome"]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata about a phrase set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseSetMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A named list of query phrases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseSet {
    pub metadata: PhraseSetMetadata,
    pub phrases: Vec<String>,
}

impl PhraseSet {
    /// Load a phrase set from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read phrase file: {}", path.display()))?;
        let set: PhraseSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse phrase file: {}", path.display()))?;

        if set.phrases.is_empty() {
            bail!("phrase file {} contains no phrases", path.display());
        }
        for (i, phrase) in set.phrases.iter().enumerate() {
            if phrase.split_whitespace().next().is_none() {
                bail!("phrase {} in {} is empty", i, path.display());
            }
        }

        Ok(set)
    }

    /// The built-in single-phrase set
    pub fn default_set() -> Self {
        Self {
            metadata: PhraseSetMetadata {
                name: "capitals".to_string(),
                description: "country capital analogy".to_string(),
            },
            phrases: vec!["paris france madrid".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_set() {
        let set = PhraseSet::default_set();
        assert_eq!(set.phrases, vec!["paris france madrid".to_string()]);
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrases.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"metadata": {{"name": "test"}}, "phrases": ["a b c", "d e f"]}}"#
        )
        .unwrap();

        let set = PhraseSet::load(&path).unwrap();
        assert_eq!(set.metadata.name, "test");
        assert_eq!(set.phrases.len(), 2);
    }

    #[test]
    fn test_load_rejects_empty_phrase_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrases.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"metadata": {{"name": "test"}}, "phrases": []}}"#).unwrap();

        assert!(PhraseSet::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_blank_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrases.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"metadata": {{"name": "test"}}, "phrases": ["a b c", "   "]}}"#
        )
        .unwrap();

        assert!(PhraseSet::load(&path).is_err());
    }
}
