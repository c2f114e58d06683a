//! In-memory text search index.
//!
//! # Invariants
//! - Documents are tokenized into lowercase words.
//! - A document matches when every query term prefixes one of its words.
//! - Results are ordered by node ID for determinism.

use super::{SearchDoc, SearchIndex};
use crate::model::raw_node::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Search index kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    docs: RwLock<BTreeMap<NodeId, BTreeSet<String>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for MemorySearchIndex {
    fn index(&self, doc: SearchDoc) {
        let mut words = tokenize(&doc.name);
        if let Some(text) = &doc.text {
            words.extend(tokenize(text));
        }
        let mut docs = self
            .docs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.insert(doc.id, words);
    }

    fn remove(&self, id: &str) {
        let mut docs = self
            .docs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.remove(id);
    }

    fn search(&self, query: &str) -> Vec<NodeId> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let docs = self
            .docs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.iter()
            .filter(|(_, words)| {
                terms
                    .iter()
                    .all(|term| words.iter().any(|word| word.starts_with(term.as_str())))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    WORD_RE
        .find_iter(text)
        .map(|word| word.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{tokenize, MemorySearchIndex};
    use crate::backend::{SearchDoc, SearchIndex};

    fn doc(id: &str, name: &str, text: Option<&str>) -> SearchDoc {
        SearchDoc {
            id: id.to_string(),
            name: name.to_string(),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn tokenize_lowercases_and_splits_punctuation() {
        let words = tokenize("Buy milk, then EGGS!");
        assert!(words.contains("buy"));
        assert!(words.contains("eggs"));
        assert!(!words.contains(","));
    }

    #[test]
    fn search_requires_every_term_as_prefix() {
        let index = MemorySearchIndex::new();
        index.index(doc("n1", "Grocery list", Some("milk eggs")));
        index.index(doc("n2", "Project notes", Some("milestones")));

        assert_eq!(index.search("mil"), vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(index.search("groc MILK"), vec!["n1".to_string()]);
        assert!(index.search("   ").is_empty());
    }

    #[test]
    fn reindex_replaces_and_remove_forgets() {
        let index = MemorySearchIndex::new();
        index.index(doc("n1", "Draft", None));
        index.index(doc("n1", "Final", None));

        assert!(index.search("draft").is_empty());
        assert_eq!(index.search("final"), vec!["n1".to_string()]);

        index.remove("n1");
        assert!(index.is_empty());
    }
}
