//! Dictionary oracle backed by the WordNet lexical database
//!
//! Only the `index.*` files are needed: a word has a sense in a category if
//! and only if it appears as a lemma in that category's index.

use super::{CategoryOracle, CategorySet, WordCategory};
use crate::Result;
use anyhow::Context;
use rayon::prelude::*;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

/// Lemmas of the WordNet dictionary, by category
#[derive(Clone, Debug, Default)]
pub struct WordNetDictionary {
    lemmas: HashMap<WordCategory, HashSet<Box<str>>>,
}
//
impl WordNetDictionary {
    /// Load the index files from a WordNet `dict` directory
    pub fn load(dict_dir: &Path) -> Result<Self> {
        let lemmas = (WordCategory::ALL.as_slice().par_iter())
            .map(|&category| -> Result<_> {
                let path = dict_dir.join(index_file_name(category));
                let index = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading WordNet index {}", path.display()))?;
                let lemmas = parse_index(&index);
                log::debug!("Loaded {} {category} lemmas from WordNet", lemmas.len());
                Ok((category, lemmas))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { lemmas })
    }

    /// Build a dictionary from the contents of index files
    pub fn from_indices<'text>(
        indices: impl IntoIterator<Item = (WordCategory, &'text str)>,
    ) -> Self {
        Self {
            lemmas: indices
                .into_iter()
                .map(|(category, index)| (category, parse_index(index)))
                .collect(),
        }
    }

    /// Truth that a word has a sense in some category
    pub fn has_sense(&self, category: WordCategory, word: &str) -> bool {
        self.lemmas
            .get(&category)
            .is_some_and(|lemmas| lemmas.contains(&*normalize_lemma(word)))
    }
}
//
impl CategoryOracle for WordNetDictionary {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn categories(&self, word: &str) -> Result<CategorySet> {
        Ok(WordCategory::ALL
            .into_iter()
            .filter(|&category| self.has_sense(category, word))
            .collect())
    }
}

/// Name of the index file associated with a category
fn index_file_name(category: WordCategory) -> &'static str {
    match category {
        WordCategory::Noun => "index.noun",
        WordCategory::Verb => "index.verb",
        WordCategory::Adjective => "index.adj",
        WordCategory::Adverb => "index.adv",
    }
}

/// Extract the lemmas from an index file
///
/// Lines that start with a space are part of the license header. Every other
/// line starts with the lemma, followed by space-separated sense data.
fn parse_index(index: &str) -> HashSet<Box<str>> {
    index
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(' '))
        .filter_map(|line| line.split_ascii_whitespace().next())
        .map(Box::from)
        .collect()
}

/// Bring a word to the form used by WordNet lemmas
fn normalize_lemma(word: &str) -> String {
    word.trim().to_lowercase().replace(' ', "_")
}
