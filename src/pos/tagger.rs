//! Statistical part-of-speech tagger oracle
//!
//! This is a unigram tagger using the Penn Treebank tagset: each known word
//! gets its most likely tag from a lexicon, closed-class words (determiners,
//! prepositions, pronouns...) get their tag from a built-in table, and other
//! unknown words are tagged by looking at their shape and suffix.

use super::{CategoryOracle, CategorySet, WordCategory};
use crate::Result;
use anyhow::Context;
use std::{collections::HashMap, path::Path};

/// Tagger backed by a lexicon of most likely tags
#[derive(Clone, Debug, Default)]
pub struct LexiconTagger {
    /// Most likely tag of each known word
    lexicon: HashMap<Box<str>, Box<str>>,
}
//
impl LexiconTagger {
    /// Tagger that only knows about word shapes and suffixes
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a lexicon file
    ///
    /// Each line contains a word followed by its possible tags, most likely
    /// tag first, all separated by whitespace.
    pub async fn load(path: &Path) -> Result<Self> {
        let lexicon = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading tagger lexicon {}", path.display()))?;
        let tagger = Self::from_lexicon(&lexicon);
        log::info!(
            "Loaded {} words from tagger lexicon {}",
            tagger.lexicon.len(),
            path.display()
        );
        Ok(tagger)
    }

    /// Build a tagger from the contents of a lexicon file
    pub fn from_lexicon(lexicon: &str) -> Self {
        let mut result = Self::new();
        for line in lexicon.lines() {
            let mut fields = line.split_whitespace();
            let (Some(word), Some(tag)) = (fields.next(), fields.next()) else {
                continue;
            };
            // First entry wins, as lexicons can list a word several times
            result.lexicon.entry(word.into()).or_insert_with(|| tag.into());
        }
        result
    }

    /// Tag a word, treated as a sentence of its own
    pub fn tag<'tagger>(&'tagger self, word: &str) -> &'tagger str {
        if let Some(tag) = self.lexicon.get(word) {
            return &**tag;
        }
        if word.chars().any(char::is_uppercase) {
            if let Some(tag) = self.lexicon.get(&*word.to_lowercase()) {
                return &**tag;
            }
        }
        closed_class_tag(word).unwrap_or_else(|| guess_tag(word))
    }
}
//
impl CategoryOracle for LexiconTagger {
    fn name(&self) -> &'static str {
        "tagger"
    }

    fn categories(&self, word: &str) -> Result<CategorySet> {
        Ok(WordCategory::from_penn_tag(self.tag(word))
            .map(CategorySet::from)
            .unwrap_or_default())
    }
}

/// Tags of the function words, which suffix rules would otherwise turn into
/// nouns
const CLOSED_CLASS: &[(&str, &[&str])] = &[
    (
        "DT",
        &[
            "a", "an", "the", "this", "that", "these", "those", "all", "any", "some", "each",
            "every", "no", "another", "both", "either", "neither",
        ],
    ),
    (
        "IN",
        &[
            "of", "in", "on", "at", "by", "for", "with", "from", "into", "onto", "about",
            "above", "across", "after", "against", "along", "among", "around", "before",
            "behind", "below", "beneath", "beside", "between", "beyond", "during", "except",
            "inside", "near", "outside", "over", "since", "than", "through", "throughout",
            "toward", "towards", "under", "underneath", "until", "unto", "upon", "via",
            "within", "without", "whether", "because", "although", "though", "while", "if",
            "unless", "as",
        ],
    ),
    ("TO", &["to"]),
    ("CC", &["and", "or", "but", "nor", "yet", "plus"]),
    (
        "PRP",
        &[
            "i", "me", "you", "he", "him", "she", "her", "it", "we", "us", "they", "them",
            "myself", "yourself", "himself", "herself", "itself", "ourselves", "yourselves",
            "themselves",
        ],
    ),
    ("PRP$", &["my", "your", "his", "its", "our", "their"]),
    ("WDT", &["which", "whatever", "whichever"]),
    ("WP", &["who", "whom", "what", "whoever"]),
    ("WP$", &["whose"]),
    ("WRB", &["when", "where", "why", "how", "whenever", "wherever"]),
    (
        "MD",
        &[
            "can", "could", "may", "might", "must", "shall", "should", "will", "would",
        ],
    ),
    ("EX", &["there"]),
    ("VBZ", &["is", "has", "does"]),
    ("VBP", &["am", "are"]),
    ("VBD", &["was", "were", "had", "did"]),
    ("VBN", &["been"]),
    ("VB", &["be"]),
    ("RB", &["not", "never", "very", "too", "also", "so", "just"]),
    ("UH", &["oh", "yes", "hello"]),
];

/// Tag of a closed-class word, if it is one
fn closed_class_tag(word: &str) -> Option<&'static str> {
    let lowercase = word.to_lowercase();
    CLOSED_CLASS
        .iter()
        .find(|(_, words)| words.contains(&lowercase.as_str()))
        .map(|&(tag, _)| tag)
}

/// Suffixes that mostly appear at the end of adjectives
const ADJECTIVE_SUFFIXES: &[&str] = &[
    "able", "ible", "al", "ful", "ous", "ive", "less", "ic", "ish", "ary",
];

/// Tag an unknown word from its shape
fn guess_tag(word: &str) -> &'static str {
    let len = word.chars().count();
    let has_suffix = |suffix: &str, min_stem: usize| {
        word.ends_with(suffix) && len >= suffix.len() + min_stem
    };
    if word.chars().any(|c| c.is_ascii_digit()) {
        "CD"
    } else if has_suffix("ly", 2) {
        "RB"
    } else if has_suffix("ing", 2) {
        "VBG"
    } else if has_suffix("ed", 2) {
        "VBN"
    } else if ADJECTIVE_SUFFIXES.iter().any(|&suffix| has_suffix(suffix, 3)) {
        "JJ"
    } else if word.contains('-') {
        "JJ"
    } else if word.chars().next().is_some_and(char::is_uppercase) {
        "NNP"
    } else if has_suffix("s", 3) && !word.ends_with("ss") {
        "NNS"
    } else {
        "NN"
    }
}
