//! Hand-curated corrections to the automated word category oracles

use super::{CategorySet, WordCategory};
use crate::Result;
use anyhow::Context;
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};
use unicase::UniCase;

/// Blacklist and whitelist of (word, category) pairs
#[derive(Clone, Debug, Default)]
pub struct Exceptions {
    /// Words that the oracles wrongly put into a category (exact match)
    blacklist: HashMap<WordCategory, HashSet<Box<str>>>,

    /// Words that always belong to a category (case-insensitive match)
    whitelist: HashMap<WordCategory, HashSet<UniCase<Box<str>>>>,
}
//
impl Exceptions {
    /// No exceptions at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Exceptions that are known to be needed for English
    pub fn builtin() -> Self {
        let mut result = Self::empty();
        for (category, words) in [
            (WordCategory::Adjective, ADJECTIVE_BLACKLIST),
            (WordCategory::Noun, NOUN_BLACKLIST),
        ] {
            for word in words {
                result.blacklist(category, word);
            }
        }
        for (category, words) in [
            (WordCategory::Adjective, ADJECTIVE_WHITELIST),
            (WordCategory::Noun, NOUN_WHITELIST),
        ] {
            for word in words {
                result.whitelist(category, word);
            }
        }
        result
    }

    /// Prevent the oracles from putting a word into a category
    pub fn blacklist(&mut self, category: WordCategory, word: &str) {
        self.blacklist.entry(category).or_default().insert(word.into());
    }

    /// Force a word into a category
    pub fn whitelist(&mut self, category: WordCategory, word: &str) {
        self.whitelist
            .entry(category)
            .or_default()
            .insert(UniCase::new(word.trim().into()));
    }

    /// Truth that oracle evidence putting this word in this category should be
    /// ignored
    pub fn is_blacklisted(&self, category: WordCategory, word: &str) -> bool {
        self.blacklist
            .get(&category)
            .is_some_and(|words| words.contains(word))
    }

    /// Categories into which a word is forced
    pub fn whitelisted(&self, word: &str) -> CategorySet {
        let key = UniCase::new(Box::<str>::from(word.trim()));
        self.whitelist
            .iter()
            .filter(|(_category, words)| words.contains(&key))
            .map(|(&category, _words)| category)
            .collect()
    }

    /// Add exceptions from a tab-separated file
    ///
    /// Each line has the form `<blacklist|whitelist> <category> <word>`, and
    /// lines starting with `#` are ignored.
    pub async fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        /// Line of an exception file
        #[derive(Debug, Deserialize)]
        struct ExceptionEntry {
            list: ExceptionList,
            category: WordCategory,
            word: Box<str>,
        }
        //
        #[derive(Clone, Copy, Debug, Deserialize)]
        #[serde(rename_all = "lowercase")]
        enum ExceptionList {
            Blacklist,
            Whitelist,
        }

        let context = || format!("loading word category exceptions from {}", path.display());
        let file = tokio::fs::File::open(path).await.with_context(context)?;
        let mut entries = AsyncReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .create_deserializer(file)
            .into_deserialize::<ExceptionEntry>();
        let mut num_entries = 0;
        while let Some(entry) = entries.next().await {
            let ExceptionEntry {
                list,
                category,
                word,
            } = entry.with_context(context)?;
            match list {
                ExceptionList::Blacklist => self.blacklist(category, &word),
                ExceptionList::Whitelist => self.whitelist(category, &word),
            }
            num_entries += 1;
        }
        log::info!(
            "Loaded {num_entries} word category exceptions from {}",
            path.display()
        );
        Ok(())
    }
}

const ADJECTIVE_BLACKLIST: &[&str] = &[
    // Numbers
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty", "thirty", "fourty", "fifty", "sixty", "seventy", "eigty", "ninety", "hundred",
    "thousand", "million", "billion", "first", "second", "third", "fourth", "sixth", "seventh",
    "eighth", "nineth", "tenth", "last",
    // Quantifiers
    "all", "any", "my", "other", "another", "only", "each", "every", "individual", "both", "same",
    "many", "some", "more", "half", "quarter", "no", "such", "much", "very", "whole", "neither",
    "kind", "what", "fewer", "various", "entire", "cherry",
    // Pronouns
    "his", "her", "our", "your", "own",
    // Directions
    "up", "down", "left", "right", "on", "off", "in", "out", "under", "above", "top", "bottom",
    "over", "about",
    // Comparatives
    "least", "less", "most", "best", "better", "strongest", "greatest", "weakest", "biggest",
    "bigger", "largest", "large", "smallest", "smaller", "stronger",
    // Letters
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
    // Verbs
    "giving", "seeing", "meaning", "present", "looking", "go", "fly", "becoming",
    // Miscellaneous
    "whatever", "just", "like", "after", "through", "then", "made", "true", "next", "set", "said",
    "spare", "here", "there", "lay", "star", "unlike", "likely", "even", "meet", "now", "union",
    "favorite", "away", "former", "latter", "quality", "mere", "few", "enough", "welcome", "soon",
];

const NOUN_BLACKLIST: &[&str] = &[
    // Numbers
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty", "thirty", "fourty", "fifty", "sixty", "seventy", "eigty", "ninety", "hundred",
    "thousand", "million", "billion", "first", "second", "third", "fourth", "sixth", "seventh",
    "eighth", "nineth", "tenth", "single", "double", "full",
    // Directions
    "up", "down", "left", "right", "on", "off", "in", "out", "under", "above", "top", "bottom",
    "over", "about", "north", "south", "east", "west", "round", "square", "upwards",
    // Letters
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
    // Verbs
    "be", "do", "will", "going", "drinking", "must", "bend", "plays", "found", "feel",
    // Colours
    "red", "green", "blue", "yellow", "purple", "orange", "teale", "black", "white",
    // Adjectives
    "wild", "uncut", "main", "plain", "straight", "raw",
    // Miscellaneous
    "something", "an", "like", "have", "as", "longer", "more", "it", "don", "or", "so", "who",
    "might", "are", "deep", "large", "now", "while", "get", "getting", "ill", "there", "here",
    "then", "inside", "kind", "sort", "may", "little", "local", "major", "say", "even", "high",
    "slight", "extra", "fine", "well", "at", "modern", "poor", "recent", "short", "can", "better",
    "far", "common", "rough", "prior", "few", "basic", "need", "middle", "open", "ethnic", "he",
    "she", "quick", "good", "anti", "last", "sweet", "adams", "still", "being", "no", "me", "old",
    "io", "ol", "same", "enough", "thou",
];

const ADJECTIVE_WHITELIST: &[&str] = &[
    "exploding", "ground", "minding", "bi", "meta", "beating", "dumped", "secured", "crunchy",
    "substituted", "steeped", "hung", "misspelled", "flavored", "blowing", "soon", "check",
];

const NOUN_WHITELIST: &[&str] = &[
    "blunt", "skirts", "myself", "humping", "channels", "finger", "end",
];
