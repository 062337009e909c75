//! Word category (part of speech) resolution
//!
//! A word's categories are the union of the evidence provided by two automated
//! oracles (a dictionary and a statistical tagger), corrected by hand-curated
//! exception tables: the blacklist suppresses known false positives of the
//! oracles, and the whitelist adds categories that the oracles miss.

pub mod exceptions;
pub mod tagger;
pub mod wordnet;

use self::{exceptions::Exceptions, tagger::LexiconTagger, wordnet::WordNetDictionary};
use crate::{cache::BoundedCache, config::LinguisticsConfig, Result};
use anyhow::Context;
use serde::Deserialize;
use std::{
    fmt,
    num::NonZeroUsize,
    str::FromStr,
    sync::{Mutex, PoisonError},
};

/// Grammatical category of a word
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum WordCategory {
    Noun,
    Verb,
    #[serde(alias = "adj")]
    Adjective,
    #[serde(alias = "adv")]
    Adverb,
}
//
impl WordCategory {
    /// All supported categories
    pub const ALL: [Self; 4] = [Self::Noun, Self::Verb, Self::Adjective, Self::Adverb];

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Noun => "noun",
            Self::Verb => "verb",
            Self::Adjective => "adjective",
            Self::Adverb => "adverb",
        }
    }

    /// Map a Penn Treebank tag to the category it belongs to, if any
    pub fn from_penn_tag(tag: &str) -> Option<Self> {
        if tag.starts_with("NN") {
            Some(Self::Noun)
        } else if tag.starts_with("VB") {
            Some(Self::Verb)
        } else if tag.starts_with("JJ") {
            Some(Self::Adjective)
        } else if tag.starts_with("RB") {
            Some(Self::Adverb)
        } else {
            None
        }
    }
}
//
impl fmt::Display for WordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
//
impl FromStr for WordCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noun" => Ok(Self::Noun),
            "verb" => Ok(Self::Verb),
            "adjective" | "adj" => Ok(Self::Adjective),
            "adverb" | "adv" => Ok(Self::Adverb),
            other => anyhow::bail!("unknown word category {other:?}"),
        }
    }
}

/// Set of word categories
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct CategorySet(u8);
//
impl CategorySet {
    /// Set with no category
    pub const EMPTY: Self = Self(0);

    /// Truth that a category belongs to this set
    pub fn contains(self, category: WordCategory) -> bool {
        self.0 & Self::bit(category) != 0
    }

    /// Add a category to this set
    pub fn insert(&mut self, category: WordCategory) {
        self.0 |= Self::bit(category);
    }

    /// Truth that this set has no category
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Enumerate the categories from this set
    pub fn iter(self) -> impl Iterator<Item = WordCategory> {
        WordCategory::ALL
            .into_iter()
            .filter(move |&category| self.contains(category))
    }

    fn bit(category: WordCategory) -> u8 {
        1 << category as u8
    }
}
//
impl From<WordCategory> for CategorySet {
    fn from(category: WordCategory) -> Self {
        Self(Self::bit(category))
    }
}
//
impl FromIterator<WordCategory> for CategorySet {
    fn from_iter<T: IntoIterator<Item = WordCategory>>(iter: T) -> Self {
        let mut result = Self::EMPTY;
        for category in iter {
            result.insert(category);
        }
        result
    }
}
//
impl fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Source of evidence about the categories of a word
///
/// Implemented by the dictionary and the statistical tagger. Oracles are
/// shared between concurrently processed files, hence the thread-safety bound.
pub trait CategoryOracle: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Categories for which this oracle has evidence about a word
    fn categories(&self, word: &str) -> Result<CategorySet>;
}

/// Word category resolver
///
/// Resolution is a pure function of the word for a given set of oracles and
/// exception tables, so results are memoized in a bounded cache.
pub struct WordCategories {
    /// Lexical database
    dictionary: Box<dyn CategoryOracle>,

    /// Statistical part-of-speech tagger
    tagger: Box<dyn CategoryOracle>,

    /// Corrections to the oracles' output
    exceptions: Exceptions,

    /// Recently resolved words, if caching is enabled
    cache: Option<Mutex<BoundedCache<Box<str>, CategorySet>>>,
}
//
impl WordCategories {
    /// Set up a resolver, caching up to `cache_capacity` words (0 disables
    /// caching)
    pub fn new(
        dictionary: Box<dyn CategoryOracle>,
        tagger: Box<dyn CategoryOracle>,
        exceptions: Exceptions,
        cache_capacity: usize,
    ) -> Self {
        Self {
            dictionary,
            tagger,
            exceptions,
            cache: NonZeroUsize::new(cache_capacity).map(|cap| Mutex::new(BoundedCache::new(cap))),
        }
    }

    /// Load the linguistic resources
    pub async fn load(config: &LinguisticsConfig) -> Result<Self> {
        // WordNet indices are large, load them in the background
        let wordnet_dir = config.wordnet.clone();
        let dictionary =
            tokio::task::spawn_blocking(move || WordNetDictionary::load(&wordnet_dir));

        let tagger = if let Some(path) = &config.tagger_lexicon {
            LexiconTagger::load(path).await?
        } else {
            log::warn!("No tagger lexicon specified, tagger will only know function words and suffixes");
            LexiconTagger::new()
        };
        let mut exceptions = Exceptions::builtin();
        if let Some(path) = &config.exceptions {
            exceptions.extend_from_file(path).await?;
        }
        let dictionary = dictionary.await.context("loading the WordNet dictionary")??;
        log::info!("Loaded word categories from {}", config.wordnet.display());
        Ok(Self::new(
            Box::new(dictionary),
            Box::new(tagger),
            exceptions,
            config.word_cache,
        ))
    }

    /// Categories of a word
    pub fn categories_of(&self, word: &str) -> CategorySet {
        if let Some(cache) = &self.cache {
            let cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(&categories) = cache.get(word) {
                return categories;
            }
        }
        let categories = self.resolve(word);
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.insert(word.into(), categories);
        }
        categories
    }

    /// Compute the categories of a word, bypassing the cache
    fn resolve(&self, word: &str) -> CategorySet {
        let mut result = CategorySet::EMPTY;
        if word.trim().is_empty() {
            return result;
        }
        for oracle in [&self.dictionary, &self.tagger] {
            for category in consult(&**oracle, word).iter() {
                if self.exceptions.is_blacklisted(category, word) {
                    log::trace!(
                        "Ignored {} evidence that {word:?} is a {category}",
                        oracle.name()
                    );
                } else {
                    result.insert(category);
                }
            }
        }
        for category in self.exceptions.whitelisted(word).iter() {
            result.insert(category);
        }
        log::trace!("Resolved the categories of {word:?} to {result:?}");
        result
    }
}

/// Query an oracle, treating failures as absence of evidence
fn consult(oracle: &dyn CategoryOracle, word: &str) -> CategorySet {
    oracle.categories(word).unwrap_or_else(|e| {
        log::warn!(
            "Failed to query the {} about {word:?}, assuming no categories: {e:#}",
            oracle.name()
        );
        CategorySet::EMPTY
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    /// Oracle with canned answers that counts how often it is queried
    #[derive(Default)]
    pub struct FakeOracle {
        answers: HashMap<&'static str, CategorySet>,
        queries: Arc<AtomicUsize>,
        broken: bool,
    }
    //
    impl FakeOracle {
        pub fn new(answers: impl IntoIterator<Item = (&'static str, CategorySet)>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                ..Self::default()
            }
        }

        pub fn broken() -> Self {
            Self {
                broken: true,
                ..Self::default()
            }
        }

        pub fn query_counter(&self) -> Arc<AtomicUsize> {
            self.queries.clone()
        }
    }
    //
    impl CategoryOracle for FakeOracle {
        fn name(&self) -> &'static str {
            "fake oracle"
        }

        fn categories(&self, word: &str) -> Result<CategorySet> {
            self.queries.fetch_add(1, Ordering::Relaxed);
            anyhow::ensure!(!self.broken, "oracle is broken");
            Ok(self.answers.get(word).copied().unwrap_or_default())
        }
    }

    /// Resolver over canned dictionary and tagger answers
    pub fn resolver(
        dictionary: impl IntoIterator<Item = (&'static str, CategorySet)>,
        tagger: impl IntoIterator<Item = (&'static str, CategorySet)>,
        exceptions: Exceptions,
        cache_capacity: usize,
    ) -> WordCategories {
        WordCategories::new(
            Box::new(FakeOracle::new(dictionary)),
            Box::new(FakeOracle::new(tagger)),
            exceptions,
            cache_capacity,
        )
    }

    fn set(categories: &[WordCategory]) -> CategorySet {
        categories.iter().copied().collect()
    }

    use WordCategory::*;

    #[test]
    fn penn_tags_map_by_prefix() {
        assert_eq!(WordCategory::from_penn_tag("NNS"), Some(Noun));
        assert_eq!(WordCategory::from_penn_tag("VBG"), Some(Verb));
        assert_eq!(WordCategory::from_penn_tag("JJR"), Some(Adjective));
        assert_eq!(WordCategory::from_penn_tag("RB"), Some(Adverb));
        assert_eq!(WordCategory::from_penn_tag("DT"), None);
        assert_eq!(WordCategory::from_penn_tag("CD"), None);
    }

    #[test]
    fn category_set_basics() {
        let mut categories = CategorySet::EMPTY;
        assert!(categories.is_empty());
        categories.insert(Verb);
        categories.insert(Adverb);
        assert!(categories.contains(Verb));
        assert!(!categories.contains(Noun));
        assert_eq!(categories.iter().collect::<Vec<_>>(), vec![Verb, Adverb]);
        assert_eq!(format!("{categories:?}"), "{Verb, Adverb}");
    }

    #[test]
    fn oracles_are_merged() {
        let words = resolver(
            [("light", set(&[Noun, Verb]))],
            [("light", set(&[Adjective]))],
            Exceptions::empty(),
            0,
        );
        assert_eq!(words.categories_of("light"), set(&[Noun, Verb, Adjective]));
        assert_eq!(words.categories_of("unknown"), CategorySet::EMPTY);
    }

    #[test]
    fn blacklist_suppresses_both_oracles() {
        let mut exceptions = Exceptions::empty();
        exceptions.blacklist(Adjective, "first");
        let words = resolver(
            [("first", set(&[Adjective, Adverb]))],
            [("first", set(&[Adjective]))],
            exceptions,
            0,
        );
        assert_eq!(words.categories_of("first"), set(&[Adverb]));
    }

    #[test]
    fn whitelist_wins_over_blacklist() {
        let mut exceptions = Exceptions::empty();
        exceptions.blacklist(Adjective, "ground");
        exceptions.whitelist(Adjective, "ground");
        let words = resolver([("ground", set(&[Noun, Adjective]))], [], exceptions, 0);
        assert_eq!(words.categories_of("ground"), set(&[Noun, Adjective]));
    }

    #[test]
    fn whitelist_applies_without_oracle_evidence() {
        let mut exceptions = Exceptions::empty();
        exceptions.whitelist(Noun, "myself");
        let words = resolver([], [], exceptions, 0);
        assert_eq!(words.categories_of("myself"), set(&[Noun]));
        assert_eq!(words.categories_of(" MySelf "), set(&[Noun]));
    }

    #[test]
    fn blank_words_skip_the_oracles() {
        let dictionary = FakeOracle::new([]);
        let tagger = FakeOracle::new([]);
        let (dict_queries, tagger_queries) = (dictionary.query_counter(), tagger.query_counter());
        let words = WordCategories::new(
            Box::new(dictionary),
            Box::new(tagger),
            Exceptions::empty(),
            16,
        );
        assert_eq!(words.categories_of(""), CategorySet::EMPTY);
        assert_eq!(words.categories_of("  \t"), CategorySet::EMPTY);
        assert_eq!(dict_queries.load(Ordering::Relaxed), 0);
        assert_eq!(tagger_queries.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn oracle_failure_means_no_evidence() {
        let words = WordCategories::new(
            Box::new(FakeOracle::broken()),
            Box::new(FakeOracle::new([("dog", set(&[Noun]))])),
            Exceptions::empty(),
            0,
        );
        assert_eq!(words.categories_of("dog"), set(&[Noun]));
    }

    #[test]
    fn cache_is_transparent() {
        let dictionary = [
            ("red", set(&[Noun, Adjective])),
            ("fast", set(&[Adjective, Adverb, Verb])),
            ("one", set(&[Noun, Adjective])),
        ];
        let tagger = [("red", set(&[Adjective])), ("runs", set(&[Verb]))];
        let cached = resolver(dictionary, tagger, Exceptions::builtin(), 2);
        let uncached = resolver(dictionary, tagger, Exceptions::builtin(), 0);
        for _ in 0..3 {
            for word in ["red", "fast", "one", "runs", "", "zzz", "red"] {
                assert_eq!(cached.categories_of(word), uncached.categories_of(word));
            }
        }
    }

    #[tokio::test]
    async fn load_resources() {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in [
            ("index.noun", "dog n 1 1 @ 1 0 02084071\n"),
            ("index.verb", ""),
            ("index.adj", "big a 1 1 & 1 0 01382086\n"),
            ("index.adv", ""),
        ] {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let config = LinguisticsConfig {
            wordnet: dir.path().to_owned(),
            tagger_lexicon: None,
            exceptions: None,
            word_cache: 16,
        };
        let words = WordCategories::load(&config).await.unwrap();
        assert!(words.categories_of("dog").contains(Noun));
        assert!(words.categories_of("big").contains(Adjective));
        assert!(words.categories_of("first").is_empty());
    }

    #[test]
    fn cache_avoids_repeated_queries() {
        let dictionary = FakeOracle::new([("dog", set(&[Noun]))]);
        let queries = dictionary.query_counter();
        let words = WordCategories::new(
            Box::new(dictionary),
            Box::new(FakeOracle::new([])),
            Exceptions::empty(),
            8,
        );
        assert_eq!(words.categories_of("dog"), set(&[Noun]));
        assert_eq!(words.categories_of("dog"), set(&[Noun]));
        assert_eq!(queries.load(Ordering::Relaxed), 1);
    }
}
