//! Ngram acceptance criteria

use crate::{
    constraints::Constraint,
    ngram::Ngram,
    pos::{WordCategories, WordCategory},
    Result,
};
use anyhow::Context;
use regex::Regex;
use std::{fmt, str::FromStr, sync::Arc};

/// Characters that every word of an accepted ngram must be made of
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum WordShape {
    /// Any sequence of characters
    Any,

    /// ASCII letters and dashes
    Words,

    /// Lowercase ASCII letters and dashes
    #[default]
    Lowercase,

    /// User-provided regular expression
    Custom(Box<str>),
}
//
impl WordShape {
    /// Regular expression that words must match (without anchors)
    pub fn pattern(&self) -> &str {
        match self {
            Self::Any => ".*",
            Self::Words => "[a-zA-Z-]+",
            Self::Lowercase => "[a-z-]+",
            Self::Custom(pattern) => &**pattern,
        }
    }

    /// Compiled regular expression that only matches entire words
    pub fn regex(&self) -> Result<Regex> {
        Regex::new(&format!("^(?:{})$", self.pattern()))
            .with_context(|| format!("compiling word shape {self}"))
    }
}
//
impl FromStr for WordShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let shape = match s.to_ascii_lowercase().as_str() {
            "all" => Self::Any,
            "allwords" => Self::Words,
            "lowercase" => Self::Lowercase,
            _ => Self::Custom(s.into()),
        };
        shape.regex()?;
        Ok(shape)
    }
}
//
impl fmt::Display for WordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("all"),
            Self::Words => f.write_str("allwords"),
            Self::Lowercase => f.write_str("lowercase"),
            Self::Custom(pattern) => write!(f, "/{pattern}/"),
        }
    }
}

/// Decides which ngrams are accepted into the output
///
/// Input files list all the years of an ngram in a row, so the decision for the
/// previously seen ngram is remembered and reused.
pub struct NgramFilter {
    /// Regex that every word must match
    shape: Regex,

    /// Required word categories and the means to find out word categories, if
    /// words are constrained to specific categories
    category_test: Option<(Box<[WordCategory]>, Arc<WordCategories>)>,

    /// Last ngram that was tested and the associated decision
    last_decision: Option<(Ngram, bool)>,
}
//
impl NgramFilter {
    /// Set up a filter
    ///
    /// Word categories must be provided if the constraint needs them.
    pub fn new(
        shape: &WordShape,
        constraint: &Constraint,
        categories: Option<Arc<WordCategories>>,
    ) -> Result<Self> {
        let category_test = match constraint {
            Constraint::All => None,
            Constraint::Sequence(sequence) => {
                let categories = categories.with_context(|| {
                    format!("word categories are needed to check constraint {constraint}")
                })?;
                Some((sequence.clone(), categories))
            }
        };
        Ok(Self {
            shape: shape.regex()?,
            category_test,
            last_decision: None,
        })
    }

    /// Truth that an ngram should be accepted
    pub fn accepts(&mut self, ngram: &Ngram) -> bool {
        if let Some((last_ngram, decision)) = &self.last_decision {
            if last_ngram == ngram {
                return *decision;
            }
        }
        let decision = self.decide(ngram);
        self.last_decision = Some((ngram.clone(), decision));
        decision
    }

    /// Evaluate the acceptance criteria, bypassing the memo
    fn decide(&self, ngram: &Ngram) -> bool {
        let words = ngram.words();
        if let Some(word) = words.iter().find(|word| !self.shape.is_match(word)) {
            log::trace!("Rejected ngram {ngram:?} because word {word:?} has the wrong shape");
            return false;
        }
        let Some((sequence, categories)) = &self.category_test else {
            return true;
        };
        if words.len() < sequence.len() {
            log::trace!("Rejected ngram {ngram:?} as too short for the category constraint");
            return false;
        }
        for (word, &category) in words.iter().zip(sequence.iter()) {
            if !categories.categories_of(word).contains(category) {
                log::trace!("Rejected ngram {ngram:?} because {word:?} is not a {category}");
                return false;
            }
        }
        true
    }
}
