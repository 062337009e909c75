//! Linguistic constraints that accepted ngrams must satisfy

use crate::{pos::WordCategory, Result};
use anyhow::Context;
use dialoguer::FuzzySelect;
use std::{fmt, io::IsTerminal, str::FromStr};

/// Category constraint on the words of an ngram
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Constraint {
    /// Accept every ngram
    #[default]
    All,

    /// The i-th word must belong to the i-th category
    Sequence(Box<[WordCategory]>),
}
//
impl Constraint {
    /// Truth that checking this constraint requires word categories
    pub fn needs_categories(&self) -> bool {
        !matches!(self, Self::All)
    }
}
//
impl FromStr for Constraint {
    type Err = anyhow::Error;

    /// Parse `all`, `adjectivenoun`, or a dash-separated sequence of
    /// categories like `adverb-adjective-noun`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "adjectivenoun" => Ok(Self::Sequence(
                [WordCategory::Adjective, WordCategory::Noun].into(),
            )),
            other => {
                let sequence = other
                    .split(['-', '+'])
                    .map(str::parse::<WordCategory>)
                    .collect::<Result<Box<[WordCategory]>>>()
                    .with_context(|| format!("parsing category constraint {s:?}"))?;
                Ok(Self::Sequence(sequence))
            }
        }
    }
}
//
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Sequence(sequence) => {
                for (idx, category) in sequence.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("-")?;
                    }
                    write!(f, "{category}")?;
                }
                Ok(())
            }
        }
    }
}

/// Use the constraint requested on the command line, or ask for one
///
/// The user is only prompted when running interactively, otherwise every
/// ngram is accepted.
pub fn pick(requested: Option<Constraint>) -> Result<Constraint> {
    if let Some(constraint) = requested {
        return Ok(constraint);
    }
    if !std::io::stdin().is_terminal() {
        log::info!("No category constraint requested, accepting all ngrams");
        return Ok(Constraint::All);
    }
    prompt()
}

/// Ask the user to select a category constraint
pub fn prompt() -> Result<Constraint> {
    let descriptions = PRESETS
        .iter()
        .map(|(description, name)| format!("{description} ({name})"))
        .collect::<Vec<_>>();
    let preset_idx = FuzzySelect::new()
        .with_prompt("Which ngrams should be kept?")
        .items(&descriptions)
        .default(0)
        .interact()
        .context("prompting for a category constraint")?;
    PRESETS[preset_idx].1.parse()
}

/// Commonly used constraints, keyed by human-readable description
const PRESETS: &[(&str, &str)] = &[
    ("Any ngram", "all"),
    ("Adjective followed by a noun", "adjectivenoun"),
    ("Noun followed by a noun", "noun-noun"),
    ("Adverb followed by an adjective", "adverb-adjective"),
    ("Adverb followed by a verb", "adverb-verb"),
    ("Verb followed by a noun", "verb-noun"),
];
