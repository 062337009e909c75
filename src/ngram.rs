//! Ngrams and the records that carry them through the pipeline

use crate::{MatchCount, Result, Year};
use std::fmt;

/// Ordered sequence of words, used as the aggregation key
///
/// Ordering is lexicographic over the word sequence, which is the order in
/// which the Google Books Ngram data files are sorted.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ngram(Box<[Box<str>]>);
//
impl Ngram {
    /// Parse the space-separated textual form of an ngram
    ///
    /// Fails if the number of words does not match the expected ngram size.
    pub fn parse(text: &str, size: usize) -> Result<Self> {
        let words = text.split(' ').map(Box::from).collect::<Box<[_]>>();
        anyhow::ensure!(
            words.len() == size,
            "expected a {size}-gram, found {} words in {text:?}",
            words.len()
        );
        Ok(Self(words))
    }

    /// Words of this ngram
    pub fn words(&self) -> &[Box<str>] {
        &self.0
    }
}
//
impl<S: Into<Box<str>>> FromIterator<S> for Ngram {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
//
impl fmt::Display for Ngram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = self.0.iter();
        if let Some(first) = words.next() {
            f.write_str(first)?;
        }
        for word in words {
            write!(f, " {word}")?;
        }
        Ok(())
    }
}

/// Observation of an ngram over one year, as found in the data files
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FrequencyRecord {
    /// Ngram whose frequency is being studied
    pub ngram: Ngram,

    /// Year on which the data was recorded
    pub year: Year,

    /// Number of recorded occurences
    pub count: MatchCount,
}

/// Occurence count of an ngram summed over the accepted years
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AggregateRecord {
    /// Aggregated ngram
    pub ngram: Ngram,

    /// Total number of occurences
    pub count: MatchCount,
}
