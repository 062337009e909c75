//! Processing pipeline configuration

use crate::{
    constraints::Constraint, filter::WordShape, tsv::Location, Args, MatchCount, Year,
};
use std::{num::NonZeroUsize, ops::RangeInclusive, path::PathBuf, sync::Arc};

/// Final process configuration
///
/// This is the result of combining digested [`Args`] with the category
/// constraint, which may have been picked interactively. Please refer to
/// [`Args`] to know more about common fields.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Data files to be processed, with index placeholders expanded
    pub inputs: Box<[Location]>,

    /// Number of words per ngram
    pub ngram_size: usize,

    /// Word shape that every word of an accepted ngram must have
    pub shape: WordShape,

    /// Category constraint that accepted ngrams must satisfy
    pub constraint: Constraint,

    /// Subset of the configuration that affects how ngrams are aggregated
    pub aggregation: AggregationConfig,

    /// Linguistic resources used to check category constraints
    pub linguistics: LinguisticsConfig,

    /// Destination of the aggregated ngrams
    pub output: Output,

    // Other fields have the same meaning as in Args
    pub jobs: NonZeroUsize,
}
//
impl Config {
    /// Determine process configuration from initialization products
    pub(crate) fn new(args: Args, constraint: Constraint) -> Arc<Self> {
        let Args {
            inputs,
            ngram_size,
            min_year,
            max_year,
            min_count,
            shape,
            constraint: _,
            in_memory,
            wordnet,
            tagger_lexicon,
            exceptions,
            word_cache,
            output,
            database,
            jobs,
            begin,
            end,
        } = args;
        let output = match (database, output) {
            (Some(database), _) => Output::Sqlite(database),
            (None, Some(path)) => Output::TsvFile(path),
            (None, None) => Output::Stdout,
        };
        Arc::new(Self {
            inputs: expand_inputs(&inputs, begin..end),
            ngram_size: ngram_size.get(),
            shape,
            constraint,
            aggregation: AggregationConfig {
                years: min_year..=max_year,
                min_count,
                in_memory,
            },
            linguistics: LinguisticsConfig {
                wordnet,
                tagger_lexicon,
                exceptions,
                word_cache,
            },
            output,
            jobs,
        })
    }
}

/// Subset of the configuration that affects how ngrams are aggregated
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AggregationConfig {
    /// Publication years whose records are taken into account
    pub years: RangeInclusive<Year>,

    /// Minimum total count of an emitted ngram
    pub min_count: MatchCount,

    /// Aggregate in a map instead of relying on input ordering
    pub in_memory: bool,
}

/// Locations of the linguistic resources
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LinguisticsConfig {
    /// WordNet `dict` directory
    pub wordnet: PathBuf,

    /// Tagger lexicon, if any
    pub tagger_lexicon: Option<PathBuf>,

    /// Additional word category exceptions, if any
    pub exceptions: Option<PathBuf>,

    // Same meaning as in Args
    pub word_cache: usize,
}

/// Destination of the aggregated ngrams
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Output {
    /// Tab-separated values on standard output
    Stdout,

    /// Tab-separated values in a file
    TsvFile(PathBuf),

    /// Table in an SQLite database
    Sqlite(PathBuf),
}

/// Expand the `{}` file index placeholder of input names
fn expand_inputs(inputs: &[Box<str>], indices: std::ops::Range<usize>) -> Box<[Location]> {
    inputs
        .iter()
        .flat_map(|input| {
            let names: Vec<String> = if input.contains("{}") {
                indices
                    .clone()
                    .map(|idx| input.replace("{}", &idx.to_string()))
                    .collect()
            } else {
                vec![input.to_string()]
            };
            names.into_iter().map(|name| Location::new(&name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_index_placeholders() {
        let inputs = expand_inputs(
            &["local.tsv".into(), "https://host/2gram-{}.csv.gz".into()],
            3..5,
        );
        assert_eq!(
            &*inputs,
            &[
                Location::new("local.tsv"),
                Location::new("https://host/2gram-3.csv.gz"),
                Location::new("https://host/2gram-4.csv.gz"),
            ]
        );
    }

    #[test]
    fn empty_index_range_drops_templates() {
        let inputs = expand_inputs(&["data-{}.tsv".into()], 2..2);
        assert!(inputs.is_empty());
    }
}
