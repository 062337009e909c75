//! Summation of the yearly occurence counts of accepted ngrams

use crate::{
    config::AggregationConfig,
    filter::NgramFilter,
    ngram::{AggregateRecord, FrequencyRecord, Ngram},
    MatchCount, Year,
};
use std::{collections::BTreeMap, fmt, ops::AddAssign, ops::RangeInclusive};

/// Accumulator for the records of a single data file
///
/// By default, records are expected to come sorted by ngram, as in the Google
/// Books Ngram data files, and each run of identical ngrams is summed and
/// emitted as soon as a different ngram shows up. In memory mode, counts are
/// instead summed in an ordered map and emitted at the end.
pub struct Aggregator {
    /// Publication years of interest
    years: RangeInclusive<Year>,

    /// Minimum total count of an emitted ngram
    min_count: MatchCount,

    /// Ngram acceptance criteria
    filter: NgramFilter,

    /// Ngram of the current run, if any, and its total count so far
    current_run: Option<(Ngram, MatchCount)>,

    /// Total count of every ngram seen so far, in memory mode
    totals: Option<BTreeMap<Ngram, MatchCount>>,

    /// What happened to the records so far
    stats: AggregationStats,
}
//
impl Aggregator {
    /// Set up the accumulator
    pub fn new(config: &AggregationConfig, filter: NgramFilter) -> Self {
        Self {
            years: config.years.clone(),
            min_count: config.min_count,
            filter,
            current_run: None,
            totals: config.in_memory.then(BTreeMap::new),
            stats: AggregationStats::default(),
        }
    }

    /// Integrate a new record, emitting the previous ngram if it is complete
    pub fn push(&mut self, record: FrequencyRecord) -> Option<AggregateRecord> {
        self.stats.records += 1;
        let FrequencyRecord { ngram, year, count } = record;

        // Records outside of the period of interest or with rejected ngrams do
        // not contribute anything and do not interrupt the current run
        if !self.years.contains(&year) {
            self.stats.out_of_years += 1;
            return None;
        }
        if !self.filter.accepts(&ngram) {
            self.stats.rejected += 1;
            return None;
        }

        // In memory mode, just update the total count
        if let Some(totals) = &mut self.totals {
            let total = totals.entry(ngram).or_default();
            *total = total.saturating_add(count);
            return None;
        }

        // If the record is associated with the current ngram, merge it into the
        // current ngram's total count
        if let Some((current, total)) = &mut self.current_run {
            if *current == ngram {
                *total = total.saturating_add(count);
                return None;
            }
        }

        // Otherwise, flush the current ngram and start a new run
        self.switch_run(Some((ngram, count)))
    }

    /// Emit the ngrams that are still pending at the end of the input
    pub fn finish(&mut self) -> Vec<AggregateRecord> {
        if let Some(totals) = &mut self.totals {
            let totals = std::mem::take(totals);
            log::debug!("Emitting {} ngrams aggregated in memory", totals.len());
            return totals
                .into_iter()
                .filter_map(|(ngram, total)| self.threshold(ngram, total))
                .collect();
        }
        self.switch_run(None).into_iter().collect()
    }

    /// What happened to the records so far
    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    /// Account for an input record that could not be decoded
    pub fn skip_malformed(&mut self) {
        self.stats.malformed += 1;
    }

    /// Finish the current run and switch to a different one (or none at all)
    ///
    /// This should be done when it is established that no other record for
    /// this ngram will come, either because we just moved to a different ngram
    /// or because we reached the end of the input.
    fn switch_run(&mut self, new_run: Option<(Ngram, MatchCount)>) -> Option<AggregateRecord> {
        let (former_ngram, former_total) = std::mem::replace(&mut self.current_run, new_run)?;
        if let Some((new_ngram, _)) = &self.current_run {
            if *new_ngram < former_ngram {
                self.stats.out_of_order += 1;
                if self.stats.out_of_order == 1 {
                    log::warn!(
                        "Input is not sorted ({new_ngram} comes after {former_ngram}), \
                        counts of repeated ngrams will not be merged"
                    );
                } else {
                    log::trace!("Ngram {new_ngram} comes after {former_ngram}");
                }
            }
        }
        self.threshold(former_ngram, former_total)
    }

    /// Emit an ngram if its total count is high enough
    fn threshold(&mut self, ngram: Ngram, total: MatchCount) -> Option<AggregateRecord> {
        if total >= self.min_count {
            log::trace!("Accepted ngram {ngram:?} with {total} occurences");
            self.stats.emitted += 1;
            Some(AggregateRecord {
                ngram,
                count: total,
            })
        } else {
            log::trace!("Rejected ngram {ngram:?} due to insufficient occurences ({total})");
            self.stats.below_threshold += 1;
            None
        }
    }
}

/// Lazily aggregate a sequence of records
pub fn aggregate<I: IntoIterator<Item = FrequencyRecord>>(
    records: I,
    aggregator: Aggregator,
) -> Aggregate<I::IntoIter> {
    Aggregate {
        records: records.into_iter(),
        aggregator,
        pending: None,
    }
}

/// Iterator over the aggregated records of a record sequence
pub struct Aggregate<I> {
    /// Records to be aggregated
    records: I,

    /// Underlying accumulator
    aggregator: Aggregator,

    /// Records emitted at the end of the input, once it has been reached
    pending: Option<std::vec::IntoIter<AggregateRecord>>,
}
//
impl<I> Aggregate<I> {
    /// Underlying accumulator
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}
//
impl<I: Iterator<Item = FrequencyRecord>> Iterator for Aggregate<I> {
    type Item = AggregateRecord;

    fn next(&mut self) -> Option<AggregateRecord> {
        loop {
            if let Some(pending) = &mut self.pending {
                return pending.next();
            }
            match self.records.next() {
                Some(record) => {
                    if let Some(output) = self.aggregator.push(record) {
                        return Some(output);
                    }
                }
                None => self.pending = Some(self.aggregator.finish().into_iter()),
            }
        }
    }
}

/// Account of what happened to the input records
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct AggregationStats {
    /// Records that were fed to the aggregator
    pub records: u64,

    /// Input lines that could not be decoded into records
    pub malformed: u64,

    /// Records from outside the period of interest
    pub out_of_years: u64,

    /// Records whose ngram was rejected by the filter
    pub rejected: u64,

    /// Aggregated ngrams that were emitted
    pub emitted: u64,

    /// Aggregated ngrams with too few occurences
    pub below_threshold: u64,

    /// Times where an ngram came after a greater ngram
    pub out_of_order: u64,
}
//
impl AddAssign for AggregationStats {
    fn add_assign(&mut self, rhs: Self) {
        self.records += rhs.records;
        self.malformed += rhs.malformed;
        self.out_of_years += rhs.out_of_years;
        self.rejected += rhs.rejected;
        self.emitted += rhs.emitted;
        self.below_threshold += rhs.below_threshold;
        self.out_of_order += rhs.out_of_order;
    }
}
//
impl fmt::Display for AggregationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records ({} malformed, {} out of years, {} rejected), \
            {} ngrams emitted, {} below threshold, {} order violations",
            self.records,
            self.malformed,
            self.out_of_years,
            self.rejected,
            self.emitted,
            self.below_threshold,
            self.out_of_order
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constraints::Constraint, filter::WordShape};

    fn config(years: RangeInclusive<Year>, min_count: MatchCount) -> AggregationConfig {
        AggregationConfig {
            years,
            min_count,
            in_memory: false,
        }
    }

    fn aggregator(config: &AggregationConfig, shape: WordShape) -> Aggregator {
        Aggregator::new(
            config,
            NgramFilter::new(&shape, &Constraint::All, None).unwrap(),
        )
    }

    fn ngram(text: &str) -> Ngram {
        Ngram::parse(text, 2).unwrap()
    }

    fn record(text: &str, year: Year, count: MatchCount) -> FrequencyRecord {
        FrequencyRecord {
            ngram: ngram(text),
            year,
            count,
        }
    }

    fn output(text: &str, count: MatchCount) -> AggregateRecord {
        AggregateRecord {
            ngram: ngram(text),
            count,
        }
    }

    fn sorted_input() -> Vec<FrequencyRecord> {
        vec![
            record("a a", 2000, 1),
            record("a a", 2001, 2),
            record("a a", 2002, 3),
            record("b b", 2000, 4),
            record("b b", 2001, 5),
            record("c c", 2000, 6),
        ]
    }

    #[test]
    fn runs_are_summed() {
        let config = config(0..=2008, 0);
        let outputs =
            aggregate(sorted_input(), aggregator(&config, WordShape::Lowercase)).collect::<Vec<_>>();
        assert_eq!(
            outputs,
            vec![output("a a", 6), output("b b", 9), output("c c", 6)]
        );
    }

    #[test]
    fn threshold_applies_to_totals() {
        let config = config(0..=2008, 7);
        let mut aggregate = aggregate(sorted_input(), aggregator(&config, WordShape::Lowercase));
        assert_eq!(aggregate.by_ref().collect::<Vec<_>>(), vec![output("b b", 9)]);
        let stats = aggregate.aggregator().stats();
        assert_eq!(stats.records, 6);
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.below_threshold, 2);
    }

    #[test]
    fn last_run_is_flushed_at_the_end() {
        let config = config(0..=2008, 0);
        let mut aggregator = aggregator(&config, WordShape::Lowercase);
        assert_eq!(aggregator.push(record("a a", 2000, 1)), None);
        assert_eq!(aggregator.push(record("a a", 2001, 1)), None);
        assert_eq!(aggregator.finish(), vec![output("a a", 2)]);
        assert!(aggregator.finish().is_empty());
    }

    #[test]
    fn year_filter_does_not_break_runs() {
        let config = config(2000..=2000, 0);
        let input = vec![
            record("a a", 1999, 5),
            record("a a", 2000, 3),
            record("a a", 2001, 7),
            record("a a", 2000, 1),
        ];
        let outputs =
            aggregate(input, aggregator(&config, WordShape::Lowercase)).collect::<Vec<_>>();
        assert_eq!(outputs, vec![output("a a", 4)]);
    }

    #[test]
    fn rejected_ngrams_do_not_contribute() {
        let config = config(0..=2008, 0);
        let input = vec![
            record("a a", 2000, 1),
            record("A a", 2000, 100),
            record("a a", 2001, 2),
            record("b_NOUN b", 2000, 100),
        ];
        let mut aggregate = aggregate(input, aggregator(&config, WordShape::Lowercase));
        assert_eq!(aggregate.by_ref().collect::<Vec<_>>(), vec![output("a a", 3)]);
        assert_eq!(aggregate.aggregator().stats().rejected, 2);
    }

    #[test]
    fn empty_input() {
        let config = config(0..=2008, 0);
        let outputs = aggregate(Vec::new(), aggregator(&config, WordShape::Lowercase));
        assert_eq!(outputs.count(), 0);
    }

    #[test]
    fn counts_saturate() {
        let config = config(0..=2008, 0);
        let input = vec![record("a a", 2000, MatchCount::MAX), record("a a", 2001, 1)];
        let outputs =
            aggregate(input, aggregator(&config, WordShape::Lowercase)).collect::<Vec<_>>();
        assert_eq!(outputs, vec![output("a a", MatchCount::MAX)]);
    }

    #[test]
    fn unsorted_input_is_detected() {
        let config = config(0..=2008, 0);
        let input = vec![
            record("b b", 2000, 1),
            record("a a", 2000, 2),
            record("b b", 2000, 3),
            record("a a", 2000, 4),
        ];
        let mut aggregate = aggregate(input, aggregator(&config, WordShape::Lowercase));
        assert_eq!(
            aggregate.by_ref().collect::<Vec<_>>(),
            vec![
                output("b b", 1),
                output("a a", 2),
                output("b b", 3),
                output("a a", 4)
            ]
        );
        assert_eq!(aggregate.aggregator().stats().out_of_order, 2);
    }

    #[test]
    fn in_memory_mode_handles_unsorted_input() {
        let config = AggregationConfig {
            in_memory: true,
            ..config(0..=2008, 4)
        };
        let input = vec![
            record("b b", 2000, 1),
            record("a a", 2000, 2),
            record("c c", 2000, 3),
            record("b b", 2000, 3),
            record("a a", 2000, 4),
        ];
        let mut aggregate = aggregate(input, aggregator(&config, WordShape::Lowercase));
        assert_eq!(
            aggregate.by_ref().collect::<Vec<_>>(),
            vec![output("a a", 6), output("b b", 4)]
        );
        let stats = aggregate.aggregator().stats();
        assert_eq!(stats.out_of_order, 0);
        assert_eq!(stats.below_threshold, 1);
    }

    #[test]
    fn stats_add_up() {
        let mut total = AggregationStats {
            records: 3,
            emitted: 1,
            ..Default::default()
        };
        total += AggregationStats {
            records: 2,
            malformed: 1,
            ..Default::default()
        };
        assert_eq!(total.records, 5);
        assert_eq!(total.malformed, 1);
        assert_eq!(total.emitted, 1);
    }
}
