//! This program loads ngram frequency tables in the Google Books Ngram layout,
//! whose general documentation you can find at
//! <http://storage.googleapis.com/books/ngrams/books/datasetsv3.html>, and
//! keeps the total occurence counts of the ngrams that satisfy some word shape
//! and word category constraints.

mod aggregate;
mod cache;
mod config;
mod constraints;
mod filter;
mod ngram;
mod pos;
mod progress;
mod sink;
mod tsv;

use crate::{
    aggregate::AggregationStats,
    config::Config,
    constraints::Constraint,
    filter::WordShape,
    ngram::AggregateRecord,
    pos::WordCategories,
    progress::{ProgressConfig, ProgressReport, Work},
    sink::Sink,
};
use anyhow::Context;
use clap::Parser;
use futures::stream::{self, StreamExt};
use log::LevelFilter;
use std::{
    io::IsTerminal,
    num::NonZeroUsize,
    path::PathBuf,
    sync::Arc,
};
use tokio::sync::mpsc;

/// Sum the yearly occurence counts of ngrams from Google Books Ngram data files
///
/// Only ngrams whose words all have the requested shape and satisfy the
/// requested word category constraint are kept, and only occurences from the
/// requested range of publication years are taken into account.
///
/// Data files are expected to be sorted by ngram, as the original Google Books
/// data files are. Use --in-memory for other files.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Data files to be processed, as local paths or http(s) URLs
    ///
    /// Files whose name ends with .gz are decompressed on the fly. If a file
    /// name contains {}, it is replaced with every file index from --begin
    /// (included) to --end (excluded), which matches how the Google Books
    /// dataset is split into numbered files.
    #[arg(required = true)]
    inputs: Vec<Box<str>>,

    /// Number of words per ngram
    #[arg(short = 'n', long, default_value = "2")]
    ngram_size: NonZeroUsize,

    /// Minimum accepted book publication year
    #[arg(short = 'y', long, default_value = "0")]
    min_year: Year,

    /// Maximum accepted book publication year
    #[arg(short = 'Y', long, default_value = "2008")]
    max_year: Year,

    /// Minimum accepted number of occurences across all accepted years
    ///
    /// Extremely rare ngrams are often OCR errors or otherwise odd constructs,
    /// so we ignore ngrams which occur too rarely in the selected time period.
    #[arg(short = 'm', long, default_value = "100")]
    min_count: MatchCount,

    /// Shape that every word of an accepted ngram must have
    ///
    /// Either "all" (anything goes), "allwords" (ASCII letters and dashes),
    /// "lowercase" (lowercase ASCII letters and dashes), or a custom regular
    /// expression that must match entire words.
    #[arg(short = 'w', long, default_value = "lowercase")]
    shape: WordShape,

    /// Word categories that the words of accepted ngrams must have
    ///
    /// Either "all" (no constraint), "adjectivenoun", or a dash-separated
    /// sequence of categories among noun, verb, adjective and adverb, e.g.
    /// "adverb-adjective". The i-th word must have the i-th category.
    ///
    /// Will interactively prompt for a constraint if not specified and running
    /// in a terminal, otherwise all ngrams are accepted.
    #[arg(short = 'c', long, default_value = None)]
    constraint: Option<Constraint>,

    /// Sum occurences in memory instead of relying on data file ordering
    ///
    /// This enables processing unsorted data files, at the cost of keeping
    /// every distinct ngram of a data file in memory.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// WordNet dictionary directory, containing the index.* files
    #[arg(long, default_value = "dict")]
    wordnet: PathBuf,

    /// Tagger lexicon, with lines of the form "word TAG [TAG...]" where the
    /// most likely Penn Treebank tag comes first
    ///
    /// Without a lexicon, the tagger only looks at word suffixes.
    #[arg(long)]
    tagger_lexicon: Option<PathBuf>,

    /// Additional word category exceptions
    ///
    /// Tab-separated file with lines of the form "blacklist|whitelist
    /// <category> <word>". Blacklisted words never get the associated category
    /// from the dictionary or tagger, whitelisted words always get it.
    #[arg(long)]
    exceptions: Option<PathBuf>,

    /// Number of words whose categories are cached (0 disables the cache)
    #[arg(long, default_value = "4096")]
    word_cache: usize,

    /// Write aggregated ngrams to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write aggregated ngrams to this SQLite database instead of stdout
    ///
    /// Ngrams go to a table named after the ngram size, e.g. "2grams". If an
    /// ngram is already present, its count is increased.
    #[arg(short, long, conflicts_with = "output")]
    database: Option<PathBuf>,

    /// Number of data files processed concurrently
    #[arg(short, long, default_value = "4")]
    jobs: NonZeroUsize,

    /// First file index substituted into data file names
    #[arg(long, default_value = "0")]
    begin: usize,

    /// File index after the last one substituted into data file names
    #[arg(long, default_value = "100")]
    end: usize,
}
//
impl Args {
    /// Decode and validate CLI arguments
    pub fn parse_and_check() -> Result<Self> {
        // Decode CLI arguments
        let args = Args::parse();

        // Check CLI arguments for basic sanity
        anyhow::ensure!(
            args.min_year <= args.max_year,
            "requested publication year range {}..={} is empty",
            args.min_year,
            args.max_year
        );
        anyhow::ensure!(
            args.begin <= args.end,
            "requested file index range {}..{} is reversed",
            args.begin,
            args.end
        );
        Ok(args)
    }
}
//
#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse_and_check()?;

    // Pick a category constraint
    let constraint = constraints::pick(args.constraint.clone())?;
    let config = Config::new(args, constraint);
    log::info!(
        "Processing {} data files with word shape {} and constraint {}",
        config.inputs.len(),
        config.shape,
        config.constraint
    );

    // Load linguistic resources if needed
    let categories = if config.constraint.needs_categories() {
        Some(Arc::new(WordCategories::load(&config.linguistics).await?))
    } else {
        None
    };

    // Set up progress reporting
    let report = if std::io::stderr().is_terminal() {
        ProgressReport::new()
    } else {
        ProgressReport::hidden()
    };

    // Process the data files
    let (stats, sink_failures) = process_all(config.clone(), categories, &report).await?;

    // Display the run summary
    log::info!("Processed all data files: {stats}, {sink_failures} storage failures");
    eprintln!("Processed {} data files: {stats}", config.inputs.len());
    if sink_failures > 0 {
        eprintln!("{sink_failures} aggregated ngrams could not be stored, see logs for details");
    }
    if stats.out_of_order > 0 && !config.aggregation.in_memory {
        eprintln!("Some data files were not sorted by ngram, consider using --in-memory");
    }
    Ok(())
}

/// Process every data file, funneling the aggregated ngrams into the sink
///
/// Returns the accumulated statistics and the number of ngrams that could not
/// be stored.
async fn process_all(
    config: Arc<Config>,
    categories: Option<Arc<WordCategories>>,
    report: &ProgressReport,
) -> Result<(AggregationStats, usize)> {
    // Start storing aggregated ngrams as they come
    let mut sink = Sink::open(&config.output, config.ngram_size).await?;
    let (outputs, mut inputs) = mpsc::channel::<AggregateRecord>(OUTPUT_CHANNEL_CAPACITY);
    let sink_task = tokio::spawn(async move {
        let mut failures = 0;
        while let Some(record) = inputs.recv().await {
            if let Err(e) = sink.persist(&record).await {
                log::error!("Failed to store {} with count {}: {e:#}", record.ngram, record.count);
                failures += 1;
            }
        }
        failures += sink.close().await?;
        Ok::<_, anyhow::Error>(failures)
    });

    // Track data file processing
    let files = report.add(
        "Opening data files",
        ProgressConfig::new(Work::Steps(config.inputs.len())).dont_show_rate(),
    );
    let bytes = report.add(
        "Reading data files",
        ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
    );

    // Process data files concurrently
    let client = reqwest::Client::new();
    let mut file_results = stream::iter(config.inputs.iter().cloned())
        .map(|location| {
            tokio::spawn(tsv::process_file(
                config.clone(),
                categories.clone(),
                client.clone(),
                location,
                outputs.clone(),
                files.clone(),
                bytes.clone(),
            ))
        })
        .buffer_unordered(config.jobs.get());

    // Merge statistics from data files as they are done
    let mut stats = AggregationStats::default();
    while let Some(file_stats) = file_results.next().await {
        stats += file_stats.context("collecting results from one data file")??;
    }
    drop(file_results);
    log::debug!("Read {} bytes of data", bytes.position());

    // Wait for the sink to be done
    drop(outputs);
    let sink_failures = sink_task.await.context("waiting for the sink")??;
    Ok((stats, sink_failures))
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Number of occurences of an ngram
///
/// Counts of common ngrams summed over many years can get well beyond the
/// range of 32-bit integers.
pub type MatchCount = u64;

/// Number of aggregated ngrams that can be waiting for the sink
const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
