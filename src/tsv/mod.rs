//! Processing of (optionally gzipped) TSV data files in the Google Books Ngram
//! layout: `ngram<TAB>year<TAB>match_count[<TAB>...]`

use crate::{
    aggregate::{AggregationStats, Aggregator},
    config::Config,
    filter::NgramFilter,
    ngram::{AggregateRecord, FrequencyRecord, Ngram},
    pos::WordCategories,
    progress::ProgressTracker,
    MatchCount, Result, Year,
};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::{stream::StreamExt, Stream};
use reqwest::Response;
use std::{
    fmt,
    io::{self, ErrorKind},
    path::PathBuf,
    sync::Arc,
};
use tokio::{
    io::{AsyncBufRead, AsyncRead},
    sync::mpsc,
};
use tokio_util::io::{ReaderStream, StreamReader};

/// Where a data file comes from
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Location {
    /// Local file
    Path(PathBuf),

    /// Remote file, to be downloaded over HTTP(S)
    Url(Box<str>),
}
//
impl Location {
    /// Interpret a command-line file name
    pub fn new(name: &str) -> Self {
        if name.starts_with("http://") || name.starts_with("https://") {
            Self::Url(name.into())
        } else {
            Self::Path(name.into())
        }
    }

    /// Truth that the data file must be decompressed
    pub fn is_gzipped(&self) -> bool {
        match self {
            Self::Path(path) => path.extension().is_some_and(|ext| ext == "gz"),
            Self::Url(url) => url.ends_with(".gz"),
        }
    }
}
//
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Open a data file, decompressing it if needed
///
/// Raw bytes that are read from the file are reported to `bytes`.
pub async fn open(
    location: &Location,
    client: &reqwest::Client,
    bytes: &ProgressTracker,
) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
    let context = || format!("opening {location}");
    let raw: Box<dyn AsyncBufRead + Send + Unpin> = match location {
        Location::Path(path) => {
            let file = tokio::fs::File::open(path).await.with_context(context)?;
            let len = file.metadata().await.with_context(context)?.len();
            bytes.add_work(len);
            Box::new(StreamReader::new(Box::pin(track_progress(
                ReaderStream::new(file),
                bytes.clone(),
            ))))
        }
        Location::Url(url) => {
            let response = client
                .get(&**url)
                .send()
                .await
                .and_then(Response::error_for_status)
                .with_context(context)?;
            let content_length = response.content_length();
            // Translate reqwest errors into I/O errors
            let stream = response
                .bytes_stream()
                .map(|res| res.map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e))));
            if let Some(len) = content_length {
                bytes.add_work(len);
                Box::new(StreamReader::new(Box::pin(track_progress(
                    stream,
                    bytes.clone(),
                ))))
            } else {
                log::debug!("Size of {location} is unknown, its download won't be tracked");
                Box::new(StreamReader::new(Box::pin(stream)))
            }
        }
    };
    if location.is_gzipped() {
        // Large data files are often made of several concatenated gzip members
        let mut decoder = GzipDecoder::new(raw);
        decoder.multiple_members(true);
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(raw))
    }
}

/// Report the size of every block of bytes coming out of a byte stream
fn track_progress<B: AsRef<[u8]>>(
    stream: impl Stream<Item = io::Result<B>>,
    bytes: ProgressTracker,
) -> impl Stream<Item = io::Result<B>> {
    stream.map(move |res| {
        res.inspect(|block| {
            bytes.make_progress(block.as_ref().len() as u64);
        })
    })
}

/// Decode a line of a data file
pub fn parse_record(record: &StringRecord, ngram_size: usize) -> Result<FrequencyRecord> {
    anyhow::ensure!(
        record.len() >= 3,
        "expected at least 3 columns, found {}",
        record.len()
    );
    let ngram = Ngram::parse(&record[0], ngram_size)?;
    let year = record[1]
        .parse::<Year>()
        .with_context(|| format!("parsing year {:?}", &record[1]))?;
    let count = record[2]
        .parse::<MatchCount>()
        .with_context(|| format!("parsing match count {:?}", &record[2]))?;
    Ok(FrequencyRecord { ngram, year, count })
}

/// Aggregate the records of a data file, sending aggregated ngrams to `outputs`
///
/// `files` tracks how many data files have been opened, and `bytes` how much
/// raw data has been read.
pub async fn process_file(
    config: Arc<Config>,
    categories: Option<Arc<WordCategories>>,
    client: reqwest::Client,
    location: Location,
    outputs: mpsc::Sender<AggregateRecord>,
    files: ProgressTracker,
    bytes: ProgressTracker,
) -> Result<AggregationStats> {
    // Open the data file
    let reader = open(&location, &client, &bytes).await?;
    if files.make_progress(1) {
        bytes.done_adding_work();
    }
    log::info!("Started processing {location}");

    // Apply TSV decoder to uncompressed bytes
    let mut records = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .create_reader(reader)
        .into_records();

    // Aggregate accepted records
    let filter = NgramFilter::new(&config.shape, &config.constraint, categories)?;
    let mut aggregator = Aggregator::new(&config.aggregation, filter);
    let context = || format!("reading and processing {location}");
    let send_context = || format!("sending aggregated ngrams from {location}");
    while let Some(record) = records.next().await {
        let record = match record {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv_async::ErrorKind::Io(_)) => {
                return Err(e).with_context(context);
            }
            Err(e) => {
                log::warn!("Skipped undecodable line from {location}: {e}");
                aggregator.skip_malformed();
                continue;
            }
        };
        let record = match parse_record(&record, config.ngram_size) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipped malformed line from {location}: {e:#}");
                aggregator.skip_malformed();
                continue;
            }
        };
        if let Some(output) = aggregator.push(record) {
            outputs.send(output).await.with_context(send_context)?;
        }
    }
    for output in aggregator.finish() {
        outputs.send(output).await.with_context(send_context)?;
    }

    let stats = *aggregator.stats();
    log::info!("Done processing {location}: {stats}");
    Ok(stats)
}
