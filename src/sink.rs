//! Storage of the aggregated ngrams

use crate::{config::Output, ngram::AggregateRecord, Result};
use anyhow::Context;
use csv_async::{AsyncWriter, AsyncWriterBuilder, QuoteStyle};
use rusqlite::{types::ToSql, Connection};
use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::io::AsyncWrite;

/// Destination of the aggregated ngrams
pub enum Sink {
    /// Tab-separated values
    Tsv(TsvSink),

    /// SQLite database
    Sqlite(SqliteSink),
}
//
impl Sink {
    /// Open the configured output
    pub async fn open(output: &Output, ngram_size: usize) -> Result<Self> {
        Ok(match output {
            Output::Stdout => Self::Tsv(TsvSink::new(Box::new(tokio::io::stdout()))),
            Output::TsvFile(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("creating output file {}", path.display()))?;
                Self::Tsv(TsvSink::new(Box::new(file)))
            }
            Output::Sqlite(path) => Self::Sqlite(SqliteSink::open(path, ngram_size)?),
        })
    }

    /// Store an aggregated ngram
    pub async fn persist(&mut self, record: &AggregateRecord) -> Result<()> {
        match self {
            Self::Tsv(tsv) => tsv.persist(record).await,
            Self::Sqlite(sqlite) => sqlite.persist(record).await,
        }
    }

    /// Flush pending writes
    ///
    /// Returns how many ngrams were accepted by `persist()` but could not be
    /// written down in the end. Failing to flush TSV output is an error, as
    /// there is no telling how much of it was lost.
    pub async fn close(self) -> Result<usize> {
        match self {
            Self::Tsv(tsv) => tsv.close().await.map(|()| 0),
            Self::Sqlite(sqlite) => Ok(sqlite.close().await),
        }
    }
}

/// Tab-separated output, one `w1 w2 ...<TAB>count` line per ngram
pub struct TsvSink {
    writer: AsyncWriter<Box<dyn AsyncWrite + Send + Unpin>>,
}
//
impl TsvSink {
    /// Write ngrams to some byte sink
    pub fn new(output: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            writer: AsyncWriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .quote_style(QuoteStyle::Never)
                .create_writer(output),
        }
    }

    /// Write down an aggregated ngram
    pub async fn persist(&mut self, record: &AggregateRecord) -> Result<()> {
        self.writer
            .write_record(&[record.ngram.to_string(), record.count.to_string()])
            .await
            .with_context(|| format!("writing down {}", record.ngram))
    }

    /// Flush buffered lines
    pub async fn close(mut self) -> Result<()> {
        self.writer.flush().await.context("flushing TSV output")
    }
}

/// Number of ngrams that are written to the database in one transaction
const SQLITE_BATCH_SIZE: usize = 10_000;

/// SQLite output, into a table named after the ngram size (e.g. `2grams`)
///
/// Ngrams that are already present in the table get their counts increased, so
/// a data set can be loaded in several runs.
pub struct SqliteSink {
    /// Database connection, used from blocking tasks
    conn: Arc<Mutex<Connection>>,

    /// Insert-or-add statement
    upsert: Arc<str>,

    /// Ngrams waiting to be written down
    batch: Vec<AggregateRecord>,

    /// Queued ngrams that could not be written down so far
    lost: usize,
}
//
impl SqliteSink {
    /// Open a database, creating the ngram table if needed
    pub fn open(path: &Path, ngram_size: usize) -> Result<Self> {
        let context = || format!("setting up SQLite database {}", path.display());
        let conn = Connection::open(path).with_context(context)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .with_context(context)?;
        conn.execute(&create_table_sql(ngram_size), [])
            .with_context(context)?;
        log::info!("Writing {ngram_size}-grams to SQLite database {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            upsert: upsert_sql(ngram_size).into(),
            batch: Vec::with_capacity(SQLITE_BATCH_SIZE),
            lost: 0,
        })
    }

    /// Queue an aggregated ngram for writing, writing the batch once full
    ///
    /// Only problems with this specific ngram are reported here. Ngrams that
    /// were queued successfully but could not be written down later are
    /// accounted for by [`close()`](Self::close).
    pub async fn persist(&mut self, record: &AggregateRecord) -> Result<()> {
        anyhow::ensure!(
            i64::try_from(record.count).is_ok(),
            "count of {} is too large for SQLite ({})",
            record.ngram,
            record.count
        );
        self.batch.push(record.clone());
        if self.batch.len() >= SQLITE_BATCH_SIZE {
            self.flush_batch().await;
        }
        Ok(())
    }

    /// Write down pending ngrams
    ///
    /// Returns how many queued ngrams could not be written down overall.
    pub async fn close(mut self) -> usize {
        self.flush_batch().await;
        self.lost
    }

    /// Write down the current batch without blocking the async runtime
    async fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(SQLITE_BATCH_SIZE));
        let num_records = batch.len();
        let conn = self.conn.clone();
        let upsert = self.upsert.clone();
        let lost = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            write_batch(&mut conn, &upsert, &batch)
        })
        .await
        .unwrap_or_else(|e| {
            log::error!("Lost a batch of {num_records} ngrams to a crashed SQLite writer: {e}");
            num_records
        });
        self.lost += lost;
    }
}

/// Write down a batch of ngrams, returning how many of them were lost
///
/// The batch is first written in a single transaction. If that fails, ngrams
/// are written one by one so that only the problematic ones are lost.
fn write_batch(conn: &mut Connection, upsert: &str, batch: &[AggregateRecord]) -> usize {
    let e = match write_transaction(conn, upsert, batch) {
        Ok(()) => {
            log::debug!("Wrote {} ngrams to SQLite", batch.len());
            return 0;
        }
        Err(e) => e,
    };
    log::warn!(
        "Failed to write a batch of {} ngrams to SQLite, retrying one by one: {e:#}",
        batch.len()
    );
    batch
        .iter()
        .filter(|record| match upsert_record(conn, upsert, record) {
            Ok(()) => false,
            Err(e) => {
                log::error!("Failed to store {} with count {}: {e:#}", record.ngram, record.count);
                true
            }
        })
        .count()
}

/// Write down a batch of ngrams in a single transaction
fn write_transaction(conn: &mut Connection, upsert: &str, batch: &[AggregateRecord]) -> Result<()> {
    let tx = conn.transaction().context("starting SQLite transaction")?;
    for record in batch {
        upsert_record(&tx, upsert, record)?;
    }
    tx.commit().context("committing SQLite transaction")
}

/// Add an aggregated ngram to the database
fn upsert_record(conn: &Connection, upsert: &str, record: &AggregateRecord) -> Result<()> {
    let count = i64::try_from(record.count)
        .with_context(|| format!("count of {} is too large for SQLite", record.ngram))?;
    let mut statement = conn
        .prepare_cached(upsert)
        .context("preparing SQLite upsert")?;
    let mut params = record
        .ngram
        .words()
        .iter()
        .map(|word| word as &dyn ToSql)
        .collect::<Vec<_>>();
    params.push(&count);
    statement
        .execute(params.as_slice())
        .with_context(|| format!("writing down {}", record.ngram))?;
    Ok(())
}

/// Name of the table holding ngrams of a certain size
fn table_name(ngram_size: usize) -> String {
    format!("\"{ngram_size}grams\"")
}

/// Comma-separated word column names
fn word_columns(ngram_size: usize) -> String {
    (1..=ngram_size)
        .map(|idx| format!("word{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_table_sql(ngram_size: usize) -> String {
    let word_definitions = (1..=ngram_size)
        .map(|idx| format!("word{idx} TEXT NOT NULL, "))
        .collect::<String>();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({word_definitions}count INTEGER NOT NULL, PRIMARY KEY ({}))",
        table_name(ngram_size),
        word_columns(ngram_size)
    )
}

fn upsert_sql(ngram_size: usize) -> String {
    let placeholders = (1..=ngram_size + 1)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({words}, count) VALUES ({placeholders}) \
        ON CONFLICT ({words}) DO UPDATE SET count = count + excluded.count",
        table = table_name(ngram_size),
        words = word_columns(ngram_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ngram::Ngram, MatchCount};

    fn record(text: &str, count: MatchCount) -> AggregateRecord {
        AggregateRecord {
            ngram: Ngram::parse(text, 2).unwrap(),
            count,
        }
    }

    fn stored(path: &Path) -> Vec<(String, String, i64)> {
        let conn = Connection::open(path).unwrap();
        let mut statement = conn
            .prepare("SELECT word1, word2, count FROM \"2grams\" ORDER BY word1, word2")
            .unwrap();
        let rows = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        rows
    }

    #[test]
    fn sql_statements() {
        assert_eq!(
            create_table_sql(2),
            "CREATE TABLE IF NOT EXISTS \"2grams\" (word1 TEXT NOT NULL, word2 TEXT NOT NULL, \
            count INTEGER NOT NULL, PRIMARY KEY (word1, word2))"
        );
        assert_eq!(
            upsert_sql(2),
            "INSERT INTO \"2grams\" (word1, word2, count) VALUES (?1, ?2, ?3) \
            ON CONFLICT (word1, word2) DO UPDATE SET count = count + excluded.count"
        );
    }

    #[tokio::test]
    async fn tsv_output() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let output = Output::TsvFile(file.path().to_owned());
        let mut sink = Sink::open(&output, 2).await.unwrap();
        sink.persist(&record("big dog", 7)).await.unwrap();
        sink.persist(&record("red \"cat\"", 12)).await.unwrap();
        assert_eq!(sink.close().await.unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "big dog\t7\nred \"cat\"\t12\n"
        );
    }

    #[tokio::test]
    async fn sqlite_output_adds_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ngrams.sqlite");
        let output = Output::Sqlite(path.clone());
        for _ in 0..2 {
            let mut sink = Sink::open(&output, 2).await.unwrap();
            sink.persist(&record("big dog", 7)).await.unwrap();
            sink.persist(&record("red cat", 12)).await.unwrap();
            assert_eq!(sink.close().await.unwrap(), 0);
        }
        assert_eq!(
            stored(&path),
            vec![
                ("big".to_owned(), "dog".to_owned(), 14),
                ("red".to_owned(), "cat".to_owned(), 24),
            ]
        );
    }

    #[tokio::test]
    async fn oversized_counts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SqliteSink::open(&dir.path().join("ngrams.sqlite"), 2).unwrap();
        assert!(sink.persist(&record("big dog", MatchCount::MAX)).await.is_err());
        sink.persist(&record("red cat", 12)).await.unwrap();
        assert_eq!(sink.close().await, 0);
    }

    #[tokio::test]
    async fn every_lost_ngram_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SqliteSink::open(&dir.path().join("ngrams.sqlite"), 2).unwrap();
        sink.conn
            .lock()
            .unwrap()
            .execute("DROP TABLE \"2grams\"", [])
            .unwrap();

        // A full batch is written by persist(), the remainder by close()
        for idx in 0..SQLITE_BATCH_SIZE + 3 {
            sink.persist(&record(&format!("word{idx} dog"), 100))
                .await
                .unwrap();
        }
        assert_eq!(sink.lost, SQLITE_BATCH_SIZE);
        assert_eq!(sink.close().await, SQLITE_BATCH_SIZE + 3);
    }

    #[tokio::test]
    async fn failed_batches_are_retried_one_by_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ngrams.sqlite");
        let mut sink = SqliteSink::open(&path, 2).unwrap();
        sink.conn
            .lock()
            .unwrap()
            .execute(
                "CREATE TRIGGER no_cats BEFORE INSERT ON \"2grams\" WHEN NEW.word2 = 'cat' \
                BEGIN SELECT RAISE(ABORT, 'no cats allowed'); END",
                [],
            )
            .unwrap();
        sink.persist(&record("big dog", 7)).await.unwrap();
        sink.persist(&record("red cat", 12)).await.unwrap();
        sink.persist(&record("red dog", 3)).await.unwrap();
        assert_eq!(sink.close().await, 1);
        assert_eq!(
            stored(&path),
            vec![
                ("big".to_owned(), "dog".to_owned(), 7),
                ("red".to_owned(), "dog".to_owned(), 3),
            ]
        );
    }
}
