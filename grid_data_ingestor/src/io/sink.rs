use std::path::{Path, PathBuf};

use async_trait::async_trait;
use grid_schema::{Table, Window};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::debug;

use crate::models::{operator::Operator, request::Dataset};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The CSV writer failed while encoding a record.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// A generic I/O error.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The blocking writer task did not finish.
    #[snafu(display("Writer task failed: {source}"))]
    Join {
        source: tokio::task::JoinError,
        backtrace: Backtrace,
    },
}

/// What a chunk of fetched data belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ChunkInfo<'a> {
    pub operator: Operator,
    pub dataset: Dataset,
    /// `None` for latest snapshots.
    pub window: Option<&'a Window>,
}

impl ChunkInfo<'_> {
    /// `{OPERATOR}_{method}_{YYYYMMDD}[_{YYYYMMDD}]`, the end date only when
    /// the chunk is not exactly one local day.
    pub fn file_stem(&self) -> String {
        let prefix = format!("{}_{}", self.operator.name(), self.dataset.method());
        let Some(w) = self.window else {
            return format!("{prefix}_latest");
        };
        let start = w.start.format("%Y%m%d");
        let one_day = Window::day(w.start.date_naive(), w.start.timezone())
            .is_ok_and(|day| day == *w);
        if one_day {
            format!("{prefix}_{start}")
        } else {
            format!("{prefix}_{start}_{}", w.end.format("%Y%m%d"))
        }
    }
}

#[async_trait]
pub trait DataSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the path it wrote; a database sink might return
    /// the number of rows inserted.
    type Output;

    /// Writes one fetched chunk to the destination.
    async fn write(&self, info: ChunkInfo<'_>, table: &Table) -> Result<Self::Output, SinkError>;
}

/// Writes every chunk to its own CSV file under a directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Encode `table` as CSV; timestamps keep their offset, nulls are empty.
pub fn write_csv(path: &Path, table: &Table) -> Result<(), SinkError> {
    let mut writer = csv::Writer::from_path(path).context(CsvSnafu { path })?;
    writer.write_record(table.columns()).context(CsvSnafu { path })?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(ToString::to_string))
            .context(CsvSnafu { path })?;
    }
    writer.flush().context(IoSnafu { path })?;
    Ok(())
}

#[async_trait]
impl DataSink for CsvSink {
    type Output = PathBuf;

    async fn write(&self, info: ChunkInfo<'_>, table: &Table) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(IoSnafu { path: &self.dir })?;
        let path = self.dir.join(format!("{}.csv", info.file_stem()));
        let table_len = table.len();
        let table = table.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_csv(&target, &table))
            .await
            .context(JoinSnafu)??;
        debug!(path = %path.display(), rows = table_len, "wrote chunk");
        Ok(path)
    }
}
