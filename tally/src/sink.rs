use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::{DataFrame, ParquetReader, ParquetWriter, SerReader};

use tally_core::TallyError;
use tally_core::table::table_error;

/// Logical dataset a table belongs to; names its output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Web-analytics metrics (and raw archive).
    Google,
    /// Ads summary, detail and raw archive.
    Twitter,
    /// Chat channel listing.
    SlackChannels,
    /// Chat messages.
    SlackMessages,
}

impl Dataset {
    /// Directory name under the partition date.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Twitter => "twitter",
            Self::SlackChannels => "slack-channels",
            Self::SlackMessages => "slack-messages",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> TallyError {
    TallyError::Io(format!("{}: {e}", path.display()))
}

/// Writes tables as `{root}/{YYYY-MM-DD}/{dataset}/{index}.parquet`.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    /// Sink rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one dataset of one partition date.
    #[must_use]
    pub fn dataset_dir(&self, date: NaiveDate, dataset: Dataset) -> PathBuf {
        self.root
            .join(date.format("%Y-%m-%d").to_string())
            .join(dataset.dir_name())
    }

    /// Write `frames` in order as `0.parquet`, `1.parquet`, ...
    ///
    /// Frames without columns are skipped and do not consume an index.
    ///
    /// # Errors
    /// Returns `TallyError::Io` if a directory or file cannot be created, or
    /// `TallyError::Table` if encoding fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "tally::sink::write", skip(self, frames), fields(%date, %dataset))
    )]
    pub fn write(
        &self,
        date: NaiveDate,
        dataset: Dataset,
        frames: &mut [DataFrame],
    ) -> Result<Vec<PathBuf>, TallyError> {
        let dir = self.dataset_dir(date, dataset);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;
        let mut written = Vec::new();
        for frame in frames.iter_mut().filter(|f| f.width() > 0) {
            let path = dir.join(format!("{}.parquet", written.len()));
            let file = File::create(&path).map_err(|e| io_error(&path, &e))?;
            ParquetWriter::new(file)
                .finish(frame)
                .map_err(|e| table_error(&e))?;
            #[cfg(feature = "tracing")]
            tracing::debug!(path = %path.display(), rows = frame.height(), "table written");
            written.push(path);
        }
        Ok(written)
    }
}

/// Read every `*.parquet` file below `dir`, in path order.
///
/// # Errors
/// Returns `TallyError::InvalidArg` for an unusable directory pattern,
/// `TallyError::Io` when a file cannot be opened, or `TallyError::Table` when
/// decoding fails.
pub fn read_tables(dir: impl AsRef<Path>) -> Result<Vec<DataFrame>, TallyError> {
    let pattern = dir.as_ref().join("**").join("*.parquet");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| TallyError::InvalidArg(format!("bad table pattern '{pattern}': {e}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| TallyError::Io(e.to_string()))?);
    }
    paths.sort();
    paths
        .iter()
        .map(|path| {
            let file = File::open(path).map_err(|e| io_error(path, &e))?;
            ParquetReader::new(file).finish().map_err(|e| table_error(&e))
        })
        .collect()
}
