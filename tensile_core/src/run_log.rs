//! Per-run data log: `;`-separated `Position;Force` rows, two decimals,
//! flushed after every record.
//!
//! Files are named `<dir>/<base>_<n>.csv` with the smallest `n >= 1` that
//! does not exist yet.
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, RigError};

pub const DEFAULT_BASE_NAME: &str = "tensile_log";
pub const HEADER: [&str; 2] = ["Position", "Force"];

/// One logging tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub position_mm: f64,
    pub force: f64,
}

/// First free `<base>_<n>.csv` in `dir`, creating `dir` if needed.
/// An empty or blank base falls back to [`DEFAULT_BASE_NAME`].
pub fn next_log_path(dir: &Path, base: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let base = effective_base(base);
    let mut n: u32 = 1;
    loop {
        let candidate = dir.join(format!("{base}_{n}.csv"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        n = n
            .checked_add(1)
            .ok_or_else(|| io::Error::other("no free log file index"))?;
    }
}

fn effective_base(base: &str) -> &str {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        trimmed
    }
}

/// Sink the run log writes through; a file unless a caller injects another.
pub type LogWriter = Box<dyn Write + Send>;

#[derive(Debug)]
pub struct RunLog<W: Write = LogWriter> {
    writer: csv::Writer<W>,
    path: PathBuf,
    records: u64,
}

fn log_err(what: &str, path: &Path, e: &dyn std::fmt::Display) -> eyre::Report {
    eyre::Report::new(RigError::LogFile(format!(
        "{what} {}: {e}",
        path.display()
    )))
}

impl RunLog {
    /// Allocate the next file name, create it and write the header.
    pub fn create(dir: &Path, base: &str) -> Result<Self> {
        Self::create_with(dir, base, |file| Box::new(file) as LogWriter)
    }
}

impl<W: Write> RunLog<W> {
    /// Like [`RunLog::create`], writing through `wrap(file)`. A file whose
    /// header cannot be written is removed again.
    pub fn create_with(dir: &Path, base: &str, wrap: impl FnOnce(File) -> W) -> Result<Self> {
        let path = next_log_path(dir, base).map_err(|e| log_err("cannot prepare", dir, &e))?;
        // create_new: never clobber a file that appeared after the scan.
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| log_err("cannot create", &path, &e))?;

        Self::with_writer(wrap(file), path.clone()).inspect_err(|_| {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "cannot remove partial run log");
            }
        })
    }

    /// Start a log on an already opened sink, writing the header.
    pub fn with_writer(sink: W, path: PathBuf) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(sink);
        writer
            .write_record(HEADER)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| log_err("cannot write header to", &path, &e))?;

        tracing::info!(path = %path.display(), "run log opened");
        Ok(Self {
            writer,
            path,
            records: 0,
        })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, rec: LogRecord) -> Result<()> {
        let pos = format!("{:.2}", rec.position_mm);
        let force = format!("{:.2}", rec.force);
        self.writer
            .write_record([pos.as_str(), force.as_str()])
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| log_err("write to", &self.path, &e))?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and close, returning the file path.
    pub fn close(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .map_err(|e| log_err("flush of", &self.path, &e))?;
        tracing::info!(path = %self.path.display(), records = self.records, "run log closed");
        Ok(self.path)
    }
}
