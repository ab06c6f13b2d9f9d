//! Persistence sinks for the count log
//!
//! Every write replaces the whole target. Content goes to a sibling temp
//! file which is synced and then renamed over the target, so a reader sees
//! either the previous complete log or the new one.

use crate::config::{LogConfig, LogFormat};
use crate::error::StorageError;
use sortline_core::{LogRecord, ObjectClass};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable destination for the full record set
pub trait PersistenceSink: Send {
    /// Overwrite the target with `records`. Never appends.
    fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError>;

    /// Where the artifact lives, for reporting
    fn location(&self) -> &Path;
}

impl<S: PersistenceSink + ?Sized> PersistenceSink for Box<S> {
    fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        (**self).write_records(records)
    }

    fn location(&self) -> &Path {
        (**self).location()
    }
}

/// Build the sink named by the configuration
pub fn build_sink(config: &LogConfig) -> Box<dyn PersistenceSink> {
    match config.format {
        LogFormat::Csv => Box::new(CsvFileSink::new(&config.path).utc_timestamps(config.utc_timestamps)),
        LogFormat::Json => Box::new(JsonFileSink::new(&config.path)),
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Write { path: path.to_path_buf(), source };

    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_err(e)
    })?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Spreadsheet-style CSV: one column per class, zero-filled
pub struct CsvFileSink {
    path: PathBuf,
    utc: bool,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), utc: false }
    }

    pub fn utc_timestamps(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    pub fn header() -> String {
        let mut header = String::from("Timestamp");
        for class in ObjectClass::ALL {
            header.push_str(&format!(",{} Count", class.label()));
        }
        header
    }

    pub fn render(&self, records: &[LogRecord]) -> String {
        let mut out = Self::header();
        out.push('\n');
        for record in records {
            let stamp = if self.utc {
                record.timestamp.to_string()
            } else {
                record.timestamp.format_local()
            };
            out.push_str(&stamp);
            for class in ObjectClass::ALL {
                out.push_str(&format!(",{}", record.counts.get(class)));
            }
            out.push('\n');
        }
        out
    }
}

impl PersistenceSink for CsvFileSink {
    fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        write_atomic(&self.path, self.render(records).as_bytes())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Pretty JSON array of records
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersistenceSink for JsonFileSink {
    fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &json)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
