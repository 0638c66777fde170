//! Flat CSV execution log.
//!
//! Expected header: `region,pipeline_name,start_time,end_time,run_status`.
//! Extra columns are ignored and an empty `end_time` means the run is still open.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use tracing::debug;

use super::{parse_status, record_from_fields, LoadError, LogSource, Snapshot, SnapshotVersion};

#[derive(Debug, Deserialize)]
struct CsvRow {
    region: String,
    pipeline_name: String,
    start_time: String,
    end_time: Option<String>,
    run_status: String,
}

#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }


    fn missing_or(&self, err: std::io::Error) -> LoadError {
        if err.kind() == ErrorKind::NotFound {
            LoadError::Missing {
                path: self.path.clone(),
            }
        } else {
            LoadError::Io(err)
        }
    }
}

impl LogSource for CsvLog {
    fn load(&self) -> Result<Snapshot, LoadError> {
        let version = self.version()?;
        let file = File::open(&self.path).map_err(|e| self.missing_or(e))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<CsvRow>().enumerate() {
            // Line 1 is the header.
            let line = idx + 2;
            let row = row?;
            let status = parse_status(&row.run_status).ok_or_else(|| LoadError::Field {
                row: line,
                field: "run_status",
                message: format!("not an integer code: '{}'", row.run_status),
            })?;
            records.push(record_from_fields(
                line,
                row.region,
                row.pipeline_name,
                &row.start_time,
                row.end_time.as_deref(),
                status,
            )?);
        }

        debug!(path = %self.path.display(), records = records.len(), "loaded CSV execution log");
        Ok(Snapshot::new(records, version))
    }

    fn version(&self) -> Result<Option<SnapshotVersion>, LoadError> {
        let meta = fs::metadata(&self.path).map_err(|e| self.missing_or(e))?;
        let modified = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Some(SnapshotVersion::new(format!("{}:{}", meta.len(), modified))))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
