//! Execution log storage -- record model, snapshots, and log backends.
//!
//! The service never writes to the log. Every query reads a full [`Snapshot`]
//! through a [`LogSource`]; the snapshot is immutable for the life of the query.

pub mod cache;
pub mod csv_log;
pub mod schema;
pub mod sqlite_log;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::{SourceConfig, SourceKind};

pub use self::cache::SnapshotCache;
pub use self::csv_log::CsvLog;
pub use self::sqlite_log::{Pool, SqliteLog};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("execution log not found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read execution log: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV execution log: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("execution log schema mismatch: {0}")]
    Schema(String),

    #[error("row {row}: invalid {field}: {message}")]
    Field {
        row: usize,
        field: &'static str,
        message: String,
    },
}

/// Outcome of one pipeline run, as recorded by the execution system.
///
/// Codes `2..=4` are distinct failure variants upstream; they are kept apart
/// for statistics but all mean "errored" to the readiness evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed { code: u8 },
    Unrecognized(i64),
}

impl RunStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Running,
            1 => Self::Succeeded,
            2..=4 => Self::Failed { code: code as u8 },
            other => Self::Unrecognized(other),
        }
    }

    /// The raw integer written to the log.
    pub fn code(&self) -> i64 {
        match self {
            Self::Running => 0,
            Self::Succeeded => 1,
            Self::Failed { code } => i64::from(*code),
            Self::Unrecognized(code) => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

/// One logged attempt to run a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub region: String,
    pub pipeline_name: String,
    pub start_time: NaiveDateTime,
    /// `None` while the run has not finished.
    pub end_time: Option<NaiveDateTime>,
    pub run_status: RunStatus,
}

impl ExecutionRecord {
    /// Calendar day the run belongs to (date of `start_time`).
    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }

    /// Wall-clock duration in minutes. Negative when the log has `end < start`.
    pub fn duration_minutes(&self) -> Option<f64> {
        self.end_time.map(|end| {
            let elapsed = end - self.start_time;
            match elapsed.num_microseconds() {
                Some(micros) => micros as f64 / 60_000_000.0,
                // Spans too large for microseconds fall back to milliseconds.
                None => elapsed.num_milliseconds() as f64 / 60_000.0,
            }
        })
    }
}

/// Opaque identifier of the log contents at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotVersion(String);

impl SnapshotVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full execution log as read at one instant, in load order.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<ExecutionRecord>,
    version: Option<SnapshotVersion>,
}

impl Snapshot {
    pub fn new(records: Vec<ExecutionRecord>, version: Option<SnapshotVersion>) -> Self {
        Self { records, version }
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn version(&self) -> Option<&SnapshotVersion> {
        self.version.as_ref()
    }
}

/// A backing store that can produce a consistent snapshot of the execution log.
pub trait LogSource: Send + Sync {
    fn load(&self) -> Result<Snapshot, LoadError>;

    /// Cheap version probe. `None` means the source cannot tell, and callers
    /// must reload on every query.
    fn version(&self) -> Result<Option<SnapshotVersion>, LoadError> {
        Ok(None)
    }

    fn describe(&self) -> String;
}

/// Build the configured log source.
pub fn open_source(cfg: &SourceConfig) -> Result<Box<dyn LogSource>, LoadError> {
    let source: Box<dyn LogSource> = match cfg.kind {
        SourceKind::Csv => Box::new(CsvLog::new(&cfg.path)),
        SourceKind::Sqlite => Box::new(SqliteLog::open(&cfg.path)?),
    };
    tracing::info!(source = %source.describe(), "execution log source ready");
    Ok(source)
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a log timestamp. Offsets are normalized to UTC; bare dates mean midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a run-status cell. Dataframe exports write integral floats (`1.0`).
pub fn parse_status(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(code) = raw.parse::<i64>() {
        return Some(code);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Shared row validation for every backend.
pub(crate) fn record_from_fields(
    row: usize,
    region: String,
    pipeline_name: String,
    start_time: &str,
    end_time: Option<&str>,
    run_status: i64,
) -> Result<ExecutionRecord, LoadError> {
    let field_error = |field: &'static str, message: String| LoadError::Field {
        row,
        field,
        message,
    };

    let region = region.trim().to_string();
    if region.is_empty() {
        return Err(field_error("region", "empty".to_string()));
    }
    let pipeline_name = pipeline_name.trim().to_string();
    if pipeline_name.is_empty() {
        return Err(field_error("pipeline_name", "empty".to_string()));
    }

    let start_time = parse_timestamp(start_time)
        .ok_or_else(|| field_error("start_time", format!("unparseable timestamp '{start_time}'")))?;

    let end_time = match end_time.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            parse_timestamp(raw)
                .ok_or_else(|| field_error("end_time", format!("unparseable timestamp '{raw}'")))?,
        ),
        None => None,
    };

    Ok(ExecutionRecord {
        region,
        pipeline_name,
        start_time,
        end_time,
        run_status: RunStatus::from_code(run_status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).expect("timestamp")
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        assert_eq!(ts("2024-01-01 08:00:00"), expected);
        assert_eq!(ts("2024-01-01T08:00:00"), expected);
        assert_eq!(ts("2024-01-01 08:00"), expected);
        assert_eq!(ts("2024-01-01T08:00"), expected);
        assert_eq!(ts("2024-01-01 08:00:00.000"), expected);
        assert_eq!(ts("2024-01-01T10:00:00+02:00"), expected);
        assert_eq!(ts("  2024-01-01 08:00:00 "), expected);
        assert_eq!(ts("2024-01-01"), expected.date().and_hms_opt(0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("1"), Some(1));
        assert_eq!(parse_status(" 3 "), Some(3));
        assert_eq!(parse_status("2.0"), Some(2));
        assert_eq!(parse_status("2.5"), None);
        assert_eq!(parse_status("ok"), None);
        assert_eq!(parse_status("NaN"), None);
    }

    #[test]
    fn test_run_status_codes_round_trip() {
        for code in [-1, 0, 1, 2, 3, 4, 5, 99] {
            assert_eq!(RunStatus::from_code(code).code(), code);
        }
        assert_eq!(RunStatus::from_code(0), RunStatus::Running);
        assert_eq!(RunStatus::from_code(1), RunStatus::Succeeded);
        assert_eq!(RunStatus::from_code(4), RunStatus::Failed { code: 4 });
        assert_eq!(RunStatus::from_code(7), RunStatus::Unrecognized(7));
        assert_eq!(RunStatus::Failed { code: 3 }.to_string(), "failed (3)");
    }

    #[test]
    fn test_duration_is_derived_and_may_be_negative() {
        let mut record = ExecutionRecord {
            region: "eu".to_string(),
            pipeline_name: "ingest".to_string(),
            start_time: ts("2024-01-01 08:00:00"),
            end_time: Some(ts("2024-01-01 08:30:30")),
            run_status: RunStatus::Succeeded,
        };
        assert_eq!(record.duration_minutes(), Some(30.5));
        assert_eq!(record.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        record.end_time = Some(ts("2024-01-01 07:50:00"));
        assert_eq!(record.duration_minutes(), Some(-10.0));

        record.end_time = None;
        assert_eq!(record.duration_minutes(), None);
    }

    #[test]
    fn test_duration_keeps_microseconds() {
        let record = ExecutionRecord {
            region: "eu".to_string(),
            pipeline_name: "ingest".to_string(),
            start_time: ts("2024-01-01 08:00:00"),
            end_time: Some(ts("2024-01-01 08:00:00.000030")),
            run_status: RunStatus::Succeeded,
        };
        let minutes = record.duration_minutes().unwrap();
        assert!(minutes > 0.0);
        assert!((minutes - 30.0 / 60_000_000.0).abs() < 1e-15);
    }

    #[test]
    fn test_record_from_fields_validation() {
        let ok = record_from_fields(
            2,
            " eu ".to_string(),
            "ingest".to_string(),
            "2024-01-01 08:00:00",
            Some(""),
            0,
        )
        .unwrap();
        assert_eq!(ok.region, "eu");
        assert!(ok.end_time.is_none());

        let err = record_from_fields(
            7,
            "eu".to_string(),
            "ingest".to_string(),
            "not a time",
            None,
            1,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Field {
                row: 7,
                field: "start_time",
                ..
            }
        ));

        let err = record_from_fields(
            3,
            "".to_string(),
            "ingest".to_string(),
            "2024-01-01 08:00:00",
            None,
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_run_status_serializes_as_code() {
        let json = serde_json::to_string(&RunStatus::Failed { code: 2 }).unwrap();
        assert_eq!(json, "2");
    }
}
