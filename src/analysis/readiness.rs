//! Dependency readiness.
//!
//! A dependent pipeline may only trust an upstream's output if the upstream
//! finished successfully *before* the dependent started reading. Every
//! upstream name yields exactly one code; evaluation itself never fails.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::filter::{self, DuplicatePolicy};
use crate::storage::{ExecutionRecord, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessCode {
    /// Upstream is still running.
    Running = 0,
    /// Upstream finished in time; its output is fresh.
    Ready = 1,
    /// Upstream errored, is missing, or its record cannot be evaluated.
    Blocked = 2,
    /// Upstream succeeded, but only after the dependent had started.
    Stale = 3,
}

impl ReadinessCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for ReadinessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

impl Serialize for ReadinessCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Which rule of the decision table matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    NoRecord,
    DuplicateRecords,
    StillRunning,
    Errored,
    FinishedInTime,
    FinishedLate,
    MissingEndTime,
    UnrecognizedStatus,
}

impl Assessment {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoRecord => "no_record",
            Self::DuplicateRecords => "duplicate_records",
            Self::StillRunning => "still_running",
            Self::Errored => "errored",
            Self::FinishedInTime => "finished_in_time",
            Self::FinishedLate => "finished_late",
            Self::MissingEndTime => "missing_end_time",
            Self::UnrecognizedStatus => "unrecognized_status",
        }
    }

    pub fn code(self) -> ReadinessCode {
        match self {
            Self::StillRunning => ReadinessCode::Running,
            Self::FinishedInTime => ReadinessCode::Ready,
            Self::FinishedLate => ReadinessCode::Stale,
            Self::NoRecord
            | Self::DuplicateRecords
            | Self::Errored
            | Self::MissingEndTime
            | Self::UnrecognizedStatus => ReadinessCode::Blocked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReadiness {
    pub upstream: String,
    pub code: ReadinessCode,
    pub assessment: Assessment,
}

/// Classify one upstream record against the dependent's start time.
pub fn assess(upstream: &ExecutionRecord, dependent_start: NaiveDateTime) -> Assessment {
    match upstream.run_status {
        RunStatus::Running => Assessment::StillRunning,
        RunStatus::Failed { .. } => Assessment::Errored,
        RunStatus::Succeeded => match upstream.end_time {
            // Finishing exactly when the dependent starts counts as ready.
            Some(end) if end <= dependent_start => Assessment::FinishedInTime,
            Some(_) => Assessment::FinishedLate,
            None => Assessment::MissingEndTime,
        },
        RunStatus::Unrecognized(_) => Assessment::UnrecognizedStatus,
    }
}

/// Evaluate each upstream, in input order, against `dependent`.
///
/// `day_records` is the region/day subset the upstream records are looked up in.
pub fn evaluate(
    dependent: &ExecutionRecord,
    upstreams: &[String],
    day_records: &[&ExecutionRecord],
    policy: DuplicatePolicy,
) -> Vec<DependencyReadiness> {
    upstreams
        .iter()
        .map(|name| {
            let matches = filter::named(day_records, name);
            let assessment = match filter::resolve(&matches, policy) {
                Ok(Some(upstream)) => assess(upstream, dependent.start_time),
                Ok(None) => Assessment::NoRecord,
                Err(_) => Assessment::DuplicateRecords,
            };
            DependencyReadiness {
                upstream: name.clone(),
                code: assessment.code(),
                assessment,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parse_timestamp;

    fn run(pipeline: &str, start: &str, end: Option<&str>, status: i64) -> ExecutionRecord {
        ExecutionRecord {
            region: "eu".to_string(),
            pipeline_name: pipeline.to_string(),
            start_time: parse_timestamp(start).unwrap(),
            end_time: end.map(|e| parse_timestamp(e).unwrap()),
            run_status: RunStatus::from_code(status),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn codes(results: &[DependencyReadiness]) -> Vec<u8> {
        results.iter().map(|r| r.code.code()).collect()
    }

    #[test]
    fn test_scenario_all_outcomes() {
        let dependent = run("report", "2024-01-01 08:00", None, 0);
        let day = [
            run("a", "2024-01-01 07:00", Some("2024-01-01 07:55"), 1),
            run("b", "2024-01-01 07:00", Some("2024-01-01 08:05"), 1),
            run("c", "2024-01-01 07:00", None, 0),
            run("d", "2024-01-01 07:00", Some("2024-01-01 07:10"), 2),
            dependent.clone(),
        ];
        let refs: Vec<&ExecutionRecord> = day.iter().collect();

        let results = evaluate(
            &dependent,
            &names(&["a", "b", "c", "d", "e"]),
            &refs,
            DuplicatePolicy::Reject,
        );

        assert_eq!(codes(&results), vec![1, 3, 0, 2, 2]);
        assert_eq!(results[0].assessment, Assessment::FinishedInTime);
        assert_eq!(results[1].assessment, Assessment::FinishedLate);
        assert_eq!(results[2].assessment, Assessment::StillRunning);
        assert_eq!(results[3].assessment, Assessment::Errored);
        assert_eq!(results[4].assessment, Assessment::NoRecord);
        assert_eq!(results[4].upstream, "e");
    }

    #[test]
    fn test_end_equal_to_start_is_ready() {
        let dependent = run("report", "2024-01-01 08:00", None, 0);
        let upstream = run("a", "2024-01-01 07:00", Some("2024-01-01 08:00"), 1);
        assert_eq!(
            assess(&upstream, dependent.start_time),
            Assessment::FinishedInTime
        );
    }

    #[test]
    fn test_every_status_maps_to_a_known_code() {
        let start = parse_timestamp("2024-01-01 08:00").unwrap();
        for status in -2..=10 {
            for end in [None, Some("2024-01-01 07:00"), Some("2024-01-01 09:00")] {
                let upstream = run("a", "2024-01-01 06:00", end, status);
                let code = assess(&upstream, start).code().code();
                assert!(code <= 3, "status {status} produced code {code}");
            }
        }
    }

    #[test]
    fn test_failure_variants_and_unknown_codes_block() {
        let start = parse_timestamp("2024-01-01 08:00").unwrap();
        for status in [2, 3, 4] {
            let upstream = run("a", "2024-01-01 06:00", Some("2024-01-01 07:00"), status);
            assert_eq!(assess(&upstream, start), Assessment::Errored);
        }
        for status in [-1, 5, 42] {
            let upstream = run("a", "2024-01-01 06:00", Some("2024-01-01 07:00"), status);
            assert_eq!(assess(&upstream, start), Assessment::UnrecognizedStatus);
            assert_eq!(assess(&upstream, start).code(), ReadinessCode::Blocked);
        }
    }

    #[test]
    fn test_succeeded_without_end_time_blocks() {
        let start = parse_timestamp("2024-01-01 08:00").unwrap();
        let upstream = run("a", "2024-01-01 06:00", None, 1);
        assert_eq!(assess(&upstream, start), Assessment::MissingEndTime);
        assert_eq!(Assessment::MissingEndTime.code(), ReadinessCode::Blocked);
    }

    #[test]
    fn test_empty_upstream_list() {
        let dependent = run("report", "2024-01-01 08:00", None, 0);
        let refs = vec![&dependent];
        assert!(evaluate(&dependent, &[], &refs, DuplicatePolicy::Reject).is_empty());
    }

    #[test]
    fn test_missing_upstream_blocks_whatever_the_dependent_status() {
        for status in [0, 1, 2, 3, 4, 7] {
            let dependent = run("report", "2024-01-01 08:00", Some("2024-01-01 08:30"), status);
            let refs = vec![&dependent];
            let results = evaluate(&dependent, &names(&["ghost"]), &refs, DuplicatePolicy::Reject);
            assert_eq!(codes(&results), vec![2]);
        }
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let dependent = run("report", "2024-01-01 08:00", None, 0);
        let day = [
            run("a", "2024-01-01 07:00", Some("2024-01-01 07:55"), 1),
            run("b", "2024-01-01 07:00", Some("2024-01-01 08:05"), 1),
        ];
        let refs: Vec<&ExecutionRecord> = day.iter().collect();
        let upstreams = names(&["a", "b", "a", "zzz"]);

        let first = evaluate(&dependent, &upstreams, &refs, DuplicatePolicy::Reject);
        let second = evaluate(&dependent, &upstreams, &refs, DuplicatePolicy::Reject);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_duplicate_upstream_records_follow_policy() {
        let dependent = run("report", "2024-01-01 08:00", None, 0);
        let day = [
            run("a", "2024-01-01 05:00", Some("2024-01-01 05:30"), 2),
            run("a", "2024-01-01 07:00", Some("2024-01-01 07:30"), 1),
        ];
        let refs: Vec<&ExecutionRecord> = day.iter().collect();
        let upstreams = names(&["a"]);

        let rejected = evaluate(&dependent, &upstreams, &refs, DuplicatePolicy::Reject);
        assert_eq!(rejected[0].assessment, Assessment::DuplicateRecords);
        assert_eq!(rejected[0].code, ReadinessCode::Blocked);

        let first = evaluate(&dependent, &upstreams, &refs, DuplicatePolicy::First);
        assert_eq!(first[0].assessment, Assessment::Errored);

        let latest = evaluate(&dependent, &upstreams, &refs, DuplicatePolicy::LatestStart);
        assert_eq!(latest[0].assessment, Assessment::FinishedInTime);
    }

    #[test]
    fn test_code_serializes_as_integer() {
        let result = DependencyReadiness {
            upstream: "a".to_string(),
            code: ReadinessCode::Stale,
            assessment: Assessment::FinishedLate,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["code"], 3);
        assert_eq!(json["assessment"], "finished_late");
        assert_eq!(json["assessment"], Assessment::FinishedLate.label());
    }
}
