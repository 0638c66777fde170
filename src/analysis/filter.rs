//! Record selection over a snapshot, and duplicate resolution.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::ExecutionRecord;

/// How to pick "the" execution when several share a (region, pipeline, day) key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Treat more than one record as an error.
    #[default]
    Reject,
    /// Take the first record in load order.
    First,
    /// Take the record with the latest `start_time`; ties go to load order.
    LatestStart,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::First => "first",
            Self::LatestStart => "latest_start",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(Self::Reject),
            "first" => Ok(Self::First),
            "latest_start" | "latest" => Ok(Self::LatestStart),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected reject, first or latest_start)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{count} records share the same key")]
pub struct Duplicates {
    pub count: usize,
}

/// Records of one pipeline in one region on one day.
pub fn by_day<'a>(
    records: &'a [ExecutionRecord],
    region: &str,
    pipeline: &str,
    date: NaiveDate,
) -> Vec<&'a ExecutionRecord> {
    records
        .iter()
        .filter(|r| r.region == region && r.pipeline_name == pipeline && r.date() == date)
        .collect()
}

/// Records of one pipeline in one region between two days, both inclusive.
pub fn by_range<'a>(
    records: &'a [ExecutionRecord],
    region: &str,
    pipeline: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<&'a ExecutionRecord> {
    records
        .iter()
        .filter(|r| r.region == region && r.pipeline_name == pipeline)
        .filter(|r| {
            let date = r.date();
            date >= from && date <= to
        })
        .collect()
}

/// Every record in a region on one day, across pipelines.
pub fn by_region_day<'a>(
    records: &'a [ExecutionRecord],
    region: &str,
    date: NaiveDate,
) -> Vec<&'a ExecutionRecord> {
    records
        .iter()
        .filter(|r| r.region == region && r.date() == date)
        .collect()
}

/// Narrow an already-filtered subset to one pipeline name.
pub fn named<'a>(records: &[&'a ExecutionRecord], pipeline: &str) -> Vec<&'a ExecutionRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.pipeline_name == pipeline)
        .collect()
}

pub fn resolve<'a>(
    matches: &[&'a ExecutionRecord],
    policy: DuplicatePolicy,
) -> Result<Option<&'a ExecutionRecord>, Duplicates> {
    match (matches, policy) {
        ([], _) => Ok(None),
        ([only], _) => Ok(Some(*only)),
        (_, DuplicatePolicy::Reject) => Err(Duplicates {
            count: matches.len(),
        }),
        (_, DuplicatePolicy::First) => Ok(matches.first().copied()),
        // max_by_key keeps the last maximum, so walk backwards to favour load order.
        (_, DuplicatePolicy::LatestStart) => {
            Ok(matches.iter().rev().copied().max_by_key(|r| r.start_time))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{parse_timestamp, RunStatus};

    fn rec(region: &str, pipeline: &str, start: &str, status: i64) -> ExecutionRecord {
        ExecutionRecord {
            region: region.to_string(),
            pipeline_name: pipeline.to_string(),
            start_time: parse_timestamp(start).unwrap(),
            end_time: None,
            run_status: RunStatus::from_code(status),
        }
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn sample() -> Vec<ExecutionRecord> {
        vec![
            rec("eu", "ingest", "2024-01-01 07:00", 1),
            rec("eu", "ingest", "2024-01-02 07:00", 1),
            rec("eu", "ingest", "2024-01-03 23:59", 2),
            rec("eu", "ingest", "2024-01-04 00:00", 1),
            rec("us", "ingest", "2024-01-02 07:00", 1),
            rec("eu", "transform", "2024-01-02 08:00", 0),
        ]
    }

    #[test]
    fn test_by_day_exact_match() {
        let records = sample();
        let hits = by_day(&records, "eu", "ingest", day("2024-01-02"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].region, "eu");

        assert!(by_day(&records, "EU", "ingest", day("2024-01-02")).is_empty());
        assert!(by_day(&records, "eu", "ingest", day("2023-12-31")).is_empty());
    }

    #[test]
    fn test_by_range_is_inclusive() {
        let records = sample();
        let hits = by_range(&records, "eu", "ingest", day("2024-01-02"), day("2024-01-03"));
        assert_eq!(hits.len(), 2);

        let all = by_range(&records, "eu", "ingest", day("2024-01-01"), day("2024-01-04"));
        assert_eq!(all.len(), 4);

        assert!(by_range(&records, "eu", "ingest", day("2024-01-04"), day("2024-01-01")).is_empty());
    }

    #[test]
    fn test_by_region_day_spans_pipelines() {
        let records = sample();
        let hits = by_region_day(&records, "eu", day("2024-01-02"));
        assert_eq!(hits.len(), 2);
        assert_eq!(named(&hits, "transform").len(), 1);
        assert!(named(&hits, "publish").is_empty());
    }

    #[test]
    fn test_resolve_policies() {
        let records = vec![
            rec("eu", "ingest", "2024-01-01 06:00", 2),
            rec("eu", "ingest", "2024-01-01 09:00", 1),
            rec("eu", "ingest", "2024-01-01 09:00", 0),
        ];
        let matches: Vec<&ExecutionRecord> = records.iter().collect();

        assert_eq!(
            resolve(&matches, DuplicatePolicy::Reject),
            Err(Duplicates { count: 3 })
        );

        let first = resolve(&matches, DuplicatePolicy::First).unwrap().unwrap();
        assert_eq!(first.run_status, RunStatus::Failed { code: 2 });

        let latest = resolve(&matches, DuplicatePolicy::LatestStart)
            .unwrap()
            .unwrap();
        assert_eq!(latest.run_status, RunStatus::Succeeded);
    }

    #[test]
    fn test_resolve_single_and_empty_ignore_policy() {
        let records = vec![rec("eu", "ingest", "2024-01-01 06:00", 1)];
        let one: Vec<&ExecutionRecord> = records.iter().collect();

        for policy in [
            DuplicatePolicy::Reject,
            DuplicatePolicy::First,
            DuplicatePolicy::LatestStart,
        ] {
            assert_eq!(resolve(&one, policy).unwrap(), Some(&records[0]));
            assert_eq!(resolve(&[], policy).unwrap(), None);
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("reject".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Reject));
        assert_eq!("First".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::First));
        assert_eq!(
            "latest-start".parse::<DuplicatePolicy>(),
            Ok(DuplicatePolicy::LatestStart)
        );
        assert!("newest".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Reject);
    }
}
