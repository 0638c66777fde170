//! Query service: the three read-only operations over one execution-log snapshot.
//!
//! The `*_in` functions are pure over an explicit [`Snapshot`]. [`QueryService`]
//! owns the log source and takes one snapshot per call (optionally through the
//! versioned [`SnapshotCache`]).

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::filter::{self, DuplicatePolicy};
use crate::analysis::readiness::{self, DependencyReadiness};
use crate::analysis::stats::{self, AggregateStats};
use crate::config::Config;
use crate::storage::{
    self, ExecutionRecord, LoadError, LogSource, RunStatus, Snapshot, SnapshotCache,
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no execution found for {0}")]
    NotFound(String),

    #[error("{count} executions recorded for {key} and the duplicate policy is 'reject'")]
    DuplicateRecords { key: String, count: usize },

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The execution of one pipeline on one day.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStatus {
    pub region: String,
    pub pipeline: String,
    pub day: NaiveDate,
    pub run_status: RunStatus,
    pub status_label: &'static str,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<f64>,
    pub log: String,
}

impl ExecutionStatus {
    fn from_record(record: &ExecutionRecord, day: NaiveDate) -> Self {
        let end = record
            .end_time
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        Self {
            region: record.region.clone(),
            pipeline: record.pipeline_name.clone(),
            day,
            run_status: record.run_status,
            status_label: record.run_status.label(),
            start_time: record.start_time,
            end_time: record.end_time,
            duration_minutes: record.duration_minutes(),
            log: format!("start: {}, end: {}", record.start_time, end),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub region: String,
    pub pipeline: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(flatten)]
    pub stats: AggregateStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub region: String,
    pub pipeline: String,
    pub day: NaiveDate,
    pub dependent_start: NaiveDateTime,
    pub dependencies: Vec<DependencyReadiness>,
}

fn day_key(region: &str, pipeline: &str, day: NaiveDate) -> String {
    format!("region={region} pipeline={pipeline} day={day}")
}

fn resolve_one<'a>(
    matches: &[&'a ExecutionRecord],
    policy: DuplicatePolicy,
    region: &str,
    pipeline: &str,
    day: NaiveDate,
) -> Result<&'a ExecutionRecord, QueryError> {
    match filter::resolve(matches, policy) {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(QueryError::NotFound(day_key(region, pipeline, day))),
        Err(dup) => Err(QueryError::DuplicateRecords {
            key: day_key(region, pipeline, day),
            count: dup.count,
        }),
    }
}

/// Look up the execution of `pipeline` in `region` on `day`.
pub fn execution_status_in(
    snapshot: &Snapshot,
    policy: DuplicatePolicy,
    region: &str,
    pipeline: &str,
    day: NaiveDate,
) -> Result<ExecutionStatus, QueryError> {
    let matches = filter::by_day(snapshot.records(), region, pipeline, day);
    let record = resolve_one(&matches, policy, region, pipeline, day)?;
    Ok(ExecutionStatus::from_record(record, day))
}

/// Duration statistics for `pipeline` in `region` over `[from, to]`.
pub fn statistics_in(
    snapshot: &Snapshot,
    region: &str,
    pipeline: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<StatisticsReport, QueryError> {
    let matches = filter::by_range(snapshot.records(), region, pipeline, from, to);
    let stats = stats::aggregate(&matches).ok_or_else(|| {
        QueryError::NotFound(format!(
            "region={region} pipeline={pipeline} from={from} to={to}"
        ))
    })?;

    Ok(StatisticsReport {
        region: region.to_string(),
        pipeline: pipeline.to_string(),
        from,
        to,
        stats,
    })
}

/// Readiness of each upstream for the run of `pipeline` in `region` on `day`.
pub fn readiness_in(
    snapshot: &Snapshot,
    policy: DuplicatePolicy,
    region: &str,
    pipeline: &str,
    day: NaiveDate,
    upstreams: &[String],
) -> Result<ReadinessReport, QueryError> {
    let day_records = filter::by_region_day(snapshot.records(), region, day);
    let own = filter::named(&day_records, pipeline);
    let dependent = resolve_one(&own, policy, region, pipeline, day)?;

    let dependencies = readiness::evaluate(dependent, upstreams, &day_records, policy);

    Ok(ReadinessReport {
        region: region.to_string(),
        pipeline: pipeline.to_string(),
        day,
        dependent_start: dependent.start_time,
        dependencies,
    })
}

/// Owns the log source and answers queries against a fresh snapshot.
pub struct QueryService {
    source: Box<dyn LogSource>,
    policy: DuplicatePolicy,
    cache: Option<SnapshotCache>,
}

impl QueryService {
    pub fn new(source: Box<dyn LogSource>, policy: DuplicatePolicy) -> Self {
        Self {
            source,
            policy,
            cache: None,
        }
    }

    /// Serve snapshots through a version-keyed cache.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(SnapshotCache::new());
        self
    }

    pub fn from_config(cfg: &Config) -> Result<Self, LoadError> {
        let source = storage::open_source(&cfg.source)?;
        let service = Self::new(source, cfg.query.duplicate_policy);
        Ok(if cfg.source.cache_snapshots {
            service.with_cache()
        } else {
            service
        })
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>, LoadError> {
        let result = match &self.cache {
            Some(cache) => cache.get_or_load(self.source.as_ref()),
            None => self.source.load().map(Arc::new),
        };
        match &result {
            Ok(snapshot) if snapshot.is_empty() => {
                warn!(source = %self.source.describe(), "execution log has no records");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(source = %self.source.describe(), error = %err, "failed to load execution log");
            }
        }
        result
    }

    pub fn execution_status(
        &self,
        region: &str,
        pipeline: &str,
        day: NaiveDate,
    ) -> Result<ExecutionStatus, QueryError> {
        debug!(region, pipeline, %day, "execution status query");
        let snapshot = self.snapshot()?;
        execution_status_in(&snapshot, self.policy, region, pipeline, day)
    }

    pub fn statistics(
        &self,
        region: &str,
        pipeline: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<StatisticsReport, QueryError> {
        debug!(region, pipeline, %from, %to, "statistics query");
        let snapshot = self.snapshot()?;
        statistics_in(&snapshot, region, pipeline, from, to)
    }

    pub fn readiness(
        &self,
        region: &str,
        pipeline: &str,
        day: NaiveDate,
        upstreams: &[String],
    ) -> Result<ReadinessReport, QueryError> {
        debug!(region, pipeline, %day, upstreams = upstreams.len(), "readiness query");
        let snapshot = self.snapshot()?;
        readiness_in(&snapshot, self.policy, region, pipeline, day, upstreams)
    }
}
