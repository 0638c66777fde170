use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::storage::ExecutionRecord;

const TIME_OF_DAY: &str = "%H:%M";

/// Duration and time-of-day bounds over a set of runs.
///
/// Runs without an `end_time` still count toward `record_count` and the start
/// bounds, but contribute no duration. When no run has finished the duration
/// fields are `None` rather than NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    pub record_count: usize,
    pub mean_minutes: Option<f64>,
    pub max_minutes: Option<f64>,
    pub min_minutes: Option<f64>,
    pub earliest_start: String,
    pub latest_start: String,
    pub earliest_end: Option<String>,
    pub latest_end: Option<String>,
}

/// Summary over the whole range plus one summary per run-status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub overall: DurationSummary,
    pub by_status: BTreeMap<i64, DurationSummary>,
}

/// Aggregate a filtered set of runs. Returns `None` for an empty input.
pub fn aggregate(records: &[&ExecutionRecord]) -> Option<AggregateStats> {
    let overall = summarize(records)?;

    let mut groups: BTreeMap<i64, Vec<&ExecutionRecord>> = BTreeMap::new();
    for &record in records {
        groups
            .entry(record.run_status.code())
            .or_default()
            .push(record);
    }

    let by_status = groups
        .into_iter()
        .filter_map(|(code, group)| summarize(&group).map(|summary| (code, summary)))
        .collect();

    Some(AggregateStats { overall, by_status })
}

pub fn summarize(records: &[&ExecutionRecord]) -> Option<DurationSummary> {
    let first = records.first()?;

    let durations: Vec<f64> = records.iter().filter_map(|r| r.duration_minutes()).collect();
    let mean_minutes =
        (!durations.is_empty()).then(|| durations.iter().sum::<f64>() / durations.len() as f64);
    let max_minutes = durations.iter().copied().reduce(f64::max);
    let min_minutes = durations.iter().copied().reduce(f64::min);

    // Extremes are taken over full timestamps, then reduced to time of day.
    let (earliest_start, latest_start) = records.iter().fold(
        (first.start_time, first.start_time),
        |(lo, hi), r| (lo.min(r.start_time), hi.max(r.start_time)),
    );
    let ends = records.iter().filter_map(|r| r.end_time);
    let earliest_end = ends.clone().min();
    let latest_end = ends.max();

    Some(DurationSummary {
        record_count: records.len(),
        mean_minutes,
        max_minutes,
        min_minutes,
        earliest_start: time_of_day(earliest_start),
        latest_start: time_of_day(latest_start),
        earliest_end: earliest_end.map(time_of_day),
        latest_end: latest_end.map(time_of_day),
    })
}

fn time_of_day(ts: NaiveDateTime) -> String {
    ts.format(TIME_OF_DAY).to_string()
}
