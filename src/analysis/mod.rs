//! Core analysis over execution-log snapshots: record selection, duration
//! statistics, and dependency readiness.

pub mod filter;
pub mod readiness;
pub mod stats;

pub use self::filter::DuplicatePolicy;
pub use self::readiness::{Assessment, DependencyReadiness, ReadinessCode};
pub use self::stats::{AggregateStats, DurationSummary};
