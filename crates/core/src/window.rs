use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracedeckError};

/// Bucket granularity for time-series aggregation. Keys are formatted
/// as stable, lexicographically sortable strings so results from the
/// six analytics queries can be merged without re-parsing timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bucket {
    Minute,
    Hour,
}

impl Bucket {
    pub fn key_format(self) -> &'static str {
        match self {
            Bucket::Minute => "%Y-%m-%d %H:%M:00",
            Bucket::Hour => "%Y-%m-%d %H:00:00",
        }
    }

    pub fn step_sql(self) -> &'static str {
        match self {
            Bucket::Minute => "INTERVAL 1 MINUTE",
            Bucket::Hour => "INTERVAL 1 HOUR",
        }
    }

    pub fn trunc_unit(self) -> &'static str {
        match self {
            Bucket::Minute => "minute",
            Bucket::Hour => "hour",
        }
    }

    pub fn step(self) -> Duration {
        match self {
            Bucket::Minute => Duration::minutes(1),
            Bucket::Hour => Duration::hours(1),
        }
    }
}

/// The fixed catalog of selectable analytics windows. Bounded windows
/// look back from now; `All` is unbounded and uses the coarser bucket
/// to keep result cardinality in check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeWindowKey {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
    All,
}

impl TimeWindowKey {
    pub const ALL: [TimeWindowKey; 5] = [
        TimeWindowKey::LastHour,
        TimeWindowKey::LastDay,
        TimeWindowKey::LastWeek,
        TimeWindowKey::LastMonth,
        TimeWindowKey::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TimeWindowKey::LastHour => "1h",
            TimeWindowKey::LastDay => "24h",
            TimeWindowKey::LastWeek => "7d",
            TimeWindowKey::LastMonth => "30d",
            TimeWindowKey::All => "all",
        }
    }

    pub fn lookback(self) -> Option<Duration> {
        match self {
            TimeWindowKey::LastHour => Some(Duration::hours(1)),
            TimeWindowKey::LastDay => Some(Duration::hours(24)),
            TimeWindowKey::LastWeek => Some(Duration::days(7)),
            TimeWindowKey::LastMonth => Some(Duration::days(30)),
            TimeWindowKey::All => None,
        }
    }

    pub fn bucket(self) -> Bucket {
        match self {
            TimeWindowKey::LastHour | TimeWindowKey::LastDay => Bucket::Minute,
            _ => Bucket::Hour,
        }
    }
}

impl fmt::Display for TimeWindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeWindowKey {
    type Err = TracedeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1h" => Ok(Self::LastHour),
            "24h" => Ok(Self::LastDay),
            "7d" => Ok(Self::LastWeek),
            "30d" => Ok(Self::LastMonth),
            "all" => Ok(Self::All),
            _ => Err(TracedeckError::Parse(format!("unknown window: {s}"))),
        }
    }
}
