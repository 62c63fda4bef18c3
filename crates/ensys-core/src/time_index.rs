//! Uniformly spaced timestamp sequences.
//!
//! A [`TimeIndex`] is derived from a start instant, a period count and a
//! [`Frequency`]. It remembers those three inputs so it can be serialized
//! compactly and re-derived exactly.

use crate::error::{EnsysError, EnsysResult, Stage};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on the number of timestamps in one index.
pub const MAX_PERIODS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl FrequencyUnit {
    fn seconds(&self) -> i64 {
        match self {
            FrequencyUnit::Second => 1,
            FrequencyUnit::Minute => 60,
            FrequencyUnit::Hour => 3_600,
            FrequencyUnit::Day => 86_400,
            FrequencyUnit::Week => 604_800,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            FrequencyUnit::Second => "s",
            FrequencyUnit::Minute => "min",
            FrequencyUnit::Hour => "h",
            FrequencyUnit::Day => "d",
            FrequencyUnit::Week => "w",
        }
    }
}

/// Spacing between consecutive timestamps, e.g. `h`, `15min`, `2d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    pub count: u32,
    pub unit: FrequencyUnit,
}

impl Frequency {
    pub const HOURLY: Frequency = Frequency {
        count: 1,
        unit: FrequencyUnit::Hour,
    };

    /// Parse `<count><unit>` where the count is optional.
    ///
    /// Calendar units (months, years) are rejected because their length varies.
    pub fn parse(freq: &str) -> EnsysResult<Self> {
        let trimmed = freq.trim();
        if trimmed.is_empty() {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                "frequency cannot be empty",
            ));
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count_str, unit_str) = trimmed.split_at(split);

        let count = if count_str.is_empty() {
            1
        } else {
            count_str.parse::<u32>().map_err(|_| {
                EnsysError::config(
                    Stage::TimeIndex,
                    format!("invalid frequency multiplier in '{}'", trimmed),
                )
            })?
        };
        if count == 0 {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                format!("frequency '{}' has a zero multiplier", trimmed),
            ));
        }

        let unit = match unit_str.to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => FrequencyUnit::Second,
            "min" | "t" | "minute" | "minutes" => FrequencyUnit::Minute,
            "h" | "hour" | "hours" | "hourly" => FrequencyUnit::Hour,
            "d" | "day" | "days" | "daily" => FrequencyUnit::Day,
            "w" | "week" | "weeks" | "weekly" => FrequencyUnit::Week,
            "m" | "ms" | "me" | "month" | "months" | "monthly" | "q" | "qs" | "y" | "ys"
            | "a" | "year" | "years" | "yearly" => {
                return Err(EnsysError::config(
                    Stage::TimeIndex,
                    format!(
                        "frequency '{}' is a calendar unit without constant spacing",
                        trimmed
                    ),
                ));
            }
            "" => {
                return Err(EnsysError::config(
                    Stage::TimeIndex,
                    format!("frequency '{}' has no unit", trimmed),
                ));
            }
            other => {
                return Err(EnsysError::config(
                    Stage::TimeIndex,
                    format!(
                        "unrecognized frequency unit '{}'; expected s/min/h/d/w",
                        other
                    ),
                ));
            }
        };

        Ok(Frequency { count, unit })
    }

    /// Step between two consecutive timestamps.
    pub fn step(&self) -> EnsysResult<TimeDelta> {
        let seconds = i64::from(self.count) * self.unit.seconds();
        TimeDelta::try_seconds(seconds).ok_or_else(|| {
            EnsysError::config(
                Stage::TimeIndex,
                format!("frequency '{}' is out of range", self),
            )
        })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for Frequency {
    type Err = EnsysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::parse(s)
    }
}

impl TryFrom<String> for Frequency {
    type Error = EnsysError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Frequency::parse(&value)
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}

/// Parse a start instant given as a date or a naive date-time.
pub fn parse_start(start: &str) -> EnsysResult<NaiveDateTime> {
    let trimmed = start.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(EnsysError::config(
        Stage::TimeIndex,
        format!(
            "cannot parse start instant '{}'; expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]",
            trimmed
        ),
    ))
}

/// Ordered, strictly increasing, uniformly spaced timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimeIndexRepr", into = "TimeIndexRepr")]
pub struct TimeIndex {
    start: NaiveDateTime,
    freq: Frequency,
    stamps: Vec<NaiveDateTime>,
}

#[derive(Serialize, Deserialize)]
struct TimeIndexRepr {
    start: NaiveDateTime,
    periods: usize,
    freq: Frequency,
}

impl TryFrom<TimeIndexRepr> for TimeIndex {
    type Error = EnsysError;

    fn try_from(repr: TimeIndexRepr) -> Result<Self, Self::Error> {
        TimeIndex::new(repr.start, repr.periods, repr.freq)
    }
}

impl From<TimeIndex> for TimeIndexRepr {
    fn from(index: TimeIndex) -> Self {
        TimeIndexRepr {
            start: index.start,
            periods: index.stamps.len(),
            freq: index.freq,
        }
    }
}

impl TimeIndex {
    pub fn new(start: NaiveDateTime, periods: usize, freq: Frequency) -> EnsysResult<Self> {
        if periods == 0 {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                "period count must be positive",
            ));
        }
        if periods > MAX_PERIODS {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                format!("period count {} exceeds the limit of {}", periods, MAX_PERIODS),
            ));
        }
        let step = freq.step()?;
        // Check the last stamp before allocating anything.
        let span = i32::try_from(periods - 1)
            .ok()
            .and_then(|n| step.checked_mul(n))
            .and_then(|span| start.checked_add_signed(span));
        if span.is_none() {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                format!("{} periods of {} from {} overflow the calendar", periods, freq, start),
            ));
        }
        let mut stamps = Vec::with_capacity(periods);
        let mut current = start;
        for i in 0..periods {
            if i > 0 {
                current = current.checked_add_signed(step).ok_or_else(|| {
                    EnsysError::config(
                        Stage::TimeIndex,
                        format!("timestamp {} overflows the calendar", i),
                    )
                })?;
            }
            stamps.push(current);
        }
        Ok(TimeIndex {
            start,
            freq,
            stamps,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    /// Number of periods. Never zero.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.stamps
    }

    pub fn get(&self, t: usize) -> Option<NaiveDateTime> {
        self.stamps.get(t).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.stamps.iter()
    }
}

/// Builder mirroring the `(start, periods, freq)` configuration triple.
#[derive(Debug, Clone)]
pub struct TimeIndexBuilder {
    start: String,
    periods: i64,
    freq: String,
}

impl TimeIndexBuilder {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            periods: 1,
            freq: "h".to_string(),
        }
    }

    pub fn periods(mut self, periods: i64) -> Self {
        self.periods = periods;
        self
    }

    pub fn freq(mut self, freq: impl Into<String>) -> Self {
        self.freq = freq.into();
        self
    }

    pub fn build(self) -> EnsysResult<TimeIndex> {
        if self.periods <= 0 {
            return Err(EnsysError::config(
                Stage::TimeIndex,
                format!("period count must be positive, got {}", self.periods),
            ));
        }
        let periods = usize::try_from(self.periods).map_err(|_| {
            EnsysError::config(
                Stage::TimeIndex,
                format!("period count {} is too large", self.periods),
            )
        })?;
        let start = parse_start(&self.start)?;
        let freq = Frequency::parse(&self.freq)?;
        let index = TimeIndex::new(start, periods, freq)?;
        tracing::debug!(
            start = %index.start(),
            periods = index.len(),
            freq = %index.freq(),
            "built time index"
        );
        Ok(index)
    }
}
