//! Request configuration: working hours, buffer, date range, display zone.
//!
//! Every type here validates on construction, so a [`SlotRequest`] that exists is
//! a request that can be computed. Bad input surfaces as
//! [`FreeSlotError::InvalidConfiguration`] before any feed is touched.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::error::{FreeSlotError, Result};

/// Longest date range a single request may cover, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Daily working hours as whole hours, `start_hour` inclusive, `end_hour`
/// exclusive. An `end_hour` of 24 means the following midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkingHours {
    start_hour: u32,
    end_hour: u32,
}

impl WorkingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if start_hour > 23 {
            return Err(FreeSlotError::config(
                "working_hours",
                format!("start hour {} must be between 0 and 23", start_hour),
            ));
        }
        if end_hour > 24 {
            return Err(FreeSlotError::config(
                "working_hours",
                format!("end hour {} must be between 1 and 24", end_hour),
            ));
        }
        if start_hour >= end_hour {
            return Err(FreeSlotError::config(
                "working_hours",
                format!(
                    "start hour {} must be before end hour {}",
                    start_hour, end_hour
                ),
            ));
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }
}

impl Default for WorkingHours {
    /// 9 AM to 5 PM.
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

/// Padding applied before and after every busy interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BufferMinutes(u32);

impl BufferMinutes {
    /// The permitted buffer values, in minutes.
    pub const ALLOWED: [u32; 5] = [0, 15, 30, 45, 60];

    pub fn new(minutes: u32) -> Result<Self> {
        if Self::ALLOWED.contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(FreeSlotError::config(
                "buffer",
                format!("{} minutes is not one of 0, 15, 30, 45, 60", minutes),
            ))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl TryFrom<u32> for BufferMinutes {
    type Error = FreeSlotError;

    fn try_from(minutes: u32) -> Result<Self> {
        Self::new(minutes)
    }
}

impl From<BufferMinutes> for u32 {
    fn from(buffer: BufferMinutes) -> u32 {
        buffer.0
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FreeSlotError::config(
                "date_range",
                format!("start date {} is after end date {}", start, end),
            ));
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(FreeSlotError::config(
                "date_range",
                format!(
                    "{} days requested, at most {} allowed",
                    days, MAX_RANGE_DAYS
                ),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings into a range.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// A single-day range.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        FreeSlotError::config(
            "date_range",
            format!("invalid date '{}', expected YYYY-MM-DD", s),
        )
    })
}

/// The zones a report can be laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayZone {
    #[default]
    Eastern,
    Central,
    Mountain,
    Pacific,
    Utc,
}

impl DisplayZone {
    pub const ALL: [DisplayZone; 5] = [
        DisplayZone::Eastern,
        DisplayZone::Central,
        DisplayZone::Mountain,
        DisplayZone::Pacific,
        DisplayZone::Utc,
    ];

    pub fn tz(self) -> Tz {
        match self {
            DisplayZone::Eastern => chrono_tz::America::New_York,
            DisplayZone::Central => chrono_tz::America::Chicago,
            DisplayZone::Mountain => chrono_tz::America::Denver,
            DisplayZone::Pacific => chrono_tz::America::Los_Angeles,
            DisplayZone::Utc => chrono_tz::UTC,
        }
    }

    /// Short label used after a line of times, e.g. `ET`.
    pub fn abbreviation(self) -> &'static str {
        match self {
            DisplayZone::Eastern => "ET",
            DisplayZone::Central => "CT",
            DisplayZone::Mountain => "MT",
            DisplayZone::Pacific => "PT",
            DisplayZone::Utc => "UTC",
        }
    }

    fn name(self) -> &'static str {
        match self {
            DisplayZone::Eastern => "eastern",
            DisplayZone::Central => "central",
            DisplayZone::Mountain => "mountain",
            DisplayZone::Pacific => "pacific",
            DisplayZone::Utc => "utc",
        }
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayZone {
    type Err = FreeSlotError;

    /// Accepts the zone name (`eastern`), its abbreviation (`ET`), or the IANA
    /// identifier it maps to (`America/New_York`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        DisplayZone::ALL
            .into_iter()
            .find(|zone| {
                zone.name() == wanted
                    || zone.abbreviation().to_ascii_lowercase() == wanted
                    || zone.tz().name().to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| {
                FreeSlotError::config(
                    "timezone",
                    format!(
                        "unknown zone '{}' (expected eastern, central, mountain, pacific or utc)",
                        s
                    ),
                )
            })
    }
}

/// Everything the engine needs besides the feed itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotRequest {
    pub range: DateRange,
    pub hours: WorkingHours,
    pub buffer: BufferMinutes,
    pub zone: DisplayZone,
    pub dst_policy: DstPolicy,
}

impl SlotRequest {
    /// A request over `range` with default hours (9-17), no buffer, Eastern time.
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            hours: WorkingHours::default(),
            buffer: BufferMinutes::default(),
            zone: DisplayZone::default(),
            dst_policy: DstPolicy::default(),
        }
    }

    /// Validate raw user input field by field. The first invalid field is
    /// reported; nothing is computed.
    pub fn from_raw(
        start_date: &str,
        end_date: &str,
        start_hour: u32,
        end_hour: u32,
        buffer_minutes: u32,
        zone: &str,
    ) -> Result<Self> {
        Ok(Self {
            range: DateRange::parse(start_date, end_date)?,
            hours: WorkingHours::new(start_hour, end_hour)?,
            buffer: BufferMinutes::new(buffer_minutes)?,
            zone: zone.parse()?,
            dst_policy: DstPolicy::default(),
        })
    }

    pub fn with_hours(mut self, hours: WorkingHours) -> Self {
        self.hours = hours;
        self
    }

    pub fn with_buffer(mut self, buffer: BufferMinutes) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_dst_policy(mut self, dst_policy: DstPolicy) -> Self {
        self.dst_policy = dst_policy;
        self
    }
}
