//! DST transition policies for wall-clock times.
//!
//! Working-hour boundaries and floating event times are written in local wall
//! clock. Around a DST transition a wall-clock time can be ambiguous (fall back)
//! or nonexistent (spring forward); this module decides which absolute instant
//! such a time maps to.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Longest DST gap we probe through. Real-world gaps are one hour or less.
pub(crate) const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Policy for local times that fall inside a DST gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DstPolicy {
    /// Use the first valid instant after the gap (e.g. 02:30 becomes 03:00
    /// during a spring-forward transition).
    #[default]
    ShiftForward,
    /// Treat the time as unresolvable. A working day whose window boundary
    /// falls into the gap gets no window at all.
    Skip,
}

impl std::str::FromStr for DstPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shift-forward" | "shift_forward" | "shift" => Ok(DstPolicy::ShiftForward),
            "skip" => Ok(DstPolicy::Skip),
            other => Err(format!(
                "unknown DST policy '{}' (expected shift-forward or skip)",
                other
            )),
        }
    }
}

/// Resolve a wall-clock time in `tz` to an absolute UTC instant.
///
/// Ambiguous times (the repeated hour when clocks fall back) resolve to the
/// earliest instant. Nonexistent times are handled per `policy`; `None` is only
/// returned for [`DstPolicy::Skip`].
pub fn resolve_local(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => first_valid_after(tz, local),
        },
    }
}

fn first_valid_after(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (1..=MAX_GAP_MINUTES).find_map(|minutes| {
        tz.from_local_datetime(&(local + Duration::minutes(minutes)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
