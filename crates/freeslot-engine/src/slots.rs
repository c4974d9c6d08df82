//! Compute free time slots inside one day's working window.
//!
//! Starts from the whole window and subtracts each (buffer-padded) busy interval
//! in turn. Each subtraction produces a fresh slot list; slots never grow, so
//! every result stays inside the window it started from.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::{BufferMinutes, WorkingHours};
use crate::dst::{resolve_local, DstPolicy};
use crate::expander::BusyInterval;

/// The working-hours span of one calendar day, as absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WorkWindow {
    /// Place `hours` on `date` in `tz`.
    ///
    /// Returns `None` when a boundary falls into a DST gap and `policy` is
    /// [`DstPolicy::Skip`], or when DST collapses the window to nothing.
    pub fn for_date(date: NaiveDate, hours: WorkingHours, tz: Tz, policy: DstPolicy) -> Option<Self> {
        let start_local = date.and_hms_opt(hours.start_hour(), 0, 0)?;
        let end_local = if hours.end_hour() == 24 {
            date.succ_opt()?.and_time(NaiveTime::MIN)
        } else {
            date.and_hms_opt(hours.end_hour(), 0, 0)?
        };

        let start = resolve_local(tz, start_local, policy)?;
        let end = resolve_local(tz, end_local, policy)?;
        (start < end).then_some(Self { date, start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// A free time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FreeSlot {
    /// Returns `None` for empty or inverted spans.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then(|| Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        })
    }

    fn whole(window: &WorkWindow) -> Option<Self> {
        Self::new(window.start, window.end)
    }
}

/// Remove one busy interval, widened by `buffer` on both sides, from `slots`.
///
/// Slots the padded interval doesn't touch are kept as they are. Overlapped
/// slots keep only their parts before and after it; empty remnants are dropped.
pub fn subtract_busy(slots: Vec<FreeSlot>, busy: &BusyInterval, buffer: BufferMinutes) -> Vec<FreeSlot> {
    let (busy_start, busy_end) = busy.padded(buffer.as_duration());

    let mut remaining = Vec::with_capacity(slots.len() + 1);
    for slot in slots {
        if busy_start >= slot.end || busy_end <= slot.start {
            remaining.push(slot);
            continue;
        }
        if busy_start > slot.start {
            remaining.extend(FreeSlot::new(slot.start, busy_start));
        }
        if busy_end < slot.end {
            remaining.extend(FreeSlot::new(busy_end, slot.end));
        }
    }
    remaining
}

/// Find the free slots in `window` after removing every busy interval.
///
/// `busy` may be unsorted and overlapping; intervals nowhere near the window
/// are harmless. Returns slots sorted by start time.
pub fn find_free_slots(window: &WorkWindow, busy: &[BusyInterval], buffer: BufferMinutes) -> Vec<FreeSlot> {
    let initial: Vec<FreeSlot> = FreeSlot::whole(window).into_iter().collect();
    let mut slots = busy
        .iter()
        .fold(initial, |slots, interval| subtract_busy(slots, interval, buffer));
    slots.sort_by_key(|slot| (slot.start, slot.end));
    slots
}

/// Sum of slot durations, in minutes.
pub fn total_free_minutes(slots: &[FreeSlot]) -> i64 {
    slots.iter().map(|slot| slot.duration_minutes).sum()
}
