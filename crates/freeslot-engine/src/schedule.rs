//! Free time across a whole date range.
//!
//! The feed is expanded once over the entire (buffer-padded) range, then each
//! day's working window is computed independently against that one set of busy
//! intervals. Any error aborts the whole range; there are no partial reports.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::{DisplayZone, SlotRequest};
use crate::error::Result;
use crate::expander::{BusyInterval, RRuleExpander, RecurrenceExpander, TimeWindow};
use crate::feed::Feed;
use crate::slots::{self, FreeSlot, WorkWindow};

/// Free slots per day for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreeTimeReport {
    pub zone: DisplayZone,
    /// Every date of the requested range, in order. A fully booked day (or one
    /// skipped by the DST policy) maps to an empty list.
    pub days: BTreeMap<NaiveDate, Vec<FreeSlot>>,
}

impl FreeTimeReport {
    pub fn slots_on(&self, date: NaiveDate) -> Option<&[FreeSlot]> {
        self.days.get(&date).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Vec<FreeSlot>)> {
        self.days.iter()
    }

    pub fn total_free_minutes(&self) -> i64 {
        self.days.values().map(|slots| slots::total_free_minutes(slots)).sum()
    }

    /// True when no day in the range has any free time.
    pub fn is_fully_booked(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }
}

/// Compute free time for `request` using the `rrule`-backed expander.
pub fn compute_free_time(feed: &Feed, request: &SlotRequest) -> Result<FreeTimeReport> {
    let expander = RRuleExpander::new(request.zone.tz());
    compute_free_time_with(&expander, feed, request)
}

/// Parse raw feed bytes and compute free time in one call.
pub fn compute_free_time_from_bytes(bytes: &[u8], request: &SlotRequest) -> Result<FreeTimeReport> {
    let feed = Feed::parse(bytes)?;
    compute_free_time(&feed, request)
}

/// Compute free time with a caller-supplied recurrence expander.
pub fn compute_free_time_with<E>(
    expander: &E,
    feed: &Feed,
    request: &SlotRequest,
) -> Result<FreeTimeReport>
where
    E: RecurrenceExpander + ?Sized,
{
    let tz = request.zone.tz();
    let windows: Vec<(NaiveDate, Option<WorkWindow>)> = request
        .range
        .days()
        .map(|date| {
            (
                date,
                WorkWindow::for_date(date, request.hours, tz, request.dst_policy),
            )
        })
        .collect();

    let busy = match expansion_window(&windows, request) {
        Some(window) => expander.expand(feed, window)?,
        None => Vec::new(),
    };

    let buffer = request.buffer.as_duration();
    let mut days = BTreeMap::new();
    for (date, window) in windows {
        let free = match window {
            Some(window) => {
                let day_busy: Vec<BusyInterval> = busy
                    .iter()
                    .filter(|interval| {
                        let (start, end) = interval.padded(buffer);
                        start < window.end && end > window.start
                    })
                    .copied()
                    .collect();
                slots::find_free_slots(&window, &day_busy, request.buffer)
            }
            None => {
                debug!(%date, "no working window on this day");
                Vec::new()
            }
        };
        days.insert(date, free);
    }

    Ok(FreeTimeReport {
        zone: request.zone,
        days,
    })
}

/// The span that covers every working window, widened by the buffer so that
/// events just outside working hours still push their padding inside.
fn expansion_window(
    windows: &[(NaiveDate, Option<WorkWindow>)],
    request: &SlotRequest,
) -> Option<TimeWindow> {
    let buffer = request.buffer.as_duration();
    let start = windows.iter().filter_map(|(_, w)| w.map(|w| w.start)).min()?;
    let end = windows.iter().filter_map(|(_, w)| w.map(|w| w.end)).max()?;
    Some(TimeWindow::new(start - buffer, end + buffer))
}
