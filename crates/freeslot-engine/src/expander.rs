//! Event expansion -- turns a parsed feed into concrete busy intervals.
//!
//! Recurring events are expanded with the `rrule` crate on the event's wall
//! clock; every resulting occurrence is then placed in the event's zone and
//! normalized to UTC so that it can be compared directly against working-hour
//! windows built in any zone.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dst::DstPolicy;
use crate::error::{FreeSlotError, Result};
use crate::feed::{EventTime, Feed, FeedEvent};
use crate::zone::EventZone;

/// Most occurrences a single rule may produce inside one window.
const MAX_OCCURRENCES: u16 = u16::MAX;

/// One occupied period, normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Returns `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The interval widened by `buffer` on both sides.
    pub fn padded(&self, buffer: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start - buffer, self.end + buffer)
    }

    pub fn intersects(&self, window: &TimeWindow) -> bool {
        self.start < window.end && self.end > window.start
    }
}

/// A half-open span of time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Expands a feed's events, recurring or not, into the busy intervals that
/// intersect a window.
///
/// Implementations must return every interval that overlaps `window` in full
/// (callers clip), and nothing that lies entirely outside it.
pub trait RecurrenceExpander {
    fn expand(&self, feed: &Feed, window: TimeWindow) -> Result<Vec<BusyInterval>>;
}

/// [`RecurrenceExpander`] backed by the `rrule` crate.
#[derive(Debug, Clone, Copy)]
pub struct RRuleExpander {
    floating_zone: Tz,
}

impl RRuleExpander {
    /// `floating_zone` is where all-day dates and floating times are read when
    /// the feed declares no `X-WR-TIMEZONE`.
    pub fn new(floating_zone: Tz) -> Self {
        Self { floating_zone }
    }
}

impl Default for RRuleExpander {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

impl RecurrenceExpander for RRuleExpander {
    fn expand(&self, feed: &Feed, window: TimeWindow) -> Result<Vec<BusyInterval>> {
        if window.start >= window.end {
            return Ok(Vec::new());
        }
        let zone = feed.default_zone().unwrap_or(self.floating_zone);

        // Occurrences replaced by a RECURRENCE-ID override, cancelled ones included.
        let mut overridden: HashSet<(&str, DateTime<Utc>)> = HashSet::new();
        for event in feed.events() {
            if let Some(rid) = &event.recurrence_id {
                overridden.insert((event.uid.as_str(), rid.to_utc(zone)?));
            }
        }

        let mut busy = Vec::new();
        for event in feed.events() {
            if !event.is_busy() {
                debug!(
                    uid = %event.uid,
                    summary = %event.summary,
                    status = ?event.status,
                    "skipping free event"
                );
                continue;
            }
            if event.is_recurring() {
                expand_recurring(event, zone, window, &overridden, &mut busy)?;
            } else if let Some(interval) = single_interval(event, zone)? {
                if interval.intersects(&window) {
                    busy.push(interval);
                }
            }
        }

        debug!(
            intervals = busy.len(),
            window_start = %window.start,
            window_end = %window.end,
            "expanded feed"
        );
        Ok(busy)
    }
}

/// Expand with the default expander. Dates and floating times are read in
/// `floating_zone` unless the feed declares its own.
pub fn expand_feed(feed: &Feed, window: TimeWindow, floating_zone: Tz) -> Result<Vec<BusyInterval>> {
    RRuleExpander::new(floating_zone).expand(feed, window)
}

fn single_interval(event: &FeedEvent, zone: Tz) -> Result<Option<BusyInterval>> {
    let start = event.start.to_utc(zone)?;
    let end = event.end.to_utc(zone)?;
    let interval = BusyInterval::new(start, end);
    if interval.is_none() {
        debug!(uid = %event.uid, summary = %event.summary, "skipping event with no duration");
    }
    Ok(interval)
}

fn expand_recurring(
    event: &FeedEvent,
    zone: Tz,
    window: TimeWindow,
    overridden: &HashSet<(&str, DateTime<Utc>)>,
    busy: &mut Vec<BusyInterval>,
) -> Result<()> {
    let master_start = event.start.to_utc(zone)?;
    let master_end = event.end.to_utc(zone)?;
    let span = master_end - master_start;
    if span <= Duration::zero() {
        debug!(
            uid = %event.uid,
            summary = %event.summary,
            "skipping recurring event with no duration"
        );
        return Ok(());
    }
    let event_zone = event.start.zone(zone);

    let mut starts = vec![master_start];
    if let Some(rule) = &event.rrule {
        starts.extend(rule_occurrences(event, rule, event_zone.as_ref(), master_start, span, window)?);
    }
    for rdate in &event.rdates {
        starts.push(rdate.to_utc(zone)?);
    }
    starts.sort();
    starts.dedup();

    let day_span = match (&event.start, &event.end) {
        (EventTime::Date(s), EventTime::Date(e)) => Some(*e - *s),
        _ => None,
    };

    for start in starts {
        if is_excluded(event, start, event_zone.as_ref(), zone)? {
            continue;
        }
        if overridden.contains(&(event.uid.as_str(), start)) {
            continue;
        }
        let end = match (day_span, &event_zone) {
            // All-day occurrences end at local midnight, whatever DST did.
            (Some(days), Some(ez)) => {
                let local_date = ez.to_local(start).date() + days;
                ez.resolve(local_date.and_time(NaiveTime::MIN), DstPolicy::ShiftForward)
                    .unwrap_or(start + span)
            }
            _ => start + span,
        };
        if let Some(interval) = BusyInterval::new(start, end) {
            if interval.intersects(&window) {
                busy.push(interval);
            }
        }
    }
    Ok(())
}

/// Wall-clock reading of `instant` in `zone`; UTC when the event has no zone.
fn wall_clock(zone: Option<&EventZone>, instant: DateTime<Utc>) -> NaiveDateTime {
    match zone {
        Some(zone) => zone.to_local(instant),
        None => instant.naive_utc(),
    }
}

/// Occurrence starts of `rule` that can overlap `window`.
///
/// The rule runs on the event's wall clock, written as UTC for the `rrule`
/// crate, so a DTSTART inside a DST gap is still a valid rule start. Each
/// wall-clock occurrence is then placed in the event's zone, moving past a gap
/// the same way DTSTART does.
fn rule_occurrences(
    event: &FeedEvent,
    rule: &str,
    event_zone: Option<&EventZone>,
    master_start: DateTime<Utc>,
    span: Duration,
    window: TimeWindow,
) -> Result<Vec<DateTime<Utc>>> {
    let (rule, until) = normalize_until(rule, event_zone, &event.uid)?;
    if until.is_some_and(|until| until < master_start) {
        return Ok(Vec::new());
    }

    let dtstart = format!("DTSTART:{}Z", event.start.local().format("%Y%m%dT%H%M%S"));
    let rrule_set: RRuleSet = format!("{}\nRRULE:{}", dtstart, rule)
        .parse()
        .map_err(|e| {
            FreeSlotError::Parse(format!("event '{}' has invalid RRULE: {}", event.uid, e))
        })?;

    // Occurrences starting up to one span before the window can still reach into
    // it. A day either side covers any offset between wall clock and UTC.
    let tz: rrule::Tz = Utc.into();
    let after = (wall_clock(event_zone, window.start - span) - Duration::days(1))
        .and_utc()
        .with_timezone(&tz);
    let before = (wall_clock(event_zone, window.end) + Duration::days(1))
        .and_utc()
        .with_timezone(&tz);
    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);
    if result.limited {
        warn!(
            uid = %event.uid,
            limit = MAX_OCCURRENCES,
            "recurrence expansion hit the occurrence cap"
        );
    }

    let mut starts = Vec::with_capacity(result.dates.len());
    for occurrence in result.dates {
        let local = occurrence.naive_utc();
        match event_zone {
            None => starts.push(local.and_utc()),
            Some(zone) => match zone.resolve(local, DstPolicy::ShiftForward) {
                Some(start) => starts.push(start),
                None => debug!(
                    uid = %event.uid,
                    %local,
                    zone = zone.name(),
                    "dropping occurrence that does not exist"
                ),
            },
        }
    }
    Ok(starts)
}

/// Rewrite `UNTIL` on the rule's wall clock.
///
/// Feeds write UNTIL as UTC, local time, or a bare date. The instant is
/// resolved first, then written back as the event's wall-clock time with a `Z`
/// suffix to match the rule's DTSTART. Returns the rule and its `UNTIL`
/// instant, if any.
fn normalize_until(
    rule: &str,
    event_zone: Option<&EventZone>,
    uid: &str,
) -> Result<(String, Option<DateTime<Utc>>)> {
    let mut until = None;
    let mut parts = Vec::new();

    for part in rule.trim().trim_end_matches(';').split(';') {
        let Some((key, value)) = part.split_once('=') else {
            parts.push(part.to_string());
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("UNTIL") {
            parts.push(part.to_string());
            continue;
        }

        let instant = parse_until(value.trim(), event_zone).ok_or_else(|| {
            FreeSlotError::Parse(format!("event '{}' has malformed UNTIL '{}'", uid, value))
        })?;
        parts.push(format!(
            "UNTIL={}",
            wall_clock(event_zone, instant).format("%Y%m%dT%H%M%SZ")
        ));
        until = Some(instant);
    }

    Ok((parts.join(";"), until))
}

fn parse_until(value: &str, event_zone: Option<&EventZone>) -> Option<DateTime<Utc>> {
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| dt.and_utc());
    }
    let local = if value.len() == 8 {
        // A date UNTIL includes the whole day.
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        date.and_hms_opt(23, 59, 59)?
    } else {
        NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?
    };
    match event_zone {
        None => Some(local.and_utc()),
        Some(zone) => zone.resolve(local, DstPolicy::ShiftForward),
    }
}

/// Whether an EXDATE removes the occurrence starting at `start`.
///
/// Date-valued EXDATEs remove any occurrence on that local date; the rest must
/// match the occurrence instant exactly.
fn is_excluded(
    event: &FeedEvent,
    start: DateTime<Utc>,
    event_zone: Option<&EventZone>,
    zone: Tz,
) -> Result<bool> {
    for exdate in &event.exdates {
        let hit = match exdate {
            EventTime::Date(date) => wall_clock(event_zone, start).date() == *date,
            other => other.to_utc(zone)? == start,
        };
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}
