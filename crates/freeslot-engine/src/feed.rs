//! ICS feed parsing.
//!
//! A feed is parsed exactly once per request into a [`Feed`] and then expanded
//! against as many windows as the caller needs. Only the properties that affect
//! free/busy time are kept: start/end, recurrence, status and transparency.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold, Component, Property};
use tracing::debug;

use crate::dst::DstPolicy;
use crate::error::{FreeSlotError, Result};
pub use crate::zone::resolve_tzid;
use crate::zone::{EventZone, FeedZones};

/// A point in time as written in the feed, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// An all-day date (`VALUE=DATE`).
    Date(NaiveDate),
    /// A UTC timestamp (`...Z`).
    Utc(DateTime<Utc>),
    /// A wall-clock time with no zone attached.
    Floating(NaiveDateTime),
    /// A wall-clock time in a named or feed-defined zone (`TZID=...`).
    Zoned { local: NaiveDateTime, zone: EventZone },
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// The zone this time is read in. `floating` applies to dates and floating
    /// times; `None` means the time is already UTC.
    pub fn zone(&self, floating: Tz) -> Option<EventZone> {
        match self {
            EventTime::Utc(_) => None,
            EventTime::Zoned { zone, .. } => Some(zone.clone()),
            EventTime::Date(_) | EventTime::Floating(_) => Some(EventZone::Named(floating)),
        }
    }

    /// Wall-clock reading of this time. Dates read as midnight.
    pub fn local(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN),
            EventTime::Utc(dt) => dt.naive_utc(),
            EventTime::Floating(local) => *local,
            EventTime::Zoned { local, .. } => *local,
        }
    }

    /// Normalize to an absolute instant. Dates and floating times are read in
    /// `floating`; nonexistent wall-clock times move past the DST gap.
    pub fn to_utc(&self, floating: Tz) -> Result<DateTime<Utc>> {
        match self.zone(floating) {
            None => Ok(self.local().and_utc()),
            Some(zone) => zone.resolve(self.local(), DstPolicy::ShiftForward).ok_or_else(|| {
                FreeSlotError::Parse(format!(
                    "local time {} does not exist in {}",
                    self.local(),
                    zone.name()
                ))
            }),
        }
    }

    /// The same kind of time shifted by `delta`. Dates stay dates when the
    /// shift is a whole number of days.
    fn shifted(&self, delta: Duration) -> EventTime {
        match self {
            EventTime::Date(d) if delta.num_seconds() % 86_400 == 0 => {
                EventTime::Date(*d + Duration::days(delta.num_days()))
            }
            EventTime::Date(d) => EventTime::Floating(d.and_time(chrono::NaiveTime::MIN) + delta),
            EventTime::Utc(dt) => EventTime::Utc(*dt + delta),
            EventTime::Floating(local) => EventTime::Floating(*local + delta),
            EventTime::Zoned { local, zone } => EventTime::Zoned {
                local: *local + delta,
                zone: zone.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

/// One VEVENT, reduced to what matters for free/busy.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub uid: String,
    pub summary: String,
    pub start: EventTime,
    /// Resolved from DTEND, DURATION, or the RFC 5545 defaults.
    pub end: EventTime,
    pub rrule: Option<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
    pub recurrence_id: Option<EventTime>,
    pub status: EventStatus,
    pub transparent: bool,
}

impl FeedEvent {
    /// Whether this event occupies time. Cancelled and transparent events don't.
    pub fn is_busy(&self) -> bool {
        self.status != EventStatus::Cancelled && !self.transparent
    }

    /// A recurring master (has a rule, and is not itself an override).
    pub fn is_recurring(&self) -> bool {
        self.recurrence_id.is_none() && (self.rrule.is_some() || !self.rdates.is_empty())
    }
}

/// A parsed calendar feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    events: Vec<FeedEvent>,
    default_zone: Option<Tz>,
}

impl Feed {
    /// Parse raw feed bytes.
    ///
    /// # Errors
    /// Returns [`FreeSlotError::Parse`] when the bytes are not UTF-8, the content
    /// is not a VCALENDAR, or any VEVENT carries an unreadable date or zone.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| FreeSlotError::Parse(format!("feed is not valid UTF-8: {}", e)))?;
        Self::from_ics(content)
    }

    /// Parse ICS text.
    pub fn from_ics(content: &str) -> Result<Self> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let unfolded = unfold(content);

        let begins_calendar = unfolded
            .trim_start()
            .get(..15)
            .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
        if !begins_calendar {
            return Err(FreeSlotError::Parse(
                "content does not start with BEGIN:VCALENDAR".to_string(),
            ));
        }

        let calendar = read_calendar(&unfolded).map_err(|e| FreeSlotError::Parse(e.to_string()))?;

        let default_zone = match calendar.properties.iter().find(|p| p.name == "X-WR-TIMEZONE") {
            Some(prop) => Some(resolve_tzid(prop.val.as_ref()).ok_or_else(|| {
                FreeSlotError::Parse(format!("unknown X-WR-TIMEZONE '{}'", prop.val.as_ref()))
            })?),
            None => None,
        };

        let zones = FeedZones::from_components(&calendar.components);
        let events = calendar
            .components
            .iter()
            .filter(|c| c.name == "VEVENT")
            .map(|vevent| parse_event(vevent, &zones))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            events = events.len(),
            defined_zones = zones.len(),
            zone = default_zone.map(|tz| tz.name()),
            "parsed calendar feed"
        );

        Ok(Self {
            events,
            default_zone,
        })
    }

    pub fn events(&self) -> &[FeedEvent] {
        &self.events
    }

    /// The calendar-wide zone declared with `X-WR-TIMEZONE`, if any.
    pub fn default_zone(&self) -> Option<Tz> {
        self.default_zone
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn parse_event(vevent: &Component, zones: &FeedZones) -> Result<FeedEvent> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .unwrap_or_default();
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());

    let start_prop = vevent
        .find_prop("DTSTART")
        .ok_or_else(|| FreeSlotError::Parse(format!("event '{}' has no DTSTART", uid)))?;
    let start = single_time(start_prop, &uid, zones)?;

    let end = if let Some(prop) = vevent.find_prop("DTEND") {
        single_time(prop, &uid, zones)?
    } else if let Some(prop) = vevent.find_prop("DURATION") {
        start.shifted(parse_duration(prop.val.as_ref(), &uid)?)
    } else if start.is_date() {
        start.shifted(Duration::days(1))
    } else {
        start.clone()
    };

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let rdates = collect_times(vevent, "RDATE", &uid, zones)?;
    let exdates = collect_times(vevent, "EXDATE", &uid, zones)?;
    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .map(|p| single_time(p, &uid, zones))
        .transpose()?;

    let status = vevent
        .find_prop("STATUS")
        .map(|p| match p.val.as_ref().to_ascii_uppercase().as_str() {
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        })
        .unwrap_or_default();
    let transparent = vevent
        .find_prop("TRANSP")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("TRANSPARENT"));

    Ok(FeedEvent {
        uid,
        summary,
        start,
        end,
        rrule,
        rdates,
        exdates,
        recurrence_id,
        status,
        transparent,
    })
}

fn collect_times(vevent: &Component, name: &str, uid: &str, zones: &FeedZones) -> Result<Vec<EventTime>> {
    let mut times = Vec::new();
    for prop in vevent.properties.iter().filter(|p| p.name == name) {
        times.extend(parse_time_property(prop, uid, zones)?);
    }
    Ok(times)
}

fn single_time(prop: &Property, uid: &str, zones: &FeedZones) -> Result<EventTime> {
    parse_time_property(prop, uid, zones)?
        .into_iter()
        .next()
        .ok_or_else(|| FreeSlotError::Parse(format!("event '{}' has an empty {}", uid, prop.name)))
}

fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref().map(|v| v.as_ref()))
}

/// Parse a date/date-time property value.
///
/// Handles:
/// - `VALUE=DATE`: `20240108`
/// - `TZID`: `DTSTART;TZID=America/New_York:20240108T100000`, or a TZID the
///   feed defines with its own VTIMEZONE
/// - UTC: `20240108T150000Z`
/// - floating: `20240108T100000`
/// - comma-separated lists (RDATE/EXDATE), and `VALUE=PERIOD` (start kept)
fn parse_time_property(prop: &Property, uid: &str, zones: &FeedZones) -> Result<Vec<EventTime>> {
    let zone = match param(prop, "TZID") {
        Some(tzid) => Some(zones.lookup(tzid).ok_or_else(|| {
            FreeSlotError::Parse(format!("event '{}' uses unknown TZID '{}'", uid, tzid))
        })?),
        None => None,
    };
    let is_date = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            let value = raw.split('/').next().unwrap_or(raw);
            parse_time_value(value, is_date, zone.as_ref()).ok_or_else(|| {
                FreeSlotError::Parse(format!(
                    "event '{}' has malformed {} value '{}'",
                    uid, prop.name, raw
                ))
            })
        })
        .collect()
}

fn parse_time_value(value: &str, is_date: bool, zone: Option<&EventZone>) -> Option<EventTime> {
    if is_date || value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(EventTime::Date);
    }
    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| EventTime::Utc(dt.and_utc()));
    }
    let local = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    Some(match zone {
        Some(zone) => EventTime::Zoned {
            local,
            zone: zone.clone(),
        },
        None => EventTime::Floating(local),
    })
}

fn parse_duration(value: &str, uid: &str) -> Result<Duration> {
    let negative = value.starts_with('-');
    let unsigned = value.trim_start_matches(['-', '+']);
    let parsed = iso8601::duration(unsigned)
        .map_err(|e| FreeSlotError::Parse(format!("event '{}' has bad DURATION '{}': {}", uid, value, e)))?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = Duration::from_std(std_duration)
        .map_err(|e| FreeSlotError::Parse(format!("event '{}' has bad DURATION '{}': {}", uid, value, e)))?;
    Ok(if negative { -duration } else { duration })
}
