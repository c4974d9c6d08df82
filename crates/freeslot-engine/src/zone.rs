//! Zones that event times are written in.
//!
//! Most feeds name IANA zones, or Windows zones that map onto them. Outlook and
//! some CalDAV servers instead ship their own VTIMEZONE blocks under arbitrary
//! TZIDs such as `Customized Time Zone`. When no IANA zone can be found for such
//! a block, its STANDARD/DAYLIGHT observances are turned into a [`DefinedZone`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::Component;
use rrule::RRuleSet;
use tracing::debug;

use crate::dst::{resolve_local, DstPolicy, MAX_GAP_MINUTES};

/// Observance rules are expanded from this year on. Older onsets only matter
/// for the offset in force before it.
const FIRST_TRANSITION_YEAR: i32 = 1970;

/// Observance rules are expanded up to this year; the last offset holds after it.
const LAST_TRANSITION_YEAR: i32 = 2100;

/// Most onsets one observance rule may produce.
const MAX_ONSETS: u16 = 4096;

/// The zone an [`EventTime`](crate::feed::EventTime) is read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventZone {
    /// An IANA zone.
    Named(Tz),
    /// A zone built from the feed's own VTIMEZONE.
    Defined(Arc<DefinedZone>),
}

impl EventZone {
    pub fn name(&self) -> &str {
        match self {
            EventZone::Named(tz) => tz.name(),
            EventZone::Defined(zone) => zone.tzid(),
        }
    }

    /// Map a wall-clock time in this zone to a UTC instant. Ambiguous times take
    /// the earliest instant; gaps follow `policy`.
    pub fn resolve(&self, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
        match self {
            EventZone::Named(tz) => resolve_local(*tz, local, policy),
            EventZone::Defined(zone) => zone.resolve(local, policy),
        }
    }

    /// Wall-clock reading of `instant` in this zone.
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            EventZone::Named(tz) => instant.with_timezone(tz).naive_local(),
            EventZone::Defined(zone) => instant.naive_utc() + zone.offset_at(instant),
        }
    }
}

impl From<Tz> for EventZone {
    fn from(tz: Tz) -> Self {
        EventZone::Named(tz)
    }
}

/// A zone defined by VTIMEZONE observances: a UTC offset that changes at
/// fixed instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedZone {
    tzid: String,
    /// Offset in force before the first transition.
    initial: Duration,
    /// `(instant, offset from then on)`, sorted by instant.
    transitions: Vec<(DateTime<Utc>, Duration)>,
    /// Every distinct offset the zone uses.
    offsets: Vec<Duration>,
}

impl DefinedZone {
    /// Build a zone from a VTIMEZONE block. `None` when no observance in it is
    /// readable.
    pub fn from_vtimezone(tzid: &str, vtimezone: &Component<'_>) -> Option<Self> {
        let mut onsets = Vec::new();
        for observance in vtimezone
            .components
            .iter()
            .filter(|c| c.name == "STANDARD" || c.name == "DAYLIGHT")
        {
            match observance_onsets(observance) {
                Some(found) => onsets.extend(found),
                None => debug!(tzid, kind = %observance.name, "skipping unreadable observance"),
            }
        }
        Self::from_onsets(tzid, onsets)
    }

    /// Build a zone from `(instant, offset before, offset after)` onsets.
    pub fn from_onsets(
        tzid: &str,
        mut onsets: Vec<(DateTime<Utc>, Duration, Duration)>,
    ) -> Option<Self> {
        onsets.sort_by_key(|(at, _, _)| *at);
        onsets.dedup_by_key(|(at, _, _)| *at);
        let initial = onsets.first()?.1;

        let transitions: Vec<(DateTime<Utc>, Duration)> =
            onsets.into_iter().map(|(at, _, to)| (at, to)).collect();
        let mut offsets: Vec<Duration> = transitions.iter().map(|(_, offset)| *offset).collect();
        offsets.push(initial);
        offsets.sort();
        offsets.dedup();

        Some(Self {
            tzid: tzid.to_string(),
            initial,
            transitions,
            offsets,
        })
    }

    pub fn tzid(&self) -> &str {
        &self.tzid
    }

    /// UTC offset in force at `instant`.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> Duration {
        match self.transitions.partition_point(|(at, _)| *at <= instant) {
            0 => self.initial,
            i => self.transitions[i - 1].1,
        }
    }

    pub fn resolve(&self, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
        if let Some(instant) = self.earliest(local) {
            return Some(instant);
        }
        match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => {
                (1..=MAX_GAP_MINUTES).find_map(|minutes| self.earliest(local + Duration::minutes(minutes)))
            }
        }
    }

    /// Earliest instant whose wall-clock reading is `local`, if there is one.
    fn earliest(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.offsets
            .iter()
            .map(|offset| (local.and_utc() - *offset, *offset))
            .filter(|(instant, offset)| self.offset_at(*instant) == *offset)
            .map(|(instant, _)| instant)
            .min()
    }
}

/// Transition instants of one STANDARD or DAYLIGHT block, with the offsets
/// before and after each.
fn observance_onsets(observance: &Component<'_>) -> Option<Vec<(DateTime<Utc>, Duration, Duration)>> {
    let from = parse_offset(observance.find_prop("TZOFFSETFROM")?.val.as_ref())?;
    let to = parse_offset(observance.find_prop("TZOFFSETTO")?.val.as_ref())?;
    let start = parse_wall_clock(observance.find_prop("DTSTART")?.val.as_ref())?;

    let mut locals = vec![start];
    if let Some(rule) = observance.find_prop("RRULE") {
        locals.extend(rule_onsets(start, rule.val.as_ref()));
    }
    for rdate in observance.properties.iter().filter(|p| p.name == "RDATE") {
        locals.extend(rdate.val.as_ref().split(',').filter_map(parse_wall_clock));
    }

    // Onsets are written in the offset that was in force before them.
    Some(
        locals
            .into_iter()
            .map(|local| (local.and_utc() - from, from, to))
            .collect(),
    )
}

/// Wall-clock onsets of an observance RRULE. The rule is expanded with the wall
/// clock written as UTC, so no zone is needed.
fn rule_onsets(start: NaiveDateTime, rule: &str) -> Vec<NaiveDateTime> {
    let first = if start.year() < FIRST_TRANSITION_YEAR {
        start.with_year(FIRST_TRANSITION_YEAR).unwrap_or(start)
    } else {
        start
    };
    let rule: Vec<String> = rule
        .trim()
        .trim_end_matches(';')
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") && !value.ends_with('Z') => {
                if value.len() == 8 {
                    format!("UNTIL={}T235959Z", value)
                } else {
                    format!("UNTIL={}Z", value)
                }
            }
            _ => part.to_string(),
        })
        .collect();

    let source = format!("DTSTART:{}Z\nRRULE:{}", first.format("%Y%m%dT%H%M%S"), rule.join(";"));
    let set: RRuleSet = match source.parse() {
        Ok(set) => set,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable observance RRULE");
            return Vec::new();
        }
    };
    let Some(last) = NaiveDate::from_ymd_opt(LAST_TRANSITION_YEAR, 1, 1) else {
        return Vec::new();
    };
    let tz: rrule::Tz = Utc.into();
    let before = last.and_time(NaiveTime::MIN).and_utc().with_timezone(&tz);

    set.before(before)
        .all(MAX_ONSETS)
        .dates
        .into_iter()
        .map(|dt| dt.naive_utc())
        .collect()
}

fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
}

/// `-0500`, `+0530`, `+053000`.
fn parse_offset(value: &str) -> Option<Duration> {
    let value = value.trim();
    let sign = match value.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits = &value[1..];
    if !(digits.len() == 4 || digits.len() == 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = digits[0..2].parse().ok()?;
    let minutes: i64 = digits[2..4].parse().ok()?;
    let seconds: i64 = digits.get(4..6).map_or(Some(0), |s| s.parse().ok())?;
    Some(Duration::seconds(sign * (hours * 3600 + minutes * 60 + seconds)))
}

/// The TZIDs one feed defines with VTIMEZONE blocks.
#[derive(Debug, Clone, Default)]
pub struct FeedZones {
    defined: HashMap<String, EventZone>,
}

impl FeedZones {
    /// Collect the VTIMEZONE blocks among a calendar's components.
    ///
    /// A block whose TZID or `X-LIC-LOCATION` names a known zone maps to that
    /// IANA zone. Otherwise its observances define the zone.
    pub fn from_components(components: &[Component<'_>]) -> Self {
        let mut defined = HashMap::new();
        for vtimezone in components.iter().filter(|c| c.name == "VTIMEZONE") {
            let Some(tzid) = vtimezone.find_prop("TZID").map(|p| p.val.to_string()) else {
                continue;
            };
            let tzid = tzid.trim().trim_matches('"').to_string();
            match zone_for_vtimezone(&tzid, vtimezone) {
                Some(zone) => {
                    debug!(tzid = %tzid, zone = zone.name(), "resolved VTIMEZONE");
                    defined.insert(tzid, zone);
                }
                None => debug!(tzid = %tzid, "VTIMEZONE defines no usable offsets"),
            }
        }
        Self { defined }
    }

    /// Resolve a TZID parameter: the feed's own definitions first, then the
    /// names [`resolve_tzid`] knows.
    pub fn lookup(&self, tzid: &str) -> Option<EventZone> {
        let tzid = tzid.trim().trim_matches('"');
        self.defined
            .get(tzid)
            .cloned()
            .or_else(|| resolve_tzid(tzid).map(EventZone::Named))
    }

    pub fn len(&self) -> usize {
        self.defined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defined.is_empty()
    }
}

fn zone_for_vtimezone(tzid: &str, vtimezone: &Component<'_>) -> Option<EventZone> {
    let known = resolve_tzid(tzid).or_else(|| {
        vtimezone
            .find_prop("X-LIC-LOCATION")
            .and_then(|p| resolve_tzid(p.val.as_ref()))
    });
    match known {
        Some(tz) => Some(EventZone::Named(tz)),
        None => DefinedZone::from_vtimezone(tzid, vtimezone)
            .map(|zone| EventZone::Defined(Arc::new(zone))),
    }
}

/// Resolve a TZID to an IANA zone.
///
/// Accepts IANA names, quoted names, vendor-prefixed paths ending in an IANA
/// name (`/mozilla.org/20050126_1/America/New_York`), the Windows zone names
/// that Exchange and Outlook publish, and Windows display names such as
/// `(UTC-05:00) Eastern Time (US & Canada)`.
pub fn resolve_tzid(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim().trim_matches('"');
    if let Ok(tz) = tzid.parse::<Tz>() {
        return Some(tz);
    }
    if let Some(tz) = windows_zone(tzid).or_else(|| display_name_zone(tzid)) {
        return Some(tz);
    }
    let segments: Vec<&str> = tzid.split('/').filter(|s| !s.is_empty()).collect();
    (1..segments.len()).find_map(|i| segments[i..].join("/").parse::<Tz>().ok())
}

fn windows_zone(name: &str) -> Option<Tz> {
    use chrono_tz::{America, Asia, Atlantic, Australia, Europe, Pacific};

    let tz = match name {
        "Eastern Standard Time" | "US Eastern Standard Time" => America::New_York,
        "Central Standard Time" => America::Chicago,
        "Mountain Standard Time" => America::Denver,
        "US Mountain Standard Time" => America::Phoenix,
        "Pacific Standard Time" => America::Los_Angeles,
        "Alaskan Standard Time" => America::Anchorage,
        "Hawaiian Standard Time" => Pacific::Honolulu,
        "Atlantic Standard Time" => America::Halifax,
        "E. South America Standard Time" => America::Sao_Paulo,
        "GMT Standard Time" => Europe::London,
        "Greenwich Standard Time" => Atlantic::Reykjavik,
        "W. Europe Standard Time" => Europe::Berlin,
        "Romance Standard Time" => Europe::Paris,
        "Central Europe Standard Time" => Europe::Budapest,
        "Central European Standard Time" => Europe::Warsaw,
        "GTB Standard Time" => Europe::Bucharest,
        "FLE Standard Time" => Europe::Kyiv,
        "Russian Standard Time" => Europe::Moscow,
        "Israel Standard Time" => Asia::Jerusalem,
        "India Standard Time" => Asia::Kolkata,
        "China Standard Time" => Asia::Shanghai,
        "Singapore Standard Time" => Asia::Singapore,
        "Tokyo Standard Time" => Asia::Tokyo,
        "Korea Standard Time" => Asia::Seoul,
        "AUS Eastern Standard Time" => Australia::Sydney,
        "New Zealand Standard Time" => Pacific::Auckland,
        "UTC" | "Coordinated Universal Time" => chrono_tz::UTC,
        _ => return None,
    };
    Some(tz)
}

/// Windows display names, with or without their `(UTC±hh:mm)` prefix.
fn display_name_zone(name: &str) -> Option<Tz> {
    use chrono_tz::{America, Asia, Australia, Europe, Pacific};

    let label = match name.strip_prefix('(').and_then(|rest| rest.split_once(')')) {
        Some((_, label)) => label.trim(),
        None => name,
    };
    let tz = match label {
        "Eastern Time (US & Canada)" => America::New_York,
        "Central Time (US & Canada)" => America::Chicago,
        "Mountain Time (US & Canada)" => America::Denver,
        "Pacific Time (US & Canada)" => America::Los_Angeles,
        "Arizona" => America::Phoenix,
        "Alaska" => America::Anchorage,
        "Hawaii" => Pacific::Honolulu,
        "Atlantic Time (Canada)" => America::Halifax,
        "Dublin, Edinburgh, Lisbon, London" => Europe::London,
        "Amsterdam, Berlin, Bern, Rome, Stockholm, Vienna" => Europe::Berlin,
        "Brussels, Copenhagen, Madrid, Paris" => Europe::Paris,
        "Chennai, Kolkata, Mumbai, New Delhi" => Asia::Kolkata,
        "Beijing, Chongqing, Hong Kong, Urumqi" => Asia::Shanghai,
        "Osaka, Sapporo, Tokyo" => Asia::Tokyo,
        "Canberra, Melbourne, Sydney" => Australia::Sydney,
        "Coordinated Universal Time" => chrono_tz::UTC,
        _ => return None,
    };
    Some(tz)
}
