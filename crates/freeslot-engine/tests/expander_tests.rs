//! Tests for feed parsing and busy interval expansion.

use chrono::{DateTime, TimeZone, Utc};
use freeslot_engine::error::FreeSlotError;
use freeslot_engine::expander::{expand_feed, BusyInterval, RRuleExpander, RecurrenceExpander, TimeWindow};
use freeslot_engine::feed::{EventTime, Feed};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn window(from: (u32, u32), to: (u32, u32)) -> TimeWindow {
    TimeWindow::new(utc(2026, from.0, from.1, 0, 0), utc(2026, to.0, to.1, 0, 0))
}

/// Wrap VEVENT lines in a minimal VCALENDAR.
fn calendar(body: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//freeslot//tests//EN\r\n{}END:VCALENDAR\r\n",
        body
    )
}

fn parse(body: &str) -> Feed {
    Feed::from_ics(&calendar(body)).expect("fixture should parse")
}

fn expand(feed: &Feed, window: TimeWindow) -> Vec<BusyInterval> {
    let mut busy = expand_feed(feed, window, chrono_tz::America::New_York).expect("should expand");
    busy.sort_by_key(|b| b.start);
    busy
}

const WEEKLY_MONDAY: &str = "BEGIN:VEVENT\r\n\
UID:weekly@test\r\n\
SUMMARY:Team sync\r\n\
DTSTART;TZID=America/New_York:20260302T100000\r\n\
DTEND;TZID=America/New_York:20260302T110000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=4\r\n\
END:VEVENT\r\n";

// ---------------------------------------------------------------------------
// Single events
// ---------------------------------------------------------------------------

#[test]
fn single_utc_event_inside_window() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:single@test\r\nSUMMARY:Standup\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T143000Z\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 14, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 16, 14, 30));
}

#[test]
fn event_outside_window_is_excluded() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:single@test\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T143000Z\r\nEND:VEVENT\r\n",
    );

    assert!(expand(&feed, window((3, 17), (3, 18))).is_empty());
}

#[test]
fn partially_overlapping_event_is_returned_whole() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:late@test\r\n\
DTSTART:20260315T220000Z\r\nDTEND:20260316T020000Z\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].start, utc(2026, 3, 15, 22, 0), "start must not be clipped");
    assert_eq!(busy[0].end, utc(2026, 3, 16, 2, 0));
}

#[test]
fn tzid_event_normalized_to_utc() {
    // 10:00 EDT (UTC-4) = 14:00 UTC
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:zoned@test\r\n\
DTSTART;TZID=America/New_York:20260316T100000\r\n\
DTEND;TZID=America/New_York:20260316T103000\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy[0].start, utc(2026, 3, 16, 14, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 16, 14, 30));
}

#[test]
fn windows_zone_name_is_understood() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:outlook@test\r\n\
DTSTART;TZID=Eastern Standard Time:20260316T100000\r\n\
DTEND;TZID=Eastern Standard Time:20260316T103000\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy[0].start, utc(2026, 3, 16, 14, 0));
}

#[test]
fn mixed_offsets_compare_on_the_same_timeline() {
    // 09:00 PDT and 12:00 EDT are both 16:00 UTC.
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:west@test\r\n\
DTSTART;TZID=America/Los_Angeles:20260316T090000\r\n\
DTEND;TZID=America/Los_Angeles:20260316T100000\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:east@test\r\n\
DTSTART;TZID=America/New_York:20260316T120000\r\n\
DTEND;TZID=America/New_York:20260316T130000\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].start, busy[1].start);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 16, 0));
}

#[test]
fn all_day_event_covers_local_day() {
    // Dates are read in the floating zone (New York, EDT): midnight = 04:00 UTC.
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:allday@test\r\n\
DTSTART;VALUE=DATE:20260316\r\nDTEND;VALUE=DATE:20260317\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 4, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 17, 4, 0));
}

#[test]
fn all_day_event_without_dtend_lasts_one_day() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:allday@test\r\nDTSTART;VALUE=DATE:20260316\r\nEND:VEVENT\r\n",
    );

    assert_eq!(feed.events()[0].end, EventTime::Date(chrono::NaiveDate::from_ymd_opt(2026, 3, 17).unwrap()));
}

#[test]
fn duration_property_sets_end() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:dur@test\r\n\
DTSTART:20260316T140000Z\r\nDURATION:PT45M\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy[0].end, utc(2026, 3, 16, 14, 45));
}

#[test]
fn cancelled_and_transparent_events_are_not_busy() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:cancelled@test\r\nSTATUS:CANCELLED\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T150000Z\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:free@test\r\nTRANSP:TRANSPARENT\r\n\
DTSTART:20260316T160000Z\r\nDTEND:20260316T170000Z\r\nEND:VEVENT\r\n",
    );

    assert!(expand(&feed, window((3, 16), (3, 17))).is_empty());
}

#[test]
fn tentative_event_is_busy() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:maybe@test\r\nSTATUS:TENTATIVE\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T150000Z\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 14, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 16, 15, 0));
}

#[test]
fn floating_time_uses_calendar_default_zone() {
    // X-WR-TIMEZONE wins over the expander's floating zone: 09:00 PDT = 16:00 UTC.
    let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//freeslot//tests//EN\r\n\
X-WR-TIMEZONE:America/Los_Angeles\r\n\
BEGIN:VEVENT\r\nUID:floating@test\r\n\
DTSTART:20260316T090000\r\nDTEND:20260316T100000\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n";
    let feed = Feed::from_ics(ics).unwrap();

    assert_eq!(feed.default_zone(), Some(chrono_tz::America::Los_Angeles));
    let busy = expand(&feed, window((3, 16), (3, 17)));
    assert_eq!(busy[0].start, utc(2026, 3, 16, 16, 0));
}

// ---------------------------------------------------------------------------
// Recurring events
// ---------------------------------------------------------------------------

#[test]
fn weekly_rule_expands_across_dst_change() {
    let feed = parse(WEEKLY_MONDAY);

    let busy = expand(&feed, window((3, 1), (4, 1)));

    assert_eq!(busy.len(), 4, "COUNT=4 should produce 4 occurrences");
    // Mar 2: 10:00 EST (UTC-5) = 15:00 UTC
    assert_eq!(busy[0].start, utc(2026, 3, 2, 15, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 2, 16, 0));
    // Mar 9: 10:00 EDT (UTC-4) = 14:00 UTC, after spring forward on Mar 8
    assert_eq!(busy[1].start, utc(2026, 3, 9, 14, 0));
    assert_eq!(busy[2].start, utc(2026, 3, 16, 14, 0));
    assert_eq!(busy[3].start, utc(2026, 3, 23, 14, 0));
}

#[test]
fn recurring_expansion_limited_to_window() {
    let feed = parse(WEEKLY_MONDAY);

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 14, 0));
}

#[test]
fn open_ended_daily_rule_yields_one_per_day() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:daily@test\r\n\
DTSTART:20250101T120000Z\r\nDTEND:20250101T123000Z\r\n\
RRULE:FREQ=DAILY\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 19)));

    assert_eq!(busy.len(), 3);
    assert_eq!(busy[0].start, utc(2026, 3, 16, 12, 0));
    assert_eq!(busy[2].start, utc(2026, 3, 18, 12, 0));
}

#[test]
fn exdate_removes_occurrence() {
    let feed = parse(&WEEKLY_MONDAY.replace(
        "END:VEVENT",
        "EXDATE;TZID=America/New_York:20260309T100000\r\nEND:VEVENT",
    ));

    let busy = expand(&feed, window((3, 1), (4, 1)));

    assert_eq!(busy.len(), 3);
    assert!(
        busy.iter().all(|b| b.start.date_naive() != chrono::NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()),
        "Mar 9 occurrence should be excluded: {:?}",
        busy
    );
}

#[test]
fn rdate_adds_occurrence() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:rdate@test\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T150000Z\r\n\
RDATE:20260318T140000Z\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 16), (3, 20)));

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[1].start, utc(2026, 3, 18, 14, 0));
    assert_eq!(busy[1].end, utc(2026, 3, 18, 15, 0));
}

#[test]
fn recurrence_id_override_moves_occurrence() {
    let overridden = format!(
        "{}BEGIN:VEVENT\r\nUID:weekly@test\r\n\
RECURRENCE-ID;TZID=America/New_York:20260316T100000\r\n\
DTSTART;TZID=America/New_York:20260316T150000\r\n\
DTEND;TZID=America/New_York:20260316T160000\r\nEND:VEVENT\r\n",
        WEEKLY_MONDAY
    );
    let feed = parse(&overridden);

    let busy = expand(&feed, window((3, 16), (3, 17)));

    assert_eq!(busy.len(), 1, "override replaces the generated occurrence");
    assert_eq!(busy[0].start, utc(2026, 3, 16, 19, 0));
    assert_eq!(busy[0].end, utc(2026, 3, 16, 20, 0));
}

#[test]
fn cancelled_override_frees_occurrence() {
    let overridden = format!(
        "{}BEGIN:VEVENT\r\nUID:weekly@test\r\nSTATUS:CANCELLED\r\n\
RECURRENCE-ID;TZID=America/New_York:20260316T100000\r\n\
DTSTART;TZID=America/New_York:20260316T100000\r\n\
DTEND;TZID=America/New_York:20260316T110000\r\nEND:VEVENT\r\n",
        WEEKLY_MONDAY
    );
    let feed = parse(&overridden);

    assert!(expand(&feed, window((3, 16), (3, 17))).is_empty());
}

#[test]
fn local_until_is_inclusive() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:until@test\r\n\
DTSTART;TZID=America/New_York:20260316T100000\r\n\
DTEND;TZID=America/New_York:20260316T110000\r\n\
RRULE:FREQ=DAILY;UNTIL=20260318T100000\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 1), (4, 1)));

    assert_eq!(busy.len(), 3, "Mar 16, 17 and 18");
    assert_eq!(busy[2].start, utc(2026, 3, 18, 14, 0));
}

#[test]
fn date_until_covers_whole_day() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:until@test\r\n\
DTSTART;TZID=America/New_York:20260316T100000\r\n\
DTEND;TZID=America/New_York:20260316T110000\r\n\
RRULE:FREQ=DAILY;UNTIL=20260318\r\nEND:VEVENT\r\n",
    );

    assert_eq!(expand(&feed, window((3, 1), (4, 1))).len(), 3);
}

#[test]
fn recurring_all_day_event_expands_per_day() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:offsite@test\r\n\
DTSTART;VALUE=DATE:20260316\r\nDTEND;VALUE=DATE:20260317\r\n\
RRULE:FREQ=DAILY;COUNT=2\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 15), (3, 20)));

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[1].start, utc(2026, 3, 17, 4, 0));
    assert_eq!(busy[1].end, utc(2026, 3, 18, 4, 0));
}

#[test]
fn same_feed_expands_against_many_windows() {
    let feed = parse(WEEKLY_MONDAY);
    let expander = RRuleExpander::new(chrono_tz::America::New_York);

    let first = expander.expand(&feed, window((3, 2), (3, 3))).unwrap();
    let second = expander.expand(&feed, window((3, 23), (3, 24))).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].start, utc(2026, 3, 23, 14, 0));
}

#[test]
fn recurring_dtstart_in_dst_gap_moves_past_the_gap() {
    // 02:30 does not exist on 2026-03-08 in New York; that occurrence starts at
    // 03:00 EDT, the next one keeps its 02:30 wall-clock time.
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:early@test\r\n\
DTSTART;TZID=America/New_York:20260308T023000\r\n\
DTEND;TZID=America/New_York:20260308T033000\r\n\
RRULE:FREQ=DAILY;COUNT=2\r\nEND:VEVENT\r\n",
    );

    let busy = expand(&feed, window((3, 7), (3, 10)));

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].start, utc(2026, 3, 8, 7, 0));
    assert_eq!(busy[1].start, utc(2026, 3, 9, 6, 30));
}

// ---------------------------------------------------------------------------
// Zones defined by the feed (VTIMEZONE)
// ---------------------------------------------------------------------------

/// Outlook's export of US Eastern rules under a made-up name.
const CUSTOM_EASTERN: &str = "BEGIN:VTIMEZONE\r\n\
TZID:Customized Time Zone\r\n\
BEGIN:STANDARD\r\n\
DTSTART:16010101T020000\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
RRULE:FREQ=YEARLY;INTERVAL=1;BYDAY=1SU;BYMONTH=11\r\n\
END:STANDARD\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:16010101T020000\r\n\
TZOFFSETFROM:-0500\r\n\
TZOFFSETTO:-0400\r\n\
RRULE:FREQ=YEARLY;INTERVAL=1;BYDAY=2SU;BYMONTH=3\r\n\
END:DAYLIGHT\r\n\
END:VTIMEZONE\r\n";

#[test]
fn custom_vtimezone_defines_the_zone() {
    let feed = parse(&format!(
        "{}BEGIN:VEVENT\r\nUID:winter@test\r\n\
DTSTART;TZID=Customized Time Zone:20260216T100000\r\n\
DTEND;TZID=Customized Time Zone:20260216T110000\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:spring@test\r\n\
DTSTART;TZID=Customized Time Zone:20260316T100000\r\n\
DTEND;TZID=Customized Time Zone:20260316T110000\r\nEND:VEVENT\r\n",
        CUSTOM_EASTERN
    ));

    let busy = expand(&feed, window((2, 16), (3, 17)));

    assert_eq!(busy.len(), 2);
    // -0500 before the second Sunday of March, -0400 after.
    assert_eq!(busy[0].start, utc(2026, 2, 16, 15, 0));
    assert_eq!(busy[1].start, utc(2026, 3, 16, 14, 0));
    assert_eq!(busy[1].end, utc(2026, 3, 16, 15, 0));
}

#[test]
fn custom_vtimezone_rule_follows_its_own_dst() {
    let feed = parse(&format!(
        "{}BEGIN:VEVENT\r\nUID:weekly-custom@test\r\n\
DTSTART;TZID=Customized Time Zone:20260302T100000\r\n\
DTEND;TZID=Customized Time Zone:20260302T110000\r\n\
RRULE:FREQ=WEEKLY;COUNT=2\r\nEND:VEVENT\r\n",
        CUSTOM_EASTERN
    ));

    let busy = expand(&feed, window((3, 1), (3, 14)));

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].start, utc(2026, 3, 2, 15, 0));
    assert_eq!(busy[1].start, utc(2026, 3, 9, 14, 0));
}

#[test]
fn vtimezone_location_maps_to_iana_zone() {
    let feed = parse(
        "BEGIN:VTIMEZONE\r\nTZID:Berlin office\r\nX-LIC-LOCATION:Europe/Berlin\r\n\
BEGIN:STANDARD\r\nDTSTART:19701025T030000\r\nTZOFFSETFROM:+0200\r\nTZOFFSETTO:+0100\r\n\
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\nEND:STANDARD\r\nEND:VTIMEZONE\r\n\
BEGIN:VEVENT\r\nUID:berlin@test\r\n\
DTSTART;TZID=Berlin office:20260316T100000\r\n\
DTEND;TZID=Berlin office:20260316T110000\r\nEND:VEVENT\r\n",
    );

    // CET until the last Sunday of March: 10:00 +01:00.
    let busy = expand(&feed, window((3, 16), (3, 17)));
    assert_eq!(busy[0].start, utc(2026, 3, 16, 9, 0));

    match &feed.events()[0].start {
        EventTime::Zoned { zone, .. } => assert_eq!(zone.name(), "Europe/Berlin"),
        other => panic!("expected a zoned time, got {:?}", other),
    }
}

#[test]
fn vtimezone_without_offsets_does_not_define_the_zone() {
    let err = Feed::from_ics(&calendar(
        "BEGIN:VTIMEZONE\r\nTZID:Somewhere\r\nEND:VTIMEZONE\r\n\
BEGIN:VEVENT\r\nUID:broken@test\r\n\
DTSTART;TZID=Somewhere:20260316T100000\r\nEND:VEVENT\r\n",
    ))
    .unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(ref msg) if msg.contains("Somewhere")));
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[test]
fn non_calendar_content_is_parse_error() {
    let err = Feed::parse(b"<html>not a calendar</html>").unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(_)), "got {:?}", err);
}

#[test]
fn invalid_utf8_is_parse_error() {
    let err = Feed::parse(&[0x42, 0x45, 0xff, 0xfe]).unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(_)));
}

#[test]
fn missing_dtstart_is_parse_error() {
    let err = Feed::from_ics(&calendar(
        "BEGIN:VEVENT\r\nUID:broken@test\r\nDTEND:20260316T150000Z\r\nEND:VEVENT\r\n",
    ))
    .unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(ref msg) if msg.contains("DTSTART")));
}

#[test]
fn malformed_date_is_parse_error() {
    let err = Feed::from_ics(&calendar(
        "BEGIN:VEVENT\r\nUID:broken@test\r\nDTSTART:tomorrow\r\nEND:VEVENT\r\n",
    ))
    .unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(_)));
}

#[test]
fn unknown_tzid_is_parse_error() {
    let err = Feed::from_ics(&calendar(
        "BEGIN:VEVENT\r\nUID:broken@test\r\n\
DTSTART;TZID=Mars/Olympus_Mons:20260316T100000\r\nEND:VEVENT\r\n",
    ))
    .unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(ref msg) if msg.contains("Mars/Olympus_Mons")));
}

#[test]
fn invalid_rrule_is_parse_error() {
    let feed = parse(
        "BEGIN:VEVENT\r\nUID:broken@test\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T150000Z\r\n\
RRULE:FREQ=SOMETIMES\r\nEND:VEVENT\r\n",
    );

    let err = expand_feed(&feed, window((3, 16), (3, 17)), chrono_tz::UTC).unwrap_err();

    assert!(matches!(err, FreeSlotError::Parse(ref msg) if msg.contains("RRULE")));
}

#[test]
fn vendor_prefixed_tzid_resolves() {
    assert_eq!(
        freeslot_engine::feed::resolve_tzid("/mozilla.org/20050126_1/America/New_York"),
        Some(chrono_tz::America::New_York)
    );
    assert_eq!(
        freeslot_engine::feed::resolve_tzid("\"Europe/Berlin\""),
        Some(chrono_tz::Europe::Berlin)
    );
}

#[test]
fn folded_lines_and_bom_are_accepted() {
    let ics = format!(
        "\u{feff}{}",
        calendar(
            "BEGIN:VEVENT\r\nUID:folded@test\r\nSUMMARY:A very long\r\n  meeting title\r\n\
DTSTART:20260316T140000Z\r\nDTEND:20260316T150000Z\r\nEND:VEVENT\r\n",
        )
    );

    let feed = Feed::parse(ics.as_bytes()).unwrap();

    assert_eq!(feed.events().len(), 1);
    assert_eq!(feed.events()[0].summary, "A very long meeting title");
}
