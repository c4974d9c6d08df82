//! Validation of request parameters.

use chrono::NaiveDate;
use freeslot_engine::config::{BufferMinutes, DateRange, DisplayZone, SlotRequest, WorkingHours, MAX_RANGE_DAYS};
use freeslot_engine::dst::DstPolicy;
use freeslot_engine::error::FreeSlotError;

fn field_of(err: FreeSlotError) -> &'static str {
    match err {
        FreeSlotError::InvalidConfiguration { field, .. } => field,
        other => panic!("expected InvalidConfiguration, got {:?}", other),
    }
}

#[test]
fn working_hours_bounds() {
    assert!(WorkingHours::new(0, 24).is_ok());
    assert!(WorkingHours::new(23, 24).is_ok());
    assert_eq!(field_of(WorkingHours::new(24, 24).unwrap_err()), "working_hours");
    assert_eq!(field_of(WorkingHours::new(9, 25).unwrap_err()), "working_hours");
    assert_eq!(field_of(WorkingHours::new(17, 9).unwrap_err()), "working_hours");
    assert_eq!(field_of(WorkingHours::new(9, 9).unwrap_err()), "working_hours");
}

#[test]
fn working_hours_default_is_nine_to_five() {
    let hours = WorkingHours::default();
    assert_eq!((hours.start_hour(), hours.end_hour()), (9, 17));
}

#[test]
fn buffer_accepts_only_listed_values() {
    for minutes in BufferMinutes::ALLOWED {
        assert_eq!(BufferMinutes::new(minutes).unwrap().minutes(), minutes);
    }
    for minutes in [1, 10, 20, 90] {
        assert_eq!(field_of(BufferMinutes::new(minutes).unwrap_err()), "buffer");
    }
}

#[test]
fn buffer_deserialization_validates() {
    let ok: BufferMinutes = serde_json::from_str("45").unwrap();
    assert_eq!(ok.minutes(), 45);
    assert!(serde_json::from_str::<BufferMinutes>("50").is_err());
}

#[test]
fn date_range_inclusive_days() {
    let range = DateRange::parse("2026-03-30", "2026-04-02").unwrap();

    assert_eq!(range.num_days(), 4);
    let days: Vec<NaiveDate> = range.days().collect();
    assert_eq!(days.first(), Some(&NaiveDate::from_ymd_opt(2026, 3, 30).unwrap()));
    assert_eq!(days.last(), Some(&NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()));
}

#[test]
fn date_range_same_day_is_one_day() {
    let range = DateRange::parse("2026-03-16", "2026-03-16").unwrap();
    assert_eq!(range.days().count(), 1);
}

#[test]
fn date_range_rejects_reversed_and_oversized() {
    assert_eq!(field_of(DateRange::parse("2026-03-17", "2026-03-16").unwrap_err()), "date_range");

    let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let last_ok = start + chrono::Duration::days(MAX_RANGE_DAYS - 1);
    assert!(DateRange::new(start, last_ok).is_ok());
    assert_eq!(
        field_of(DateRange::new(start, last_ok + chrono::Duration::days(1)).unwrap_err()),
        "date_range"
    );
}

#[test]
fn date_range_rejects_bad_format() {
    assert_eq!(field_of(DateRange::parse("03/16/2026", "2026-03-17").unwrap_err()), "date_range");
    assert_eq!(field_of(DateRange::parse("2026-02-30", "2026-03-17").unwrap_err()), "date_range");
}

#[test]
fn display_zone_parsing() {
    assert_eq!("eastern".parse::<DisplayZone>().unwrap(), DisplayZone::Eastern);
    assert_eq!("PT".parse::<DisplayZone>().unwrap(), DisplayZone::Pacific);
    assert_eq!("America/Denver".parse::<DisplayZone>().unwrap(), DisplayZone::Mountain);
    assert_eq!(" UTC ".parse::<DisplayZone>().unwrap(), DisplayZone::Utc);
    assert_eq!(field_of("Europe/Paris".parse::<DisplayZone>().unwrap_err()), "timezone");
}

#[test]
fn display_zone_labels() {
    assert_eq!(DisplayZone::Central.abbreviation(), "CT");
    assert_eq!(DisplayZone::Central.to_string(), "central");
    assert_eq!(DisplayZone::Central.tz(), chrono_tz::America::Chicago);
}

#[test]
fn dst_policy_parsing() {
    assert_eq!("skip".parse::<DstPolicy>().unwrap(), DstPolicy::Skip);
    assert_eq!("shift-forward".parse::<DstPolicy>().unwrap(), DstPolicy::ShiftForward);
    assert_eq!(DstPolicy::default(), DstPolicy::ShiftForward);
}

#[test]
fn slot_request_from_raw_reports_first_bad_field() {
    let ok = SlotRequest::from_raw("2026-03-16", "2026-03-20", 8, 18, 30, "central").unwrap();
    assert_eq!(ok.zone, DisplayZone::Central);
    assert_eq!(ok.buffer.minutes(), 30);
    assert_eq!(ok.hours.start_hour(), 8);

    let err = SlotRequest::from_raw("2026-03-16", "2026-03-20", 9, 17, 20, "eastern").unwrap_err();
    assert_eq!(field_of(err), "buffer");

    let err = SlotRequest::from_raw("2026-03-16", "2026-03-20", 17, 9, 20, "mars").unwrap_err();
    assert_eq!(field_of(err), "working_hours");

    let err = SlotRequest::from_raw("2026-03-16", "2026-03-20", 9, 17, 0, "mars").unwrap_err();
    assert_eq!(field_of(err), "timezone");
}

#[test]
fn error_messages_name_the_field() {
    let err = BufferMinutes::new(7).unwrap_err();
    assert!(err.to_string().starts_with("Invalid buffer:"), "{}", err);
}
