//! Output formatting for free time reports.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use clap::ValueEnum;
use freeslot_engine::{DisplayZone, FreeSlot, FreeTimeReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per day, e.g. `3/16 (Mon): 9a-10a, 10:30a-5p ET`
    Text,
    /// The report as JSON, timestamps in the display zone
    Json,
}

pub fn render(report: &FreeTimeReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&ReportDto::from_report(report)).map(|json| json + "\n")
        }
    }
}

pub fn render_text(report: &FreeTimeReport) -> String {
    let tz = report.zone.tz();
    let mut out = String::new();
    for (date, slots) in report.iter() {
        out.push_str(&day_line(*date, slots, report.zone, tz));
        out.push('\n');
    }
    out
}

fn day_line(date: NaiveDate, slots: &[FreeSlot], zone: DisplayZone, tz: Tz) -> String {
    let label = date.format("%-m/%-d (%a)");
    if slots.is_empty() {
        return format!("{}: No free time slots available", label);
    }
    let ranges: Vec<String> = slots
        .iter()
        .map(|slot| {
            format!(
                "{}-{}",
                compact_time(slot.start, tz),
                compact_time(slot.end, tz)
            )
        })
        .collect();
    format!("{}: {} {}", label, ranges.join(", "), zone.abbreviation())
}

/// `9a`, `10:30a`, `2p`; noon is `12p` and midnight `12a`.
pub fn compact_time(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let (pm, hour) = local.hour12();
    let suffix = if pm { 'p' } else { 'a' };
    match local.minute() {
        0 => format!("{}{}", hour, suffix),
        minute => format!("{}:{:02}{}", hour, minute, suffix),
    }
}

// ---------------------------------------------------------------------------
// JSON shape
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ReportDto {
    timezone: String,
    iana: &'static str,
    total_free_minutes: i64,
    days: Vec<DayDto>,
}

#[derive(Debug, Serialize)]
struct DayDto {
    date: NaiveDate,
    weekday: String,
    slots: Vec<SlotDto>,
}

#[derive(Debug, Serialize)]
struct SlotDto {
    start: String,
    end: String,
    duration_minutes: i64,
}

impl ReportDto {
    fn from_report(report: &FreeTimeReport) -> Self {
        let tz = report.zone.tz();
        let days = report
            .iter()
            .map(|(date, slots)| DayDto {
                date: *date,
                weekday: date.format("%a").to_string(),
                slots: slots
                    .iter()
                    .map(|slot| SlotDto {
                        start: slot.start.with_timezone(&tz).to_rfc3339(),
                        end: slot.end.with_timezone(&tz).to_rfc3339(),
                        duration_minutes: slot.duration_minutes,
                    })
                    .collect(),
            })
            .collect();

        Self {
            timezone: report.zone.to_string(),
            iana: tz.name(),
            total_free_minutes: report.total_free_minutes(),
            days,
        }
    }
}
