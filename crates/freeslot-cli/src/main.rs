//! `freeslot` CLI: list free time slots from an ICS calendar feed.
//!
//! ## Usage
//!
//! ```sh
//! # Free time for the next few working days, Eastern time
//! freeslot --feed-url https://example.com/calendar.ics
//!
//! # A specific week, 8-18 Pacific, 15 minutes around every meeting
//! freeslot --feed-file work.ics --start 2026-03-16 --end 2026-03-20 \
//!     --work-start 8 --work-end 18 --timezone pacific --buffer 15
//!
//! # JSON output, feed on stdin
//! curl -s "$FEED" | freeslot --feed-file - --format json
//! ```

mod fetch;
mod render;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use clap::{ArgGroup, Parser};
use freeslot_engine::{
    compute_free_time, BufferMinutes, DateRange, DisplayZone, DstPolicy, Feed, SlotRequest,
    WorkingHours,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fetch::FeedSource;
use render::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "freeslot",
    version,
    about = "Find free time slots in an ICS calendar feed"
)]
#[command(group(ArgGroup::new("source").required(true).multiple(true).args(["feed_url", "feed_file"])))]
struct Cli {
    /// Calendar feed URL (http, https or webcal)
    #[arg(long, env = "FREESLOT_FEED_URL")]
    feed_url: Option<String>,

    /// Calendar feed file, or `-` for stdin (takes precedence over --feed-url)
    #[arg(long)]
    feed_file: Option<String>,

    /// First day, YYYY-MM-DD (default: tomorrow)
    #[arg(long)]
    start: Option<String>,

    /// Last day, YYYY-MM-DD (default: three days after the start)
    #[arg(long)]
    end: Option<String>,

    /// Start of the working day, hour 0-23
    #[arg(long, default_value_t = 9)]
    work_start: u32,

    /// End of the working day, hour 1-24
    #[arg(long, default_value_t = 17)]
    work_end: u32,

    /// Minutes kept clear before and after each event (0, 15, 30, 45 or 60)
    #[arg(long, default_value_t = 0)]
    buffer: u32,

    /// Zone for working hours and output: eastern, central, mountain, pacific, utc
    #[arg(long, default_value = "eastern")]
    timezone: String,

    /// What to do when a working-hour boundary falls into a DST gap
    #[arg(long, default_value = "shift-forward")]
    dst_policy: DstPolicy,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// HTTP timeout for fetching the feed, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl Cli {
    fn source(&self) -> Result<FeedSource> {
        match (&self.feed_url, self.feed_file.as_deref()) {
            (_, Some("-")) => Ok(FeedSource::Stdin),
            (_, Some(path)) => Ok(FeedSource::File(path.to_string())),
            (Some(url), None) => Ok(FeedSource::Url(url.clone())),
            (None, None) => anyhow::bail!("either --feed-url or --feed-file is required"),
        }
    }

    /// Validate every request parameter before the feed is touched.
    fn request(&self) -> Result<SlotRequest> {
        let zone: DisplayZone = self.timezone.parse()?;
        let range = self.range(zone)?;
        Ok(SlotRequest::new(range)
            .with_hours(WorkingHours::new(self.work_start, self.work_end)?)
            .with_buffer(BufferMinutes::new(self.buffer)?)
            .with_zone(zone)
            .with_dst_policy(self.dst_policy))
    }

    fn range(&self, zone: DisplayZone) -> Result<DateRange> {
        let tomorrow = today_in(zone)
            .checked_add_days(Days::new(1))
            .context("date out of range")?;
        let start = match &self.start {
            Some(s) => parse_day(s)?,
            None => tomorrow,
        };
        let end = match &self.end {
            Some(s) => parse_day(s)?,
            None => start
                .checked_add_days(Days::new(3))
                .context("date out of range")?,
        };
        Ok(DateRange::new(start, end)?)
    }
}

fn today_in(zone: DisplayZone) -> NaiveDate {
    Utc::now().with_timezone(&zone.tz()).date_naive()
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    let range = DateRange::parse(s, s)?;
    Ok(range.start())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let request = cli.request()?;
    debug!(?request, "request validated");

    let source = cli.source()?;
    let bytes = source
        .load(Duration::from_secs(cli.timeout_secs))
        .context("Could not load the calendar feed")?;
    let feed = Feed::parse(&bytes).context("Could not read the calendar feed")?;
    debug!(events = feed.events().len(), "feed parsed");

    let report = compute_free_time(&feed, &request).context("Could not compute free time")?;
    let output = render::render(&report, cli.format).context("Failed to render output")?;
    print!("{}", output);
    Ok(())
}
