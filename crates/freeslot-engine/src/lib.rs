//! # freeslot-engine
//!
//! Free time computation over a single ICS calendar feed.
//!
//! Given a feed, a date range, daily working hours and an optional buffer, the
//! engine finds the open intervals of every working day after removing the time
//! taken by calendar events, recurring ones included. All interval arithmetic
//! happens on UTC instants; zones only decide where working hours fall.
//!
//! ```no_run
//! use freeslot_engine::{compute_free_time, DateRange, Feed, SlotRequest};
//!
//! # fn run(bytes: &[u8]) -> freeslot_engine::error::Result<()> {
//! let feed = Feed::parse(bytes)?;
//! let request = SlotRequest::new(DateRange::parse("2026-03-16", "2026-03-20")?);
//! let report = compute_free_time(&feed, &request)?;
//! for (date, slots) in report.iter() {
//!     println!("{}: {} free slots", date, slots.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`feed`]: ICS bytes → parsed events (parse once, reuse)
//! - [`expander`]: parsed events → concrete UTC busy intervals (RRULE expansion)
//! - [`slots`]: one day's working window minus buffered busy intervals
//! - [`schedule`]: the whole date range, one report
//! - [`config`]: validated request parameters
//! - [`dst`]: DST gap handling for wall-clock times
//! - [`zone`]: IANA, Windows and feed-defined (VTIMEZONE) zones
//! - [`error`]: Error types

pub mod config;
pub mod dst;
pub mod error;
pub mod expander;
pub mod feed;
pub mod schedule;
pub mod slots;
pub mod zone;

pub use config::{BufferMinutes, DateRange, DisplayZone, SlotRequest, WorkingHours};
pub use dst::DstPolicy;
pub use error::FreeSlotError;
pub use expander::{expand_feed, BusyInterval, RRuleExpander, RecurrenceExpander, TimeWindow};
pub use feed::{EventTime, Feed, FeedEvent};
pub use schedule::{compute_free_time, compute_free_time_from_bytes, compute_free_time_with, FreeTimeReport};
pub use slots::{find_free_slots, subtract_busy, FreeSlot, WorkWindow};
pub use zone::{DefinedZone, EventZone};
