use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct DateEntry {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct TimesResponse {
    pub available_times: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Acceptance hooks for candidate slots. The defaults take anything; swap in
/// a custom closure to only rebook, say, weekday mornings.
pub type DateFilter = Box<dyn Fn(&DateParts) -> bool + Send + Sync>;
pub type TimeFilter = Box<dyn Fn(u32, u32) -> bool + Send + Sync>;

pub fn accept_any_date() -> DateFilter {
    Box::new(|_| true)
}

pub fn accept_any_time() -> TimeFilter {
    Box::new(|_, _| true)
}

/// Form body for the rebooking POST, field names as the portal expects them.
#[derive(Debug, Serialize)]
pub struct ReschedulePayload {
    pub authenticity_token: String,
    pub confirmed_limit_message: String,
    pub use_consulate_appointment_capacity: String,
    #[serde(rename = "appointments[consulate_appointment][facility_id]")]
    pub facility_id: String,
    #[serde(rename = "appointments[consulate_appointment][date]")]
    pub date: String,
    #[serde(rename = "appointments[consulate_appointment][time]")]
    pub time: String,
}

// The dates endpoint returns earliest-first; entries past the head are never
// better than what precedes them.
const DATE_LOOKAHEAD: usize = 5;

pub(crate) fn first_earlier_date(
    entries: &[DateEntry],
    before: NaiveDate,
    filter: &DateFilter,
) -> Option<String> {
    for entry in entries.iter().take(DATE_LOOKAHEAD) {
        let Ok(date) = NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d") else {
            warn!(date = %entry.date, "skipping unparseable date entry");
            continue;
        };
        if date >= before {
            debug!(date = %entry.date, "not earlier than threshold");
            continue;
        }
        let parts = DateParts {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        };
        if filter(&parts) {
            return Some(entry.date.clone());
        }
    }
    None
}

// Slots arrive least-preferred first, so scan from the back of the list.
pub(crate) fn pick_time(times: &[String], filter: &TimeFilter) -> Option<String> {
    for slot in times.iter().rev() {
        let Some((hour, minute)) = parse_hhmm(slot) else {
            warn!(slot = %slot, "skipping unparseable time slot");
            continue;
        };
        if filter(hour, minute) {
            return Some(slot.clone());
        }
    }
    None
}

fn parse_hhmm(slot: &str) -> Option<(u32, u32)> {
    let (hour, minute) = slot.split_once(':')?;
    Some((hour.parse().ok()?, minute.parse().ok()?))
}
