use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::model::{DaySelection, TimeSlot};

// ── Availability Rule Evaluator ──────────────────────────────────

/// Whether an excursion runs on `date` at all. No timezone normalization:
/// the caller is expected to have already resolved the intended local day.
pub fn is_date_available(date: NaiveDate, selection: &DaySelection) -> bool {
    selection.allows(date.weekday())
}

/// Parse a departure time, accepting `HH:MM` and `HH:MM:SS`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Whether `time` falls inside one of the configured windows (half-open).
/// No configured windows means any departure time is accepted. Windows with
/// unparseable bounds are skipped rather than matched.
pub fn slot_is_offered(slots: &[TimeSlot], time: NaiveTime) -> bool {
    if slots.is_empty() {
        return true;
    }
    slots.iter().any(|slot| {
        match (parse_time(&slot.start), parse_time(&slot.end)) {
            (Some(start), Some(end)) => start <= time && time < end,
            _ => false,
        }
    })
}
