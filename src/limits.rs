//! Hard limits on inputs and state growth.

/// Maximum number of calendar days (inclusive) a bulk open may span.
pub const MAX_BULK_RANGE_DAYS: i64 = 365;

/// Maximum number of calendar days (inclusive) a day report may span.
pub const MAX_REPORT_RANGE_DAYS: i64 = 365;

/// Remaining seats at or below this count report status "limited".
pub const LIMITED_SPOTS_THRESHOLD: i64 = 5;

/// Largest party size accepted on a capacity check or reservation.
pub const MAX_PARTY_SIZE: u32 = 100;

/// Largest per-day seat ceiling.
pub const MAX_SEATS_PER_DAY: u32 = 10_000;

pub const MAX_EXCURSIONS: usize = 10_000;

/// Capacity records per excursion (ten years of daily departures).
pub const MAX_DAYS_PER_EXCURSION: usize = 3_650;

pub const MAX_EXCURSION_ID_LEN: usize = 64;

pub const MAX_NAME_LEN: usize = 200;

pub const MAX_TIME_SLOTS: usize = 24;
