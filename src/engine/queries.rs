use chrono::{NaiveDate, NaiveTime};

use crate::limits::*;
use crate::model::*;

use super::rules;
use super::{Engine, EngineError};

impl Engine {
    /// The can-book decision for one (excursion, date, party) triple.
    ///
    /// Deliberately infallible and fail-open: an unregistered excursion has no
    /// day rules, and an absent record means unlimited capacity. The decision
    /// is advisory — `reserve` re-checks under the write lock and is the only
    /// arbiter when two callers race for the last seats.
    pub async fn check(
        &self,
        excursion_id: &str,
        date: NaiveDate,
        party: u32,
        time: Option<NaiveTime>,
    ) -> CapacityDecision {
        let runs = match self.configs.get(excursion_id) {
            Some(cfg) => {
                rules::is_date_available(date, &cfg.available_days)
                    && time.is_none_or(|t| rules::slot_is_offered(&cfg.time_slots, t))
            }
            None => true,
        };

        let record = match self.get_book(excursion_id) {
            Some(book) => book.read().await.record(date),
            None => None,
        };

        match record {
            None => {
                metrics::counter!(crate::observability::CHECKS_FAIL_OPEN_TOTAL).increment(1);
                CapacityDecision {
                    can_book: runs,
                    available_spots: None,
                    availability_status: AvailabilityStatus::Available,
                    has_capacity_limit: false,
                }
            }
            Some(record) => {
                let spots = record.spots();
                CapacityDecision {
                    can_book: runs && record.is_available && spots >= i64::from(party),
                    available_spots: Some(spots),
                    availability_status: record.status(),
                    has_capacity_limit: true,
                }
            }
        }
    }

    /// Per-date rows over an inclusive range, for the admin dashboard.
    /// An excursion with no ledger yields an empty report.
    pub async fn day_report(
        &self,
        excursion_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayRecord>, EngineError> {
        if end < start {
            return Err(EngineError::Invalid("end date before start date"));
        }
        if (end - start).num_days() + 1 > MAX_REPORT_RANGE_DAYS {
            return Err(EngineError::LimitExceeded("report range too wide"));
        }
        let book = match self.get_book(excursion_id) {
            Some(book) => book,
            None => return Ok(Vec::new()),
        };
        let guard = book.read().await;
        Ok(guard
            .in_range(start, end)
            .map(|(date, record)| DayRecord::new(*date, record))
            .collect())
    }

    pub fn get_config(&self, excursion_id: &str) -> Option<ExcursionConfig> {
        self.configs.get(excursion_id).map(|e| e.value().clone())
    }

    pub fn list_excursions(&self) -> Vec<ExcursionConfig> {
        let mut configs: Vec<ExcursionConfig> =
            self.configs.iter().map(|e| e.value().clone()).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }
}
