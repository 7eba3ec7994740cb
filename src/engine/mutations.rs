use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

fn validate_excursion_id(id: &str) -> Result<(), EngineError> {
    if id.trim().is_empty() {
        return Err(EngineError::Invalid("excursion id must not be empty"));
    }
    if id.len() > MAX_EXCURSION_ID_LEN {
        return Err(EngineError::LimitExceeded("excursion id too long"));
    }
    Ok(())
}

fn validate_config(config: &ExcursionConfig) -> Result<(), EngineError> {
    validate_excursion_id(&config.id)?;
    if let Some(ref name) = config.name
        && name.texts().iter().any(|t| t.len() > MAX_NAME_LEN)
    {
        return Err(EngineError::LimitExceeded("excursion name too long"));
    }
    if config.time_slots.len() > MAX_TIME_SLOTS {
        return Err(EngineError::LimitExceeded("too many time slots"));
    }
    Ok(())
}

fn validate_ceiling(max_capacity: u32) -> Result<(), EngineError> {
    if max_capacity == 0 {
        return Err(EngineError::Invalid("max capacity must be positive"));
    }
    if max_capacity > MAX_SEATS_PER_DAY {
        return Err(EngineError::LimitExceeded("max capacity too large"));
    }
    Ok(())
}

fn validate_seats(seats: u32) -> Result<(), EngineError> {
    if seats == 0 {
        return Err(EngineError::Invalid("seat count must be positive"));
    }
    if seats > MAX_PARTY_SIZE {
        return Err(EngineError::LimitExceeded("party too large"));
    }
    Ok(())
}

impl Engine {
    pub async fn register_excursion(&self, config: ExcursionConfig) -> Result<(), EngineError> {
        validate_config(&config)?;
        if self.configs.len() >= MAX_EXCURSIONS {
            return Err(EngineError::LimitExceeded("too many excursions"));
        }
        if self.configs.contains_key(&config.id) {
            return Err(EngineError::AlreadyRegistered(config.id));
        }

        let event = Event::ExcursionRegistered {
            id: config.id.clone(),
            name: config.name.clone(),
            available_days: config.available_days.clone(),
            time_slots: config.time_slots.clone(),
        };
        self.wal_append(&event).await?;
        self.notify.send(&config.id, &event);
        self.configs.insert(config.id.clone(), config);
        metrics::gauge!(crate::observability::EXCURSIONS_ACTIVE).set(self.configs.len() as f64);
        Ok(())
    }

    pub async fn update_excursion(&self, config: ExcursionConfig) -> Result<(), EngineError> {
        validate_config(&config)?;
        if !self.configs.contains_key(&config.id) {
            return Err(EngineError::UnknownExcursion(config.id));
        }

        let event = Event::ExcursionUpdated {
            id: config.id.clone(),
            name: config.name.clone(),
            available_days: config.available_days.clone(),
            time_slots: config.time_slots.clone(),
        };
        self.wal_append(&event).await?;
        self.notify.send(&config.id, &event);
        self.configs.insert(config.id.clone(), config);
        Ok(())
    }

    /// Drop an excursion's configuration. Its capacity records are kept:
    /// records are never deleted, and checks against them fall back to the
    /// no-restrictions rule set.
    pub async fn remove_excursion(&self, id: &str) -> Result<(), EngineError> {
        if !self.configs.contains_key(id) {
            return Err(EngineError::UnknownExcursion(id.to_string()));
        }
        let event = Event::ExcursionRemoved { id: id.to_string() };
        self.wal_append(&event).await?;
        self.configs.remove(id);
        self.notify.send(id, &event);
        self.notify.remove(id);
        metrics::gauge!(crate::observability::EXCURSIONS_ACTIVE).set(self.configs.len() as f64);
        Ok(())
    }

    /// Open capacity records for every date in the inclusive range, skipping
    /// dates that already have one. Idempotent: a re-run never duplicates or
    /// overwrites.
    pub async fn bulk_open(
        &self,
        excursion_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        max_capacity: u32,
        is_available: bool,
    ) -> Result<BulkOutcome, EngineError> {
        validate_excursion_id(excursion_id)?;
        validate_ceiling(max_capacity)?;
        if end < start {
            return Err(EngineError::Invalid("end date before start date"));
        }
        let span_days = (end - start).num_days() + 1;
        if span_days > MAX_BULK_RANGE_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }

        let book = self.book_or_create(excursion_id);
        let mut guard = book.write().await;

        let missing = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !guard.days.contains_key(d))
            .count();
        if guard.days.len() + missing > MAX_DAYS_PER_EXCURSION {
            return Err(EngineError::LimitExceeded("too many capacity records"));
        }

        let mut outcome = BulkOutcome {
            created: 0,
            skipped: 0,
            records: Vec::with_capacity(missing),
        };
        for date in start.iter_days().take_while(|d| *d <= end) {
            if guard.days.contains_key(&date) {
                outcome.skipped += 1;
                continue;
            }
            let event = Event::CapacityOpened {
                excursion_id: guard.excursion_id.clone(),
                date,
                max_capacity,
                is_available,
            };
            self.persist_and_apply(&mut guard, &event).await?;
            outcome
                .records
                .push(DayRecord::new(date, &CapacityRecord::new(max_capacity, is_available)));
            outcome.created += 1;
        }

        metrics::counter!(crate::observability::BULK_DAYS_CREATED_TOTAL)
            .increment(u64::from(outcome.created));
        Ok(outcome)
    }

    /// Change the ceiling or availability flag of one existing record. The
    /// booked count is untouched; lowering the ceiling below it simply reports
    /// the day as full (negative spots).
    pub async fn set_day(
        &self,
        excursion_id: &str,
        date: NaiveDate,
        max_capacity: u32,
        is_available: bool,
    ) -> Result<DayRecord, EngineError> {
        validate_excursion_id(excursion_id)?;
        validate_ceiling(max_capacity)?;

        let book = self
            .get_book(excursion_id)
            .ok_or_else(|| EngineError::NoSuchDay {
                excursion_id: excursion_id.to_string(),
                date,
            })?;
        let mut guard = book.write().await;
        let existing = guard.record(date).ok_or_else(|| EngineError::NoSuchDay {
            excursion_id: excursion_id.to_string(),
            date,
        })?;

        let event = Event::CapacityUpdated {
            excursion_id: guard.excursion_id.clone(),
            date,
            max_capacity,
            is_available,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let updated = CapacityRecord {
            max_capacity,
            booked: existing.booked,
            is_available,
        };
        Ok(DayRecord::new(date, &updated))
    }

    /// Reserve seats with a conditional increment: the booking is committed
    /// only while holding the record's write lock and only if the new total
    /// fits under the ceiling, so two racing reservations for the last seat
    /// resolve to exactly one winner.
    ///
    /// `Ok(None)` means no capacity record exists for that date — unlimited,
    /// nothing to count against.
    pub async fn reserve(
        &self,
        excursion_id: &str,
        date: NaiveDate,
        seats: u32,
    ) -> Result<Option<DayRecord>, EngineError> {
        validate_excursion_id(excursion_id)?;
        validate_seats(seats)?;

        let Some(book) = self.get_book(excursion_id) else {
            return Ok(None);
        };
        let mut guard = book.write().await;
        let Some(record) = guard.record(date) else {
            return Ok(None);
        };

        if !record.is_available {
            return Err(EngineError::DayClosed { date });
        }
        if u64::from(record.booked) + u64::from(seats) > u64::from(record.max_capacity) {
            metrics::counter!(crate::observability::RESERVATIONS_REJECTED_TOTAL).increment(1);
            return Err(EngineError::SoldOut {
                date,
                requested: seats,
                left: record.spots().max(0) as u32,
            });
        }

        let event = Event::SeatsReserved {
            excursion_id: guard.excursion_id.clone(),
            date,
            seats,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let updated = CapacityRecord {
            booked: record.booked + seats,
            ..record
        };
        Ok(Some(DayRecord::new(date, &updated)))
    }

    /// Give seats back (cancellation). Saturates at zero; releasing against a
    /// date with no record is an accepted no-op, mirroring `reserve`.
    pub async fn release(
        &self,
        excursion_id: &str,
        date: NaiveDate,
        seats: u32,
    ) -> Result<Option<DayRecord>, EngineError> {
        validate_excursion_id(excursion_id)?;
        validate_seats(seats)?;

        let Some(book) = self.get_book(excursion_id) else {
            return Ok(None);
        };
        let mut guard = book.write().await;
        let Some(record) = guard.record(date) else {
            return Ok(None);
        };

        let event = Event::SeatsReleased {
            excursion_id: guard.excursion_id.clone(),
            date,
            seats,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let updated = CapacityRecord {
            booked: record.booked.saturating_sub(seats),
            ..record
        };
        Ok(Some(DayRecord::new(date, &updated)))
    }
}
