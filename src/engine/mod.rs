mod error;
mod mutations;
mod queries;
pub mod rules;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDayBook = Arc<RwLock<DayBook>>;

pub struct Engine {
    /// Registered excursion configurations (day rules, time slots, names).
    /// Replaced wholesale on update, so no per-entry lock is needed.
    pub configs: DashMap<String, ExcursionConfig>,
    /// Per-excursion capacity ledgers.
    pub books: DashMap<String, SharedDayBook>,
    wal: Mutex<Wal>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a day-level event to a ledger (no locking — caller holds the lock).
fn apply_to_book(book: &mut DayBook, event: &Event) {
    match event {
        Event::CapacityOpened {
            date,
            max_capacity,
            is_available,
            ..
        } => {
            book.days
                .insert(*date, CapacityRecord {
                    max_capacity: *max_capacity,
                    booked: 0,
                    is_available: *is_available,
                });
        }
        Event::CapacityUpdated {
            date,
            max_capacity,
            is_available,
            ..
        } => {
            if let Some(record) = book.days.get_mut(date) {
                record.max_capacity = *max_capacity;
                record.is_available = *is_available;
            }
        }
        Event::SeatsReserved { date, seats, .. } => {
            if let Some(record) = book.days.get_mut(date) {
                record.booked = record.booked.saturating_add(*seats);
            }
        }
        Event::SeatsReleased { date, seats, .. } => {
            if let Some(record) = book.days.get_mut(date) {
                record.booked = record.booked.saturating_sub(*seats);
            }
        }
        // Registry events are handled at the DashMap level, not here
        Event::ExcursionRegistered { .. }
        | Event::ExcursionUpdated { .. }
        | Event::ExcursionRemoved { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;

        let engine = Self {
            configs: DashMap::new(),
            books: DashMap::new(),
            wal: Mutex::new(wal),
            notify,
        };

        // Replay — we are the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never blocking_write here: this may run inside
        // an async context.
        for event in &events {
            match event {
                Event::ExcursionRegistered {
                    id,
                    name,
                    available_days,
                    time_slots,
                }
                | Event::ExcursionUpdated {
                    id,
                    name,
                    available_days,
                    time_slots,
                } => {
                    engine.configs.insert(id.clone(), ExcursionConfig {
                        id: id.clone(),
                        name: name.clone(),
                        available_days: available_days.clone(),
                        time_slots: time_slots.clone(),
                    });
                }
                Event::ExcursionRemoved { id } => {
                    engine.configs.remove(id);
                }
                other => {
                    if let Some(excursion_id) = other.excursion_id() {
                        let book = engine.book_or_create(excursion_id);
                        let mut guard =
                            book.try_write().expect("replay: uncontended write");
                        apply_to_book(&mut guard, other);
                    }
                }
            }
        }

        Ok(engine)
    }

    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let mut wal = self.wal.lock().await;
        wal.append(event)
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_book(&self, excursion_id: &str) -> Option<SharedDayBook> {
        self.books.get(excursion_id).map(|e| e.value().clone())
    }

    pub(super) fn book_or_create(&self, excursion_id: &str) -> SharedDayBook {
        self.books
            .entry(excursion_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(DayBook::new(excursion_id.to_string()))))
            .clone()
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        book: &mut DayBook,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_book(book, event);
        self.notify.send(&book.excursion_id, event);
        Ok(())
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    ///
    /// Takes the WAL lock first, then snapshots ledgers with `try_read`; a
    /// contended ledger means a mutation is mid-flight waiting on the WAL
    /// lock, so the whole pass is abandoned and retried next round (taking
    /// the locks in the other order would deadlock).
    pub async fn compact_wal(&self) -> Result<bool, EngineError> {
        let mut wal = self.wal.lock().await;

        let mut events = Vec::new();
        for entry in self.configs.iter() {
            let c = entry.value();
            events.push(Event::ExcursionRegistered {
                id: c.id.clone(),
                name: c.name.clone(),
                available_days: c.available_days.clone(),
                time_slots: c.time_slots.clone(),
            });
        }

        let books: Vec<SharedDayBook> = self.books.iter().map(|e| e.value().clone()).collect();
        for book in &books {
            let Ok(guard) = book.try_read() else {
                tracing::debug!("compaction skipped: ledger busy");
                return Ok(false);
            };
            for (date, record) in &guard.days {
                events.push(Event::CapacityOpened {
                    excursion_id: guard.excursion_id.clone(),
                    date: *date,
                    max_capacity: record.max_capacity,
                    is_available: record.is_available,
                });
                if record.booked > 0 {
                    events.push(Event::SeatsReserved {
                        excursion_id: guard.excursion_id.clone(),
                        date: *date,
                        seats: record.booked,
                    });
                }
            }
        }

        wal.compact(&events)
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        Ok(true)
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }
}
