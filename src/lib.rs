//! aforo: excursion capacity and availability service.
//!
//! Per-day seat ledgers keyed by (excursion, date), a weekday/time-slot
//! rule evaluator, and an atomic reserve path, persisted through a
//! write-ahead log and served over HTTP.

pub mod api;
pub mod auth;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;
