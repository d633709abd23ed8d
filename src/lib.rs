//! Track-day logbook service: bikes, circuits, track days and sessions with
//! their suspension setups, plus the sag calculator, the session comparator
//! and the offline write queue.

pub mod compare;
pub mod config;
pub mod db;
pub mod form;
pub mod history;
pub mod laptime;
pub mod outbox;
pub mod report;
pub mod routes;
pub mod sag;
pub mod services;
pub mod setup;
pub mod state;
