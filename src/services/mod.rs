//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! Every query takes the rider id and filters on it.

pub mod access_code;
pub mod auth_session;
pub mod bike;
pub mod circuit;
pub mod preferences;
pub mod storage;
pub mod sync;
pub mod track_day;
pub mod track_session;
