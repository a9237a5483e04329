//! Scheduling & enrollment consistency core for a tutoring marketplace.
//!
//! Teachers publish availability slots, students hold package enrollments, and the booking
//! state machine turns one slot and one enrollment credit into a durable, non-conflicting
//! booking. Completed bookings are archived as immutable class records.

#![deny(
    // Correctness
    unsafe_code,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Error paths must propagate, not abort
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::dbg_macro,
    clippy::float_cmp,
    clippy::clone_on_ref_ptr,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

// `missing_docs` stays a warning: `DeriveEntityModel` generates undocumented items.

/// Configuration management for database and application settings
pub mod config;
/// Core business logic - ledgers, booking state machine, catalog and archive
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Acting user and role dispatch
pub mod identity;
/// Periodic maintenance entry points for external schedulers
pub mod maintenance;
/// Role-checked service façade over the core
pub mod service;

pub use errors::{Error, Result};
pub use identity::{Actor, Role};
pub use service::SchedulingService;

#[cfg(test)]
pub mod test_utils;
