//! Core business logic - storage-backed scheduling and enrollment operations.
//!
//! Ledger primitives (`reserve`, `release`, `debit`, `credit`, ...) are generic over
//! `ConnectionTrait` so the booking state machine can compose them inside one database
//! transaction. Public transitions take the injected `DatabaseConnection`, open their own
//! transaction, and commit only when every step succeeded.

/// Class record archiver - append-only history of completed classes
pub mod archive;
/// Availability ledger - teacher-published slots and the reserve/release primitive
pub mod availability;
/// Booking state machine - create, confirm, cancel, complete
pub mod booking;
/// Catalog - packages, bundles and teacher offerings
pub mod catalog;
/// Enrollment ledger - purchased class credits
pub mod enrollment;
/// Users and their teacher/student profiles
pub mod users;
