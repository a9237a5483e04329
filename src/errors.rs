//! Unified error types for the scheduling core.
//!
//! Every failure is reported synchronously to the caller. Only [`Error::Transient`] is
//! eligible for automatic retry; all other kinds describe a caller mistake or a lost race.

use crate::entities::{BookingStatus, Role};
use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// Every failure the scheduling core reports
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed slot, time or catalog input
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The requested class time does not fit inside the availability window
    #[error("Schedule mismatch for availability {availability_id}: {message}")]
    ScheduleMismatch {
        availability_id: i64,
        message: String,
    },

    /// The student holds no active enrollment with a remaining credit for the package
    #[error("No eligible enrollment for student {student_id} in package {package_id}")]
    NoEligibleEnrollment { student_id: i64, package_id: i64 },

    /// The teacher does not offer the package
    #[error("Teacher {teacher_id} does not offer package {package_id}")]
    NotOffered { teacher_id: i64, package_id: i64 },

    /// The slot is already held; retry against a different slot, never this one
    #[error("Availability slot {availability_id} is unavailable")]
    SlotUnavailable { availability_id: i64 },

    /// The booking state machine does not allow this operation from the current state
    #[error("Cannot {action} booking {booking_id} in state {status}")]
    InvalidTransition {
        booking_id: i64,
        status: BookingStatus,
        action: &'static str,
    },

    /// Completion was requested before the class ended
    #[error("Booking {booking_id} has not ended yet (ends at {ends_at})")]
    ClassInProgress {
        booking_id: i64,
        ends_at: chrono::DateTime<chrono::Utc>,
    },

    /// Storage contention or connectivity failure; retry with backoff
    #[error("Transient storage error: {0}")]
    Transient(DbErr),

    #[error("User not found: {id}")]
    UserNotFound { id: i64 },

    #[error("No {kind} profile for user {user_id}")]
    ProfileNotFound { kind: &'static str, user_id: i64 },

    #[error("Availability slot not found: {id}")]
    AvailabilityNotFound { id: i64 },

    #[error("Booking not found: {id}")]
    BookingNotFound { id: i64 },

    #[error("Enrollment not found: {id}")]
    EnrollmentNotFound { id: i64 },

    #[error("Package not found: {id}")]
    PackageNotFound { id: i64 },

    #[error("Bundle not found: {id}")]
    BundleNotFound { id: i64 },

    /// The acting user's role does not permit the operation
    #[error("{role:?} user {user_id} may not {action}")]
    Forbidden {
        user_id: i64,
        role: Role,
        action: &'static str,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl Error {
    /// Whether the caller should retry the whole operation with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// SQLite reports lock contention through the error message rather than a typed code.
fn is_busy(err: &RuntimeErr) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.contains("database is locked") || text.contains("database is busy")
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        match &value {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::Transient(value),
            DbErr::Exec(e) | DbErr::Query(e) if is_busy(e) => Self::Transient(value),
            _ => Self::Database(value),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
