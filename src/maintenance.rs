//! Maintenance pass for stale PENDING bookings.
//!
//! The core never cancels on a timer. An external scheduler calls
//! [`cancel_stale_pending`] periodically; each stale booking goes through the ordinary
//! `cancel_booking` transition.

use crate::{
    core::booking,
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

/// Reason recorded on bookings cancelled by the maintenance pass
pub const STALE_REASON: &str = "stale pending booking";

/// Cancels every PENDING booking created more than `max_age` ago.
///
/// Returns the ids of the bookings cancelled by this call. A booking that was confirmed or
/// cancelled by someone else in the meantime is skipped.
pub async fn cancel_stale_pending(db: &DatabaseConnection, max_age: Duration) -> Result<Vec<i64>> {
    let cutoff = Utc::now()
        .checked_sub_signed(max_age)
        .ok_or_else(|| Error::validation(format!("Stale age {max_age} is out of range")))?;
    let stale = booking::stale_pending(db, cutoff).await?;

    let mut cancelled = Vec::with_capacity(stale.len());
    for candidate in stale {
        match booking::cancel_booking(db, candidate.id, STALE_REASON).await {
            Ok(_) => cancelled.push(candidate.id),
            Err(Error::InvalidTransition { status, .. }) => {
                debug!(booking_id = candidate.id, %status, "Booking moved on; skipping");
            }
            Err(e) => return Err(e),
        }
    }

    info!(count = cancelled.len(), "Stale pending bookings cancelled");
    Ok(cancelled)
}
