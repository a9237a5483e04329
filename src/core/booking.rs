//! Booking state machine - turns a free slot and an enrollment credit into a booking.
//!
//! ```text
//! PENDING --confirm--> CONFIRMED --complete--> COMPLETED
//!    |                     |
//!    +------cancel---------+-----> CANCELLED
//! ```
//!
//! Each transition runs in one database transaction. Booking rows move with a
//! compare-and-set on `(status, payment_status)`, so a transition that lost a race fails
//! with `InvalidTransition` and every write it already made is rolled back with it.

use crate::{
    core::{archive, availability, catalog, enrollment, users},
    entities::{
        Booking, BookingStatus, PaymentStatus, availability as slot, booking, class_metadata,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    DatabaseTransaction, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info, instrument, warn};

/// Checks that `[scheduled_at, scheduled_at + duration)` lies inside the slot.
fn check_window(slot: &slot::Model, scheduled_at: DateTime<Utc>, duration: i32) -> Result<()> {
    let start = scheduled_at.naive_utc();
    let end = start + Duration::minutes(i64::from(duration));

    if start < slot.starts_at() || end > slot.ends_at() {
        return Err(Error::ScheduleMismatch {
            availability_id: slot.id,
            message: format!(
                "class {start} to {end} is outside slot {} to {}",
                slot.starts_at(),
                slot.ends_at()
            ),
        });
    }
    Ok(())
}

/// Finds a booking by id.
pub async fn get_booking<C>(db: &C, booking_id: i64) -> Result<booking::Model>
where
    C: ConnectionTrait,
{
    Booking::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or(Error::BookingNotFound { id: booking_id })
}

/// Moves a booking from `from` to the state in `update`, only if nobody moved it first.
async fn compare_and_set(
    txn: &DatabaseTransaction,
    from: &booking::Model,
    update: sea_orm::UpdateMany<Booking>,
    action: &'static str,
) -> Result<()> {
    let result = update
        .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(booking::Column::Id.eq(from.id))
        .filter(booking::Column::Status.eq(from.status))
        .filter(booking::Column::PaymentStatus.eq(from.payment_status))
        .exec(txn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let current = get_booking(txn, from.id).await?;
    warn!(
        booking_id = from.id,
        "Booking changed concurrently while trying to {action}"
    );
    Err(Error::InvalidTransition {
        booking_id: from.id,
        status: current.status,
        action,
    })
}

/// Creates a PENDING booking for `student_id` (a user id) on a slot.
///
/// In order: the class must fit the slot (`ScheduleMismatch`), the student needs an
/// ACTIVE enrollment with a credit left (`NoEligibleEnrollment`), the slot's teacher must
/// offer the package (`NotOffered`), and the slot must still be free (`SlotUnavailable`).
/// No credit is debited until the booking is confirmed.
#[instrument(skip(db))]
pub async fn create_booking(
    db: &DatabaseConnection,
    student_id: i64,
    availability_id: i64,
    package_id: i64,
    scheduled_at: DateTime<Utc>,
    duration: i32,
) -> Result<booking::Model> {
    if duration <= 0 {
        return Err(Error::validation(format!(
            "Class duration must be positive, got {duration} minutes"
        )));
    }

    let txn = db.begin().await?;

    let slot = availability::get_slot(&txn, availability_id).await?;
    check_window(&slot, scheduled_at, duration)?;

    let no_enrollment = || Error::NoEligibleEnrollment {
        student_id,
        package_id,
    };
    let profile = users::student_profile_for_user(&txn, student_id)
        .await?
        .ok_or_else(no_enrollment)?;
    enrollment::find_active_for(&txn, profile.id, package_id)
        .await?
        .ok_or_else(no_enrollment)?;

    if !catalog::is_offered_by(&txn, slot.teacher_id, package_id).await? {
        return Err(Error::NotOffered {
            teacher_id: slot.teacher_id,
            package_id,
        });
    }

    if !availability::reserve(&txn, availability_id).await? {
        debug!(availability_id, "Lost the race for slot");
        return Err(Error::SlotUnavailable { availability_id });
    }

    let now = Utc::now();
    let booking = booking::ActiveModel {
        user_id: Set(student_id),
        teacher_id: Set(slot.teacher_id),
        availability_id: Set(availability_id),
        package_id: Set(Some(package_id)),
        enrollment_id: Set(None),
        scheduled_at: Set(scheduled_at),
        duration: Set(duration),
        status: Set(BookingStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        exhausted_enrollment: Set(false),
        cancel_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => Error::SlotUnavailable { availability_id },
        _ => e.into(),
    })?;

    txn.commit().await?;
    info!(booking_id = booking.id, "Booking created (PENDING)");
    Ok(booking)
}

/// Confirms a PENDING booking once the payment processor reports success.
///
/// Payment becomes PAID and one credit is debited from the student's enrollment for the
/// booked package; if that was the last credit the enrollment becomes EXPIRED.
#[instrument(skip(db))]
pub async fn confirm_booking(db: &DatabaseConnection, booking_id: i64) -> Result<booking::Model> {
    let txn = db.begin().await?;

    let booking = get_booking(&txn, booking_id).await?;
    if booking.status != BookingStatus::Pending {
        return Err(Error::InvalidTransition {
            booking_id,
            status: booking.status,
            action: "confirm",
        });
    }
    let package_id = booking.package_id.ok_or_else(|| {
        Error::validation(format!("Booking {booking_id} has no package to debit"))
    })?;

    let no_enrollment = || Error::NoEligibleEnrollment {
        student_id: booking.user_id,
        package_id,
    };
    let profile = users::student_profile_for_user(&txn, booking.user_id)
        .await?
        .ok_or_else(no_enrollment)?;
    let enrollment = enrollment::find_active_for(&txn, profile.id, package_id)
        .await?
        .ok_or_else(no_enrollment)?;
    if !enrollment::debit(&txn, enrollment.id).await? {
        return Err(no_enrollment());
    }
    let exhausted = enrollment::expire_if_exhausted(&txn, enrollment.id).await?;

    compare_and_set(
        &txn,
        &booking,
        Booking::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Confirmed),
            )
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Paid),
            )
            .col_expr(booking::Column::EnrollmentId, Expr::value(enrollment.id))
            .col_expr(booking::Column::ExhaustedEnrollment, Expr::value(exhausted)),
        "confirm",
    )
    .await?;

    let confirmed = get_booking(&txn, booking_id).await?;
    txn.commit().await?;
    info!(
        enrollment_id = enrollment.id,
        exhausted, "Booking confirmed, credit debited"
    );
    Ok(confirmed)
}

/// Records a failed payment attempt on a PENDING booking.
///
/// The booking stays PENDING and keeps its slot; a later successful payment may still
/// confirm it, or the caller cancels it.
#[instrument(skip(db))]
pub async fn record_payment_failure(
    db: &DatabaseConnection,
    booking_id: i64,
) -> Result<booking::Model> {
    let txn = db.begin().await?;

    let booking = get_booking(&txn, booking_id).await?;
    if booking.status != BookingStatus::Pending {
        return Err(Error::InvalidTransition {
            booking_id,
            status: booking.status,
            action: "record a payment failure for",
        });
    }

    compare_and_set(
        &txn,
        &booking,
        Booking::update_many().col_expr(
            booking::Column::PaymentStatus,
            Expr::value(PaymentStatus::Failed),
        ),
        "record a payment failure for",
    )
    .await?;

    let updated = get_booking(&txn, booking_id).await?;
    txn.commit().await?;
    info!("Payment failure recorded");
    Ok(updated)
}

/// Cancels a PENDING or CONFIRMED booking.
///
/// The slot is released. A CONFIRMED booking gives its credit back, reverting the
/// enrollment to ACTIVE if this booking's debit had expired it, and a PAID payment
/// becomes REFUNDED.
#[instrument(skip(db))]
pub async fn cancel_booking(
    db: &DatabaseConnection,
    booking_id: i64,
    reason: &str,
) -> Result<booking::Model> {
    let txn = db.begin().await?;

    let booking = get_booking(&txn, booking_id).await?;
    if booking.status.is_terminal() {
        return Err(Error::InvalidTransition {
            booking_id,
            status: booking.status,
            action: "cancel",
        });
    }

    let payment_status = if booking.payment_status == PaymentStatus::Paid {
        PaymentStatus::Refunded
    } else {
        booking.payment_status
    };
    let reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());

    compare_and_set(
        &txn,
        &booking,
        Booking::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Cancelled),
            )
            .col_expr(booking::Column::PaymentStatus, Expr::value(payment_status))
            .col_expr(booking::Column::CancelReason, Expr::value(reason)),
        "cancel",
    )
    .await?;

    if !availability::release(&txn, booking.availability_id).await? {
        warn!(
            availability_id = booking.availability_id,
            "Slot was not held at cancellation"
        );
    }

    if booking.status == BookingStatus::Confirmed {
        if let Some(enrollment_id) = booking.enrollment_id {
            if enrollment::credit(&txn, enrollment_id).await? {
                debug!(enrollment_id, "Credit restored");
            } else {
                warn!(enrollment_id, "No used credit to restore at cancellation");
            }
            if booking.exhausted_enrollment {
                enrollment::reactivate(&txn, enrollment_id).await?;
            }
        }
    }

    let cancelled = get_booking(&txn, booking_id).await?;
    txn.commit().await?;
    info!(from = %booking.status, "Booking cancelled");
    Ok(cancelled)
}

/// Completes a CONFIRMED booking whose class has ended and archives the class record.
///
/// Calling it again on a COMPLETED booking returns the record that already exists.
pub async fn complete_booking(
    db: &DatabaseConnection,
    booking_id: i64,
) -> Result<class_metadata::Model> {
    complete_booking_at(db, booking_id, Utc::now()).await
}

/// [`complete_booking`] with an explicit current time.
#[instrument(skip(db))]
pub async fn complete_booking_at(
    db: &DatabaseConnection,
    booking_id: i64,
    now: DateTime<Utc>,
) -> Result<class_metadata::Model> {
    let txn = db.begin().await?;

    let booking = get_booking(&txn, booking_id).await?;
    match booking.status {
        BookingStatus::Completed => {
            let record = match archive::record_for_booking(&txn, booking_id).await? {
                Some(record) => record,
                None => archive::archive(&txn, &booking).await?,
            };
            txn.commit().await?;
            debug!("Booking already completed");
            return Ok(record);
        }
        BookingStatus::Confirmed => {}
        BookingStatus::Pending | BookingStatus::Cancelled => {
            return Err(Error::InvalidTransition {
                booking_id,
                status: booking.status,
                action: "complete",
            });
        }
    }

    let ends_at = booking.ends_at();
    if now < ends_at {
        return Err(Error::ClassInProgress {
            booking_id,
            ends_at,
        });
    }

    compare_and_set(
        &txn,
        &booking,
        Booking::update_many().col_expr(
            booking::Column::Status,
            Expr::value(BookingStatus::Completed),
        ),
        "complete",
    )
    .await?;

    let completed = get_booking(&txn, booking_id).await?;
    let record = archive::archive(&txn, &completed).await?;
    txn.commit().await?;
    info!(class_id = record.id, "Booking completed");
    Ok(record)
}

/// Bookings made by a student user, in schedule order.
pub async fn bookings_for_student(
    db: &DatabaseConnection,
    student_id: i64,
) -> Result<Vec<booking::Model>> {
    Booking::find()
        .filter(booking::Column::UserId.eq(student_id))
        .order_by_asc(booking::Column::ScheduledAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Bookings taught by a teacher profile, in schedule order.
pub async fn bookings_for_teacher(
    db: &DatabaseConnection,
    teacher_id: i64,
) -> Result<Vec<booking::Model>> {
    Booking::find()
        .filter(booking::Column::TeacherId.eq(teacher_id))
        .order_by_asc(booking::Column::ScheduledAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// PENDING bookings created before `cutoff`, oldest first.
pub async fn stale_pending(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<booking::Model>> {
    Booking::find()
        .filter(booking::Column::Status.eq(BookingStatus::Pending))
        .filter(booking::Column::CreatedAt.lt(cutoff))
        .order_by_asc(booking::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::availability::get_slot;
    use crate::core::catalog::offer_package;
    use crate::core::enrollment::{debit, get_enrollment};
    use crate::entities::{ClassMetadata, EnrollmentStatus, StudentEnrollment, student_enrollment};
    use crate::test_utils::*;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    async fn book(scenario: &Bookable) -> Result<booking::Model> {
        create_booking(
            &scenario.db,
            scenario.student_user_id,
            scenario.slot.id,
            scenario.package.id,
            at(2024, 6, 10, 9, 0),
            60,
        )
        .await
    }

    #[tokio::test]
    async fn test_create_booking_rejects_bad_duration() -> Result<()> {
        let db = setup_test_db().await?;
        for duration in [0, -30] {
            let result = create_booking(&db, 1, 1, 1, at(2024, 6, 10, 9, 0), duration).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_book_confirm_then_slot_is_taken() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;

        let booking = book(&scenario).await?;
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.teacher_id, scenario.teacher_id);
        // Creation holds the slot but does not spend a credit
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 2);

        let confirmed = confirm_booking(db, booking.id).await?;
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.enrollment_id, Some(scenario.enrollment.id));
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 3);
        assert!(get_slot(db, scenario.slot.id).await?.is_reserved);

        let again = book(&scenario).await;
        assert!(matches!(
            again,
            Err(Error::SlotUnavailable { availability_id }) if availability_id == scenario.slot.id
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_enrollment_cannot_book() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, teacher_id) = create_test_teacher(&db, "teacher1").await?;
        let (student_user_id, student_id) = create_test_student(&db, "student1").await?;
        let package = create_test_package(&db, "Math 10").await?;
        offer_package(&db, teacher_id, package.id).await?;
        create_custom_enrollment(&db, student_id, package.id, 1, 1).await?;
        let slot = create_test_slot(&db, teacher_id, day(2024, 6, 10)).await?;

        let result = create_booking(
            &db,
            student_user_id,
            slot.id,
            package.id,
            at(2024, 6, 10, 9, 0),
            60,
        )
        .await;
        assert!(matches!(result, Err(Error::NoEligibleEnrollment { .. })));
        assert!(!get_slot(&db, slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_must_fit_slot() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;

        let cases = [
            (at(2024, 6, 11, 9, 0), 60),  // wrong day
            (at(2024, 6, 10, 8, 30), 60), // starts early
            (at(2024, 6, 10, 9, 30), 45), // overruns the end
        ];
        for (scheduled_at, duration) in cases {
            let result = create_booking(
                db,
                scenario.student_user_id,
                scenario.slot.id,
                scenario.package.id,
                scheduled_at,
                duration,
            )
            .await;
            assert!(matches!(result, Err(Error::ScheduleMismatch { .. })));
        }

        // A shorter class inside the window is fine
        create_booking(
            db,
            scenario.student_user_id,
            scenario.slot.id,
            scenario.package.id,
            at(2024, 6, 10, 9, 15),
            45,
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_package_must_be_offered() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let english = create_test_package(db, "English 10").await?;
        create_custom_enrollment(db, scenario.student_id, english.id, 5, 0).await?;

        let result = create_booking(
            db,
            scenario.student_user_id,
            scenario.slot.id,
            english.id,
            at(2024, 6, 10, 9, 0),
            60,
        )
        .await;
        assert!(matches!(result, Err(Error::NotOffered { .. })));
        assert!(!get_slot(db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_slot() -> Result<()> {
        let scenario = setup_bookable().await?;
        let result = create_booking(
            &scenario.db,
            scenario.student_user_id,
            999,
            scenario.package.id,
            at(2024, 6, 10, 9, 0),
            60,
        )
        .await;
        assert!(matches!(result, Err(Error::AvailabilityNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_then_cancel_restores_state() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;

        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;
        let cancelled = cancel_booking(db, booking.id, "student sick").await?;

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("student sick"));
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 2);
        assert!(!get_slot(db, scenario.slot.id).await?.is_reserved);

        // The freed slot can be booked again
        let rebooked = book(&scenario).await?;
        assert_eq!(rebooked.status, BookingStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_confirmed_with_no_used_credit() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;

        // Usage wiped out from under the booking, e.g. by an admin correction
        StudentEnrollment::update_many()
            .col_expr(student_enrollment::Column::ClassesUsed, Expr::value(0))
            .filter(student_enrollment::Column::Id.eq(scenario.enrollment.id))
            .exec(db)
            .await?;

        let cancelled = cancel_booking(db, booking.id, "").await?;
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 0);
        assert!(!get_slot(db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_pending_keeps_credit_and_payment() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;

        let booking = book(&scenario).await?;
        let cancelled = cancel_booking(db, booking.id, "  ").await?;

        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
        assert!(cancelled.cancel_reason.is_none());
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 2);
        assert!(!get_slot(db, scenario.slot.id).await?.is_reserved);

        assert!(matches!(
            cancel_booking(db, booking.id, "again").await,
            Err(Error::InvalidTransition {
                status: BookingStatus::Cancelled,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_last_credit_expires_and_cancel_reactivates() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let enrollment =
            create_custom_enrollment(db, scenario.student_id, scenario.package.id, 3, 2).await?;
        // Use up the scenario enrollment so the nearly exhausted one is picked
        for _ in 0..8 {
            crate::core::enrollment::debit(db, scenario.enrollment.id).await?;
        }

        let booking = book(&scenario).await?;
        let confirmed = confirm_booking(db, booking.id).await?;
        assert_eq!(confirmed.enrollment_id, Some(enrollment.id));
        assert!(confirmed.exhausted_enrollment);
        let after = get_enrollment(db, enrollment.id).await?;
        assert_eq!(after.classes_used, 3);
        assert_eq!(after.status, EnrollmentStatus::Expired);

        cancel_booking(db, booking.id, "").await?;
        let after = get_enrollment(db, enrollment.id).await?;
        assert_eq!(after.classes_used, 2);
        assert_eq!(after.status, EnrollmentStatus::Active);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_confirm_leaves_nothing_behind() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let second_slot = create_test_slot(db, scenario.teacher_id, day(2024, 6, 11)).await?;
        // Leave a single credit
        for _ in 0..7 {
            crate::core::enrollment::debit(db, scenario.enrollment.id).await?;
        }

        let first = book(&scenario).await?;
        let second = create_booking(
            db,
            scenario.student_user_id,
            second_slot.id,
            scenario.package.id,
            at(2024, 6, 11, 9, 0),
            60,
        )
        .await?;

        confirm_booking(db, first.id).await?;
        let result = confirm_booking(db, second.id).await;
        assert!(matches!(result, Err(Error::NoEligibleEnrollment { .. })));

        let second = get_booking(db, second.id).await?;
        assert_eq!(second.status, BookingStatus::Pending);
        assert_eq!(second.payment_status, PaymentStatus::Pending);
        let enrollment = get_enrollment(db, scenario.enrollment.id).await?;
        assert_eq!(enrollment.classes_used, enrollment.classes_total);
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_requires_pending() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;

        assert!(matches!(
            confirm_booking(db, booking.id).await,
            Err(Error::InvalidTransition {
                status: BookingStatus::Confirmed,
                action: "confirm",
                ..
            })
        ));
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 3);
        assert!(matches!(
            confirm_booking(db, 4242).await,
            Err(Error::BookingNotFound { id: 4242 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_failure_then_success() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;

        let failed = record_payment_failure(db, booking.id).await?;
        assert_eq!(failed.status, BookingStatus::Pending);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);

        let confirmed = confirm_booking(db, booking.id).await?;
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert!(matches!(
            record_payment_failure(db, booking.id).await,
            Err(Error::InvalidTransition { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;

        let after_class = at(2024, 6, 10, 10, 0);
        let first = complete_booking_at(db, booking.id, after_class).await?;
        let second = complete_booking_at(db, booking.id, after_class).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(ClassMetadata::find().count(db).await?, 1);

        assert_eq!(first.student_id, scenario.student_user_id);
        assert_eq!(first.teacher_id, scenario.teacher_id);
        assert_eq!(first.date, day(2024, 6, 10));
        assert_eq!(first.start_time, hm(9, 0));
        assert_eq!(first.end_time, hm(10, 0));
        assert_eq!(
            get_booking(db, booking.id).await?.status,
            BookingStatus::Completed
        );
        // A completed class keeps its slot
        assert!(get_slot(db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_before_class_ends() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;

        let result = complete_booking_at(db, booking.id, at(2024, 6, 10, 9, 59)).await;
        assert!(matches!(result, Err(Error::ClassInProgress { .. })));
        assert_eq!(
            get_booking(db, booking.id).await?.status,
            BookingStatus::Confirmed
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_requires_confirmed() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;

        let result = complete_booking_at(db, booking.id, at(2024, 6, 11, 0, 0)).await;
        assert!(matches!(
            result,
            Err(Error::InvalidTransition {
                status: BookingStatus::Pending,
                ..
            })
        ));
        assert_eq!(ClassMetadata::find().count(db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_completed_changes_nothing() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;
        confirm_booking(db, booking.id).await?;
        complete_booking_at(db, booking.id, at(2024, 6, 10, 12, 0)).await?;
        let before = get_booking(db, booking.id).await?;

        let result = cancel_booking(db, booking.id, "too late").await;
        assert!(matches!(
            result,
            Err(Error::InvalidTransition {
                status: BookingStatus::Completed,
                action: "cancel",
                ..
            })
        ));

        assert_eq!(get_booking(db, booking.id).await?, before);
        assert_eq!(get_enrollment(db, scenario.enrollment.id).await?.classes_used, 3);
        assert!(get_slot(db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_on_one_slot() -> Result<()> {
        let (_dir, db) = setup_file_db().await?;
        let scenario = setup_bookable_in(db.clone()).await?;

        let mut students = Vec::new();
        for i in 0..8 {
            let (user_id, profile_id) = create_test_student(&db, &format!("racer{i}")).await?;
            create_custom_enrollment(&db, profile_id, scenario.package.id, 5, 0).await?;
            students.push(user_id);
        }

        let barrier = Arc::new(Barrier::new(students.len()));
        let handles: Vec<_> = students
            .into_iter()
            .map(|student| {
                let db = db.clone();
                let barrier = Arc::clone(&barrier);
                let slot_id = scenario.slot.id;
                let package_id = scenario.package.id;
                tokio::spawn(async move {
                    barrier.wait().await;
                    create_booking(&db, student, slot_id, package_id, at(2024, 6, 10, 9, 0), 60)
                        .await
                })
            })
            .collect();

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(Error::SlotUnavailable { .. }) => lost += 1,
                // Lock contention is reported as retryable, never as a second winner
                Err(e) if e.is_retryable() => lost += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(lost, 7);

        let live = Booking::find()
            .filter(booking::Column::AvailabilityId.eq(scenario.slot.id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
            .count(&db)
            .await?;
        assert_eq!(live, 1);
        assert!(get_slot(&db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_for_last_credit() -> Result<()> {
        let (_dir, db) = setup_file_db().await?;
        let scenario = setup_bookable_in(db.clone()).await?;
        let second_slot = create_test_slot(&db, scenario.teacher_id, day(2024, 6, 11)).await?;

        // Burn credits down to one, then hold two PENDING bookings against it
        for _ in 0..7 {
            assert!(debit(&db, scenario.enrollment.id).await?);
        }
        let first = book(&scenario).await?;
        let second = create_booking(
            &db,
            scenario.student_user_id,
            second_slot.id,
            scenario.package.id,
            at(2024, 6, 11, 9, 0),
            60,
        )
        .await?;

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [first.id, second.id]
            .into_iter()
            .map(|booking_id| {
                let db = db.clone();
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    confirm_booking(&db, booking_id).await
                })
            })
            .collect();

        let mut confirmed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(booking) => confirmed.push(booking),
                Err(Error::NoEligibleEnrollment { .. }) => {}
                Err(e) if e.is_retryable() => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(confirmed.len(), 1);
        assert!(confirmed[0].exhausted_enrollment);

        let enrollment = get_enrollment(&db, scenario.enrollment.id).await?;
        assert_eq!(enrollment.classes_used, enrollment.classes_total);
        assert_eq!(enrollment.status, EnrollmentStatus::Expired);

        let loser = if confirmed[0].id == first.id { second.id } else { first.id };
        assert_eq!(get_booking(&db, loser).await?.status, BookingStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_queries() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        let booking = book(&scenario).await?;

        assert_eq!(bookings_for_student(db, scenario.student_user_id).await?.len(), 1);
        assert_eq!(bookings_for_teacher(db, scenario.teacher_id).await?.len(), 1);
        assert_eq!(
            stale_pending(db, booking.created_at + Duration::seconds(1))
                .await?
                .len(),
            1
        );
        assert!(stale_pending(db, booking.created_at - Duration::seconds(1))
            .await?
            .is_empty());
        Ok(())
    }
}
