//! Availability ledger - teacher-published time slots.
//!
//! A slot is free or held. [`reserve`] and [`release`] are single conditional updates on
//! the `is_reserved` flag, so two callers racing for the same slot serialize on that row
//! while callers on different slots never contend.

use crate::{
    entities::{Availability, Booking, BookingStatus, TeacherProfile, availability, booking},
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, warn};

/// Publishes a new slot for a teacher.
///
/// Fails with `Validation` when `start_time >= end_time`, when the teacher is unknown, or
/// when the slot overlaps another slot of the same teacher.
pub async fn publish(
    db: &DatabaseConnection,
    teacher_id: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> Result<availability::Model> {
    if start_time >= end_time {
        return Err(Error::validation(format!(
            "Slot start {start_time} must be before end {end_time}"
        )));
    }

    let txn = db.begin().await?;

    TeacherProfile::find_by_id(teacher_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::validation(format!("Unknown teacher {teacher_id}")))?;

    let same_day = Availability::find()
        .filter(availability::Column::TeacherId.eq(teacher_id))
        .filter(availability::Column::Date.eq(date))
        .all(&txn)
        .await?;
    if let Some(clash) = same_day
        .iter()
        .find(|slot| slot.overlaps(date, start_time, end_time))
    {
        return Err(Error::validation(format!(
            "Slot {date} {start_time}-{end_time} overlaps slot {} ({}-{})",
            clash.id, clash.start_time, clash.end_time
        )));
    }

    let slot = availability::ActiveModel {
        teacher_id: Set(teacher_id),
        date: Set(date),
        start_time: Set(start_time),
        end_time: Set(end_time),
        is_reserved: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        availability_id = slot.id,
        teacher_id, "Published slot {date} {start_time}-{end_time}"
    );
    Ok(slot)
}

/// Finds a slot by id.
pub async fn get_slot<C>(db: &C, availability_id: i64) -> Result<availability::Model>
where
    C: ConnectionTrait,
{
    Availability::find_by_id(availability_id)
        .one(db)
        .await?
        .ok_or(Error::AvailabilityNotFound {
            id: availability_id,
        })
}

/// Marks a free slot as held.
///
/// Returns `false` without error when the slot is already held; this is the single point
/// that decides which of several concurrent bookings gets the slot.
pub async fn reserve<C>(db: &C, availability_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Availability::update_many()
        .col_expr(availability::Column::IsReserved, Expr::value(true))
        .filter(availability::Column::Id.eq(availability_id))
        .filter(availability::Column::IsReserved.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        debug!(availability_id, "Slot reserved");
        return Ok(true);
    }

    // Distinguish "held" from "missing"
    get_slot(db, availability_id).await?;
    debug!(availability_id, "Slot already held");
    Ok(false)
}

/// Returns a held slot to free, but only when no live booking references it.
///
/// Returns whether the slot was freed by this call.
pub async fn release<C>(db: &C, availability_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let live = Booking::find()
        .filter(booking::Column::AvailabilityId.eq(availability_id))
        .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
        .count(db)
        .await?;
    if live > 0 {
        warn!(availability_id, live, "Not releasing slot still held by a booking");
        return Ok(false);
    }

    let result = Availability::update_many()
        .col_expr(availability::Column::IsReserved, Expr::value(false))
        .filter(availability::Column::Id.eq(availability_id))
        .filter(availability::Column::IsReserved.eq(true))
        .exec(db)
        .await?;

    let released = result.rows_affected == 1;
    if released {
        debug!(availability_id, "Slot released");
    }
    Ok(released)
}

/// Deletes a free slot that has never been booked.
///
/// Fails with `SlotUnavailable` when the slot is held and `Validation` when cancelled
/// bookings still reference it.
pub async fn withdraw(db: &DatabaseConnection, availability_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let slot = get_slot(&txn, availability_id).await?;
    if slot.is_reserved {
        return Err(Error::SlotUnavailable { availability_id });
    }

    let history = Booking::find()
        .filter(booking::Column::AvailabilityId.eq(availability_id))
        .count(&txn)
        .await?;
    if history > 0 {
        return Err(Error::validation(format!(
            "Slot {availability_id} has booking history and cannot be withdrawn"
        )));
    }

    let result = Availability::delete_many()
        .filter(availability::Column::Id.eq(availability_id))
        .filter(availability::Column::IsReserved.eq(false))
        .exec(&txn)
        .await?;
    if result.rows_affected != 1 {
        return Err(Error::SlotUnavailable { availability_id });
    }

    txn.commit().await?;
    info!(availability_id, teacher_id = slot.teacher_id, "Withdrew slot");
    Ok(())
}

/// Free slots of a teacher on or after `from`, in chronological order.
pub async fn free_slots(
    db: &DatabaseConnection,
    teacher_id: i64,
    from: NaiveDate,
) -> Result<Vec<availability::Model>> {
    Availability::find()
        .filter(availability::Column::TeacherId.eq(teacher_id))
        .filter(availability::Column::IsReserved.eq(false))
        .filter(availability::Column::Date.gte(from))
        .order_by_asc(availability::Column::Date)
        .order_by_asc(availability::Column::StartTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every slot of a teacher, free or held, in chronological order.
pub async fn slots_for_teacher(
    db: &DatabaseConnection,
    teacher_id: i64,
) -> Result<Vec<availability::Model>> {
    Availability::find()
        .filter(availability::Column::TeacherId.eq(teacher_id))
        .order_by_asc(availability::Column::Date)
        .order_by_asc(availability::Column::StartTime)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_publish_rejects_inverted_window() -> Result<()> {
        let db = setup_test_db().await?;

        let result = publish(&db, 1, day(2024, 6, 10), hm(10, 0), hm(9, 0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = publish(&db, 1, day(2024, 6, 10), hm(9, 0), hm(9, 0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_rejects_overlap() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, teacher_id) = create_test_teacher(&db, "teacher1").await?;
        let (_, other_teacher) = create_test_teacher(&db, "teacher2").await?;
        let date = day(2024, 6, 10);

        publish(&db, teacher_id, date, hm(9, 0), hm(10, 0)).await?;

        let overlap = publish(&db, teacher_id, date, hm(9, 30), hm(10, 30)).await;
        assert!(matches!(overlap, Err(Error::Validation { .. })));

        // Touching edges, another day, and another teacher are all fine
        publish(&db, teacher_id, date, hm(10, 0), hm(11, 0)).await?;
        publish(&db, teacher_id, day(2024, 6, 11), hm(9, 0), hm(10, 0)).await?;
        publish(&db, other_teacher, date, hm(9, 0), hm(10, 0)).await?;

        assert_eq!(slots_for_teacher(&db, teacher_id).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_unknown_teacher() -> Result<()> {
        let db = setup_test_db().await?;
        let result = publish(&db, 42, day(2024, 6, 10), hm(9, 0), hm(10, 0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_is_compare_and_set() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, teacher_id) = create_test_teacher(&db, "teacher1").await?;
        let slot = create_test_slot(&db, teacher_id, day(2024, 6, 10)).await?;

        assert!(reserve(&db, slot.id).await?);
        assert!(!reserve(&db, slot.id).await?);
        assert!(get_slot(&db, slot.id).await?.is_reserved);

        assert!(matches!(
            reserve(&db, 999).await,
            Err(Error::AvailabilityNotFound { id: 999 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_release_frees_unreferenced_slot() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, teacher_id) = create_test_teacher(&db, "teacher1").await?;
        let slot = create_test_slot(&db, teacher_id, day(2024, 6, 10)).await?;

        // Releasing a free slot changes nothing
        assert!(!release(&db, slot.id).await?);

        reserve(&db, slot.id).await?;
        assert!(release(&db, slot.id).await?);
        assert!(!get_slot(&db, slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_release_keeps_slot_with_live_booking() -> Result<()> {
        let scenario = setup_bookable().await?;
        let db = &scenario.db;
        crate::core::booking::create_booking(
            db,
            scenario.student_user_id,
            scenario.slot.id,
            scenario.package.id,
            at(2024, 6, 10, 9, 0),
            60,
        )
        .await?;

        assert!(!release(db, scenario.slot.id).await?);
        assert!(get_slot(db, scenario.slot.id).await?.is_reserved);
        Ok(())
    }

    #[tokio::test]
    async fn test_free_slots_and_withdraw() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, teacher_id) = create_test_teacher(&db, "teacher1").await?;
        let past = create_test_slot(&db, teacher_id, day(2024, 6, 1)).await?;
        let held = create_test_slot(&db, teacher_id, day(2024, 6, 10)).await?;
        let free = create_test_slot(&db, teacher_id, day(2024, 6, 11)).await?;
        reserve(&db, held.id).await?;

        let slots = free_slots(&db, teacher_id, day(2024, 6, 5)).await?;
        assert_eq!(slots.iter().map(|s| s.id).collect::<Vec<_>>(), vec![free.id]);

        assert!(matches!(
            withdraw(&db, held.id).await,
            Err(Error::SlotUnavailable { .. })
        ));
        withdraw(&db, past.id).await?;
        assert!(matches!(
            get_slot(&db, past.id).await,
            Err(Error::AvailabilityNotFound { .. })
        ));
        Ok(())
    }
}
