//! Class record archiver - append-only history of classes that took place.
//!
//! Records are written exactly once, when a booking reaches COMPLETED, and are never
//! updated or deleted. The unique `booking_id` column backs the at-most-once rule.

use crate::{
    entities::{BookingStatus, ClassMetadata, booking, class_metadata},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Appends the class record for a COMPLETED booking.
pub async fn archive<C>(db: &C, booking: &booking::Model) -> Result<class_metadata::Model>
where
    C: ConnectionTrait,
{
    if booking.status != BookingStatus::Completed {
        return Err(Error::InvalidTransition {
            booking_id: booking.id,
            status: booking.status,
            action: "archive",
        });
    }

    let start = booking.scheduled_at.naive_utc();
    let end = booking.ends_at().naive_utc();
    let record = class_metadata::ActiveModel {
        booking_id: Set(booking.id),
        package_id: Set(booking.package_id),
        teacher_id: Set(booking.teacher_id),
        student_id: Set(booking.user_id),
        date: Set(start.date()),
        start_time: Set(start.time()),
        end_time: Set(end.time()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        class_id = record.id,
        booking_id = booking.id,
        "Archived class record"
    );
    Ok(record)
}

/// The class record derived from a booking, if it has been archived.
pub async fn record_for_booking<C>(
    db: &C,
    booking_id: i64,
) -> Result<Option<class_metadata::Model>>
where
    C: ConnectionTrait,
{
    ClassMetadata::find()
        .filter(class_metadata::Column::BookingId.eq(booking_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Classes a student attended, most recent first.
pub async fn history_for_student(
    db: &DatabaseConnection,
    student_user_id: i64,
) -> Result<Vec<class_metadata::Model>> {
    ClassMetadata::find()
        .filter(class_metadata::Column::StudentId.eq(student_user_id))
        .order_by_desc(class_metadata::Column::Date)
        .order_by_desc(class_metadata::Column::StartTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Classes a teacher gave, most recent first.
pub async fn history_for_teacher(
    db: &DatabaseConnection,
    teacher_id: i64,
) -> Result<Vec<class_metadata::Model>> {
    ClassMetadata::find()
        .filter(class_metadata::Column::TeacherId.eq(teacher_id))
        .order_by_desc(class_metadata::Column::Date)
        .order_by_desc(class_metadata::Column::StartTime)
        .all(db)
        .await
        .map_err(Into::into)
}
