//! Enrollment ledger - a student's purchased class credits.
//!
//! Credit counters are only ever changed by conditional `UPDATE` statements that carry the
//! invariant in their `WHERE` clause (`classes_used < classes_total` for a debit,
//! `classes_used > 0` for a credit), so concurrent callers on the same enrollment cannot
//! push it outside `0..=classes_total`.

use crate::{
    core::catalog,
    entities::{EnrollmentStatus, StudentEnrollment, StudentProfile, student_enrollment},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Enrolls a student in a package with `classes_total` credits.
pub async fn enroll(
    db: &DatabaseConnection,
    student_id: i64,
    package_id: i64,
    classes_total: i32,
) -> Result<student_enrollment::Model> {
    if classes_total <= 0 {
        return Err(Error::validation(format!(
            "An enrollment needs at least one class, got {classes_total}"
        )));
    }

    let txn = db.begin().await?;
    let enrollment = insert_enrollment(&txn, student_id, package_id, classes_total).await?;
    txn.commit().await?;

    info!(
        enrollment_id = enrollment.id,
        student_id, package_id, classes_total, "Enrolled student"
    );
    Ok(enrollment)
}

/// Enrolls a student in every member package of a bundle, in one transaction.
pub async fn enroll_in_bundle(
    db: &DatabaseConnection,
    student_id: i64,
    bundle_id: i64,
    classes_per_package: i32,
) -> Result<Vec<student_enrollment::Model>> {
    if classes_per_package <= 0 {
        return Err(Error::validation(format!(
            "An enrollment needs at least one class, got {classes_per_package}"
        )));
    }

    let txn = db.begin().await?;
    let members = catalog::bundle_packages(&txn, bundle_id).await?;

    let mut enrollments = Vec::with_capacity(members.len());
    for package in members {
        enrollments.push(insert_enrollment(&txn, student_id, package.id, classes_per_package).await?);
    }

    txn.commit().await?;
    info!(
        student_id,
        bundle_id,
        count = enrollments.len(),
        "Enrolled student in bundle"
    );
    Ok(enrollments)
}

async fn insert_enrollment<C>(
    db: &C,
    student_id: i64,
    package_id: i64,
    classes_total: i32,
) -> Result<student_enrollment::Model>
where
    C: ConnectionTrait,
{
    StudentProfile::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::validation(format!("Unknown student {student_id}")))?;

    let package = catalog::get_package(db, package_id).await?;
    if !package.is_active {
        return Err(Error::validation(format!(
            "Package '{}' is retired",
            package.name
        )));
    }

    let now = Utc::now();
    student_enrollment::ActiveModel {
        student_id: Set(student_id),
        package_id: Set(package_id),
        classes_total: Set(classes_total),
        classes_used: Set(0),
        status: Set(EnrollmentStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Finds an enrollment by id.
pub async fn get_enrollment<C>(db: &C, enrollment_id: i64) -> Result<student_enrollment::Model>
where
    C: ConnectionTrait,
{
    StudentEnrollment::find_by_id(enrollment_id)
        .one(db)
        .await?
        .ok_or(Error::EnrollmentNotFound { id: enrollment_id })
}

/// The oldest ACTIVE enrollment of a student in a package that still has a credit.
pub async fn find_active_for<C>(
    db: &C,
    student_id: i64,
    package_id: i64,
) -> Result<Option<student_enrollment::Model>>
where
    C: ConnectionTrait,
{
    StudentEnrollment::find()
        .filter(student_enrollment::Column::StudentId.eq(student_id))
        .filter(student_enrollment::Column::PackageId.eq(package_id))
        .filter(student_enrollment::Column::Status.eq(EnrollmentStatus::Active))
        .filter(
            Expr::col(student_enrollment::Column::ClassesUsed)
                .lt(Expr::col(student_enrollment::Column::ClassesTotal)),
        )
        .order_by_asc(student_enrollment::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Consumes one credit.
///
/// Returns `false` when the enrollment is exhausted or not ACTIVE.
pub async fn debit<C>(db: &C, enrollment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = StudentEnrollment::update_many()
        .col_expr(
            student_enrollment::Column::ClassesUsed,
            Expr::col(student_enrollment::Column::ClassesUsed).add(1),
        )
        .col_expr(student_enrollment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(student_enrollment::Column::Id.eq(enrollment_id))
        .filter(student_enrollment::Column::Status.eq(EnrollmentStatus::Active))
        .filter(
            Expr::col(student_enrollment::Column::ClassesUsed)
                .lt(Expr::col(student_enrollment::Column::ClassesTotal)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        debug!(enrollment_id, "Debited one credit");
        return Ok(true);
    }
    get_enrollment(db, enrollment_id).await?;
    Ok(false)
}

/// Restores one credit; never goes below zero.
///
/// Returns whether a credit was restored.
pub async fn credit<C>(db: &C, enrollment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = StudentEnrollment::update_many()
        .col_expr(
            student_enrollment::Column::ClassesUsed,
            Expr::col(student_enrollment::Column::ClassesUsed).sub(1),
        )
        .col_expr(student_enrollment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(student_enrollment::Column::Id.eq(enrollment_id))
        .filter(student_enrollment::Column::ClassesUsed.gt(0))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        debug!(enrollment_id, "Restored one credit");
        return Ok(true);
    }
    get_enrollment(db, enrollment_id).await?;
    Ok(false)
}

/// Moves an ACTIVE enrollment whose credits are all used to EXPIRED.
///
/// Returns whether this call made the change.
pub async fn expire_if_exhausted<C>(db: &C, enrollment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = StudentEnrollment::update_many()
        .col_expr(
            student_enrollment::Column::Status,
            Expr::value(EnrollmentStatus::Expired),
        )
        .col_expr(student_enrollment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(student_enrollment::Column::Id.eq(enrollment_id))
        .filter(student_enrollment::Column::Status.eq(EnrollmentStatus::Active))
        .filter(
            Expr::col(student_enrollment::Column::ClassesUsed)
                .gte(Expr::col(student_enrollment::Column::ClassesTotal)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Moves an EXPIRED enrollment that has a credit again back to ACTIVE.
///
/// Cancelled enrollments are never reactivated. Returns whether this call made the change.
pub async fn reactivate<C>(db: &C, enrollment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = StudentEnrollment::update_many()
        .col_expr(
            student_enrollment::Column::Status,
            Expr::value(EnrollmentStatus::Active),
        )
        .col_expr(student_enrollment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(student_enrollment::Column::Id.eq(enrollment_id))
        .filter(student_enrollment::Column::Status.eq(EnrollmentStatus::Expired))
        .filter(
            Expr::col(student_enrollment::Column::ClassesUsed)
                .lt(Expr::col(student_enrollment::Column::ClassesTotal)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Explicitly cancels an enrollment. Remaining credits can no longer be booked.
pub async fn cancel_enrollment(
    db: &DatabaseConnection,
    enrollment_id: i64,
) -> Result<student_enrollment::Model> {
    let result = StudentEnrollment::update_many()
        .col_expr(
            student_enrollment::Column::Status,
            Expr::value(EnrollmentStatus::Cancelled),
        )
        .col_expr(student_enrollment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(student_enrollment::Column::Id.eq(enrollment_id))
        .filter(student_enrollment::Column::Status.ne(EnrollmentStatus::Cancelled))
        .exec(db)
        .await?;

    let enrollment = get_enrollment(db, enrollment_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::validation(format!(
            "Enrollment {enrollment_id} is already cancelled"
        )));
    }
    info!(enrollment_id, "Cancelled enrollment");
    Ok(enrollment)
}

/// All enrollments of a student, oldest first.
pub async fn enrollments_for_student(
    db: &DatabaseConnection,
    student_id: i64,
) -> Result<Vec<student_enrollment::Model>> {
    StudentEnrollment::find()
        .filter(student_enrollment::Column::StudentId.eq(student_id))
        .order_by_asc(student_enrollment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
