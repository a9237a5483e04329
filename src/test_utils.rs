//! Shared test utilities.
//!
//! This module provides helpers for setting up an in-memory database and creating
//! teachers, students, packages, enrollments and slots with sensible defaults.
//! Tests that need transactions to actually overlap use [`setup_file_db`], since the
//! in-memory database is a single connection.

use crate::{
    core::{availability, catalog, users},
    entities::{self, EnrollmentStatus, Role, student_enrollment},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::{TempDir, tempdir};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = crate::config::database::create_connection("sqlite::memory:", false).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in a fresh temporary directory, with a real
/// connection pool. The directory is removed when the returned guard is dropped.
pub async fn setup_file_db() -> Result<(TempDir, DatabaseConnection)> {
    let dir = tempdir().expect("temporary directory");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("tutoring.sqlite").display()
    );
    let db = crate::config::database::create_connection(&url, false).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((dir, db))
}

/// Calendar day shorthand.
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Time of day shorthand.
pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// UTC instant shorthand.
pub fn at(year: i32, month: u32, d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day(year, month, d).and_time(hm(hour, minute)))
}

/// Registers a teacher. Returns (user id, teacher profile id).
pub async fn create_test_teacher(db: &DatabaseConnection, username: &str) -> Result<(i64, i64)> {
    let (user, profile) = users::register_user(
        db,
        username,
        &format!("{username}@example.test"),
        "Test",
        "Teacher",
        Role::Teacher,
    )
    .await?;
    Ok((user.id, profile.unwrap_or_default()))
}

/// Registers a student. Returns (user id, student profile id).
pub async fn create_test_student(db: &DatabaseConnection, username: &str) -> Result<(i64, i64)> {
    let (user, profile) = users::register_user(
        db,
        username,
        &format!("{username}@example.test"),
        "Test",
        "Student",
        Role::User,
    )
    .await?;
    Ok((user.id, profile.unwrap_or_default()))
}

/// Creates a package priced 29.99.
pub async fn create_test_package(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::package::Model> {
    create_custom_package(db, name, 29.99).await
}

/// Creates a package with a custom price.
pub async fn create_custom_package(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
) -> Result<entities::package::Model> {
    catalog::create_package(db, name, None, price, &[name.to_string()]).await
}

/// Inserts an enrollment with an arbitrary usage count, bypassing the ledger.
pub async fn create_custom_enrollment(
    db: &DatabaseConnection,
    student_id: i64,
    package_id: i64,
    classes_total: i32,
    classes_used: i32,
) -> Result<student_enrollment::Model> {
    let now = Utc::now();
    let status = if classes_used >= classes_total {
        EnrollmentStatus::Expired
    } else {
        EnrollmentStatus::Active
    };
    let enrollment = student_enrollment::ActiveModel {
        student_id: Set(student_id),
        package_id: Set(package_id),
        classes_total: Set(classes_total),
        classes_used: Set(classes_used),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(enrollment)
}

/// Publishes a 09:00-10:00 slot on `date`.
pub async fn create_test_slot(
    db: &DatabaseConnection,
    teacher_id: i64,
    date: NaiveDate,
) -> Result<entities::availability::Model> {
    availability::publish(db, teacher_id, date, hm(9, 0), hm(10, 0)).await
}

/// Everything needed to book a class.
pub struct Bookable {
    /// Database holding the scenario
    pub db: DatabaseConnection,
    /// User id of "teacher1"
    pub teacher_user_id: i64,
    /// Teacher profile id of "teacher1"
    pub teacher_id: i64,
    /// User id of "student1"
    pub student_user_id: i64,
    /// Student profile id of "student1"
    pub student_id: i64,
    /// "Math 10", offered by the teacher
    pub package: entities::package::Model,
    /// The student's "Math 10" enrollment, 2 of 10 classes used
    pub enrollment: student_enrollment::Model,
    /// 2024-06-10 09:00-10:00
    pub slot: entities::availability::Model,
}

/// A teacher offering "Math 10" with a slot on 2024-06-10 09:00-10:00, and a student
/// enrolled in it with 10 classes of which 2 are used.
pub async fn setup_bookable() -> Result<Bookable> {
    setup_bookable_in(setup_test_db().await?).await
}

/// [`setup_bookable`] on an existing, empty database.
pub async fn setup_bookable_in(db: DatabaseConnection) -> Result<Bookable> {
    let (teacher_user_id, teacher_id) = create_test_teacher(&db, "teacher1").await?;
    let (student_user_id, student_id) = create_test_student(&db, "student1").await?;
    let package = create_test_package(&db, "Math 10").await?;
    catalog::offer_package(&db, teacher_id, package.id).await?;
    let enrollment = create_custom_enrollment(&db, student_id, package.id, 10, 2).await?;
    let slot = create_test_slot(&db, teacher_id, day(2024, 6, 10)).await?;

    Ok(Bookable {
        db,
        teacher_user_id,
        teacher_id,
        student_user_id,
        student_id,
        package,
        enrollment,
        slot,
    })
}
