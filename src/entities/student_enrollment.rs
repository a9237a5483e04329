//! Student enrollment entity - A student's purchased credits for one package.
//!
//! Invariant: `0 <= classes_used <= classes_total`. Every mutation of `classes_used` goes
//! through the conditional updates in `core::enrollment`, never a read-modify-write.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of an enrollment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EnrollmentStatus {
    /// Credits may be booked
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    /// Every credit has been consumed
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    /// Explicitly cancelled
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Student enrollment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_enrollments")]
pub struct Model {
    /// Unique identifier for the enrollment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student profile holding the credits
    pub student_id: i64,
    /// Package the credits apply to
    pub package_id: i64,
    /// Number of classes purchased
    pub classes_total: i32,
    /// Number of classes consumed by confirmed bookings
    pub classes_used: i32,
    /// Current lifecycle state
    pub status: EnrollmentStatus,
    /// When the enrollment was created
    pub created_at: DateTimeUtc,
    /// When the enrollment was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Credits still available for booking.
    #[must_use]
    pub const fn remaining_credits(&self) -> i32 {
        self.classes_total - self.classes_used
    }
}

/// Defines relationships between `StudentEnrollment` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each enrollment belongs to one student profile
    #[sea_orm(
        belongs_to = "super::student_profile::Entity",
        from = "Column::StudentId",
        to = "super::student_profile::Column::Id"
    )]
    Student,
    /// Each enrollment is for one package
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<super::student_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
