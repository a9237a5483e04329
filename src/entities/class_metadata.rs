//! Class metadata entity - Immutable record that a class took place.
//!
//! Rows are appended once per completed booking (`booking_id` is unique) and never
//! updated or deleted afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_metadata")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Completed booking this record was derived from
    #[sea_orm(unique)]
    pub booking_id: i64,
    /// Package the class was taught under
    pub package_id: Option<i64>,
    /// Teacher profile who taught
    pub teacher_id: i64,
    /// Student user who attended
    pub student_id: i64,
    /// Day of the class
    pub date: Date,
    /// Class start
    pub start_time: Time,
    /// Class end
    pub end_time: Time,
    /// When the record was archived
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ClassMetadata` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record derives from exactly one booking
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
