//! Availability entity - A teacher-published time slot.
//!
//! Each slot covers `[start_time, end_time)` on `date` (UTC). `is_reserved` is the
//! compare-and-set flag the booking state machine flips to hold the slot; at most one
//! non-cancelled booking references a slot.

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Availability database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "availabilities")]
pub struct Model {
    /// Unique identifier for the slot
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Teacher profile publishing the slot
    pub teacher_id: i64,
    /// Calendar day of the slot
    pub date: Date,
    /// Start of the slot, inclusive
    pub start_time: Time,
    /// End of the slot, exclusive
    pub end_time: Time,
    /// Whether a booking currently holds the slot
    pub is_reserved: bool,
    /// When the slot was published
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Slot start as a naive UTC timestamp.
    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.start_time)
    }

    /// Slot end as a naive UTC timestamp.
    #[must_use]
    pub fn ends_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.end_time)
    }

    /// Whether this slot shares any instant with `[start, end)` on the same day.
    #[must_use]
    pub fn overlaps(&self, date: Date, start: Time, end: Time) -> bool {
        self.date == date && self.start_time < end && start < self.end_time
    }
}

/// Defines relationships between Availability and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each slot belongs to one teacher
    #[sea_orm(
        belongs_to = "super::teacher_profile::Entity",
        from = "Column::TeacherId",
        to = "super::teacher_profile::Column::Id"
    )]
    Teacher,
    /// Bookings that have referenced the slot (at most one is live)
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::teacher_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
