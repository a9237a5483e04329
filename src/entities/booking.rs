//! Booking entity - A student's claim on one availability slot.
//!
//! `status` follows `PENDING -> CONFIRMED -> COMPLETED`, with `CANCELLED` reachable from
//! `PENDING` or `CONFIRMED`. `payment_status` is reported by the external payment
//! processor and moves alongside it. Transitions live in `core::booking`.

use chrono::Duration;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Booking lifecycle state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum BookingStatus {
    /// Slot held, awaiting payment; no credit debited yet
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Paid, credit debited
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    /// Released; terminal
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    /// Class took place and was archived; terminal
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

impl BookingStatus {
    /// Whether no further transition is possible from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// Payment state as last reported by the payment processor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
    /// No outcome reported yet
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Payment captured
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Payment returned after cancellation
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
    /// Payment attempt rejected
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

/// Booking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    /// Unique identifier for the booking
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Student user who booked
    pub user_id: i64,
    /// Teacher profile giving the class
    pub teacher_id: i64,
    /// Slot held by this booking
    pub availability_id: i64,
    /// Package the class is taught under
    pub package_id: Option<i64>,
    /// Enrollment debited at confirmation, if any
    pub enrollment_id: Option<i64>,
    /// Start of the class (UTC)
    pub scheduled_at: DateTimeUtc,
    /// Length of the class in minutes
    pub duration: i32,
    /// Lifecycle state
    pub status: BookingStatus,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Set when this booking's debit moved the enrollment to EXPIRED
    pub exhausted_enrollment: bool,
    /// Caller-supplied reason, set on cancellation
    pub cancel_reason: Option<String>,
    /// When the booking was created
    pub created_at: DateTimeUtc,
    /// When the booking last changed state
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// End of the class (UTC).
    #[must_use]
    pub fn ends_at(&self) -> DateTimeUtc {
        self.scheduled_at + Duration::minutes(i64::from(self.duration))
    }
}

/// Defines relationships between Booking and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each booking holds one availability slot
    #[sea_orm(
        belongs_to = "super::availability::Entity",
        from = "Column::AvailabilityId",
        to = "super::availability::Column::Id"
    )]
    Availability,
    /// Each booking is made by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::availability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Availability.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
