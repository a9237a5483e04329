//! User entity - An authenticated identity with exactly one role.
//!
//! Credentials live with the external identity provider; this table only keeps what the
//! scheduling core needs to attach profiles and check roles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role tag carried by every user. Dispatch on it with a `match`, never a trait hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Role {
    /// Back-office operator, also used by the payment processor and schedulers
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Publishes availability and teaches packages
    #[sea_orm(string_value = "TEACHER")]
    Teacher,
    /// A student
    #[sea_orm(string_value = "USER")]
    User,
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login name, unique across all users
    #[sea_orm(unique)]
    pub username: String,
    /// Contact email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Role tag deciding which profile the user owns
    pub role: Role,
    /// Inactive users keep their history but cannot act
    pub is_active: bool,
    /// When the user was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A teacher user owns one teacher profile
    #[sea_orm(has_one = "super::teacher_profile::Entity")]
    TeacherProfile,
    /// A student user owns one student profile
    #[sea_orm(has_one = "super::student_profile::Entity")]
    StudentProfile,
}

impl Related<super::teacher_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeacherProfile.def()
    }
}

impl Related<super::student_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentProfile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
