//! Teacher profile entity - One per TEACHER user; owns slots and package offerings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Teacher profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teacher_profiles")]
pub struct Model {
    /// Unique identifier for the teacher profile
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user (role TEACHER)
    #[sea_orm(unique)]
    pub user_id: i64,
    /// Free-form biography shown to students
    pub bio: Option<String>,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `TeacherProfile` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each profile belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// A teacher publishes many availability slots
    #[sea_orm(has_many = "super::availability::Entity")]
    Availabilities,
    /// A teacher offers many packages
    #[sea_orm(has_many = "super::teacher_package::Entity")]
    TeacherPackages,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::availability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Availabilities.def()
    }
}

impl Related<super::teacher_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeacherPackages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
