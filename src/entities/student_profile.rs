//! Student profile entity - One per USER user; owns package enrollments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_profiles")]
pub struct Model {
    /// Unique identifier for the student profile
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user (role USER)
    #[sea_orm(unique)]
    pub user_id: i64,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::student_enrollment::Entity")]
    Enrollments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::student_enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
