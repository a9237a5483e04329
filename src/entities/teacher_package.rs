//! Teacher package entity - Junction table asserting a teacher is qualified to teach a
//! package. The pair (`teacher_id`, `package_id`) is unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Teacher offering database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teacher_packages")]
pub struct Model {
    /// Unique identifier for the offering
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Teacher profile making the offer
    pub teacher_id: i64,
    /// Package being offered
    pub package_id: i64,
    /// When the offering was recorded
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher_profile::Entity",
        from = "Column::TeacherId",
        to = "super::teacher_profile::Column::Id"
    )]
    Teacher,
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<super::teacher_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
