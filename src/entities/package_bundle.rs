//! Package bundle entity - An ordered, discounted collection of packages.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Package bundle database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_bundles")]
pub struct Model {
    /// Unique identifier for the bundle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Grade 10 Core"), unique in the catalog
    #[sea_orm(unique)]
    pub name: String,
    /// Longer description shown to students
    pub description: Option<String>,
    /// Discount applied to the sum of member package prices, 0 to 100
    pub discount_percent: i32,
    /// Whether the bundle is promoted on the storefront
    pub is_featured: bool,
    /// When the bundle was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `PackageBundle` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One bundle has many ordered items
    #[sea_orm(has_many = "super::package_bundle_item::Entity")]
    Items,
}

impl Related<super::package_bundle_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
