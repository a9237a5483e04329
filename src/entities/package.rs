//! Package entity - A purchasable subject offering.
//!
//! Packages are reference data: students enroll in them, teachers declare they can teach
//! them, and bundles group them at a discount.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Package database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    /// Unique identifier for the package
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Math 10"), unique in the catalog
    #[sea_orm(unique)]
    pub name: String,
    /// Longer description shown to students
    pub description: Option<String>,
    /// List price in dollars
    pub price: f64,
    /// Comma-separated subject names covered by this package
    pub subjects: String,
    /// Retired packages stay referenced by history but cannot be enrolled in
    pub is_active: bool,
    /// When the package was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Subjects covered by the package, in stored order.
    #[must_use]
    pub fn subject_list(&self) -> Vec<&str> {
        self.subjects
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Defines relationships between Package and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Teachers qualified for this package
    #[sea_orm(has_many = "super::teacher_package::Entity")]
    TeacherPackages,
    /// Bundles this package is a member of
    #[sea_orm(has_many = "super::package_bundle_item::Entity")]
    BundleItems,
}

impl Related<super::teacher_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeacherPackages.def()
    }
}

impl Related<super::package_bundle_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BundleItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
