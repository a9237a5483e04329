//! Catalog business logic - packages, bundles and teacher offerings.
//!
//! The catalog is read-mostly reference data. The booking state machine only asks it one
//! question, [`is_offered_by`], inside its own transaction.

use crate::{
    config::settings::Config,
    entities::{
        Package, PackageBundle, PackageBundleItem, TeacherPackage, TeacherProfile, package,
        package_bundle, package_bundle_item, teacher_package,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info};

/// Outcome of seeding the catalog from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSyncResult {
    /// Packages inserted because no package had that name
    pub packages_created: usize,
    /// Bundles inserted because no bundle had that name
    pub bundles_created: usize,
}

/// Creates a package after validating name and price.
pub async fn create_package(
    db: &DatabaseConnection,
    name: &str,
    description: Option<String>,
    price: f64,
    subjects: &[String],
) -> Result<package::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Package name cannot be empty"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!("Invalid package price {price}")));
    }

    let package = package::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description),
        price: Set(price),
        subjects: Set(subjects
            .iter()
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join(",")),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(package_id = package.id, "Created package '{}'", package.name);
    Ok(package)
}

/// Finds a package by id.
pub async fn get_package<C>(db: &C, package_id: i64) -> Result<package::Model>
where
    C: ConnectionTrait,
{
    Package::find_by_id(package_id)
        .one(db)
        .await?
        .ok_or(Error::PackageNotFound { id: package_id })
}

/// Creates a bundle whose members appear in the order given.
///
/// The member list must be non-empty and free of duplicates, and every package must exist.
pub async fn create_bundle(
    db: &DatabaseConnection,
    name: &str,
    description: Option<String>,
    discount_percent: i32,
    is_featured: bool,
    package_ids: &[i64],
) -> Result<package_bundle::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Bundle name cannot be empty"));
    }
    if !(0..=100).contains(&discount_percent) {
        return Err(Error::validation(format!(
            "Discount must be between 0 and 100, got {discount_percent}"
        )));
    }
    if package_ids.is_empty() {
        return Err(Error::validation("A bundle needs at least one package"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = package_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(Error::validation(format!(
            "Package {dup} appears twice in bundle"
        )));
    }

    let txn = db.begin().await?;

    for package_id in package_ids {
        get_package(&txn, *package_id).await?;
    }

    let bundle = package_bundle::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description),
        discount_percent: Set(discount_percent),
        is_featured: Set(is_featured),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (position, package_id) in (0_i32..).zip(package_ids) {
        package_bundle_item::ActiveModel {
            bundle_id: Set(bundle.id),
            package_id: Set(*package_id),
            display_order: Set(position),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!(
        bundle_id = bundle.id,
        members = package_ids.len(),
        "Created bundle '{}'",
        bundle.name
    );
    Ok(bundle)
}

/// Member packages of a bundle, in display order.
pub async fn bundle_packages<C>(db: &C, bundle_id: i64) -> Result<Vec<package::Model>>
where
    C: ConnectionTrait,
{
    PackageBundle::find_by_id(bundle_id)
        .one(db)
        .await?
        .ok_or(Error::BundleNotFound { id: bundle_id })?;

    let items = PackageBundleItem::find()
        .filter(package_bundle_item::Column::BundleId.eq(bundle_id))
        .order_by_asc(package_bundle_item::Column::DisplayOrder)
        .find_also_related(Package)
        .all(db)
        .await?;

    Ok(items.into_iter().filter_map(|(_, package)| package).collect())
}

/// Bundle price: the sum of member prices with the bundle discount applied, in cents
/// precision.
pub async fn price_of(db: &DatabaseConnection, bundle_id: i64) -> Result<f64> {
    let bundle = PackageBundle::find_by_id(bundle_id)
        .one(db)
        .await?
        .ok_or(Error::BundleNotFound { id: bundle_id })?;
    let members = bundle_packages(db, bundle_id).await?;

    let total: f64 = members.iter().map(|p| p.price).sum();
    Ok(apply_discount(total, bundle.discount_percent))
}

fn apply_discount(total: f64, discount_percent: i32) -> f64 {
    let discounted = total * f64::from(100 - discount_percent) / 100.0;
    (discounted * 100.0).round() / 100.0
}

/// Records that a teacher can teach a package. Offering twice is a no-op.
pub async fn offer_package(
    db: &DatabaseConnection,
    teacher_id: i64,
    package_id: i64,
) -> Result<teacher_package::Model> {
    let txn = db.begin().await?;

    TeacherProfile::find_by_id(teacher_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::validation(format!("Unknown teacher {teacher_id}")))?;
    get_package(&txn, package_id).await?;

    let existing = TeacherPackage::find()
        .filter(teacher_package::Column::TeacherId.eq(teacher_id))
        .filter(teacher_package::Column::PackageId.eq(package_id))
        .one(&txn)
        .await?;
    if let Some(offering) = existing {
        return Ok(offering);
    }

    let offering = teacher_package::ActiveModel {
        teacher_id: Set(teacher_id),
        package_id: Set(package_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(teacher_id, package_id, "Teacher now offers package");
    Ok(offering)
}

/// Removes an offering. Returns whether one existed.
///
/// Bookings already created keep their package; new bookings are refused.
pub async fn withdraw_offering(
    db: &DatabaseConnection,
    teacher_id: i64,
    package_id: i64,
) -> Result<bool> {
    let result = TeacherPackage::delete_many()
        .filter(teacher_package::Column::TeacherId.eq(teacher_id))
        .filter(teacher_package::Column::PackageId.eq(package_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Whether the teacher is qualified to teach the package.
pub async fn is_offered_by<C>(db: &C, teacher_id: i64, package_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = TeacherPackage::find()
        .filter(teacher_package::Column::TeacherId.eq(teacher_id))
        .filter(teacher_package::Column::PackageId.eq(package_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Ids of teacher profiles offering a package.
pub async fn teachers_offering(db: &DatabaseConnection, package_id: i64) -> Result<Vec<i64>> {
    let offerings = TeacherPackage::find()
        .filter(teacher_package::Column::PackageId.eq(package_id))
        .order_by_asc(teacher_package::Column::TeacherId)
        .all(db)
        .await?;
    Ok(offerings.into_iter().map(|o| o.teacher_id).collect())
}

/// Inserts configured packages and bundles that are not in the catalog yet, matched by
/// name. Existing entries are left untouched.
pub async fn sync_catalog(db: &DatabaseConnection, config: &Config) -> Result<CatalogSyncResult> {
    let mut result = CatalogSyncResult::default();

    for cfg in &config.packages {
        let exists = Package::find()
            .filter(package::Column::Name.eq(cfg.name.trim()))
            .one(db)
            .await?
            .is_some();
        if exists {
            debug!("Package '{}' already exists. Skipping.", cfg.name);
            continue;
        }
        create_package(db, &cfg.name, cfg.description.clone(), cfg.price, &cfg.subjects).await?;
        result.packages_created += 1;
    }

    for cfg in &config.bundles {
        let exists = PackageBundle::find()
            .filter(package_bundle::Column::Name.eq(cfg.name.trim()))
            .one(db)
            .await?
            .is_some();
        if exists {
            debug!("Bundle '{}' already exists. Skipping.", cfg.name);
            continue;
        }

        let mut package_ids = Vec::with_capacity(cfg.packages.len());
        for name in &cfg.packages {
            let package = Package::find()
                .filter(package::Column::Name.eq(name.trim()))
                .one(db)
                .await?
                .ok_or_else(|| Error::Config {
                    message: format!("Bundle '{}' references unknown package '{name}'", cfg.name),
                })?;
            package_ids.push(package.id);
        }
        create_bundle(
            db,
            &cfg.name,
            cfg.description.clone(),
            cfg.discount_percent,
            cfg.is_featured,
            &package_ids,
        )
        .await?;
        result.bundles_created += 1;
    }

    info!(
        packages = result.packages_created,
        bundles = result.bundles_created,
        "Catalog synchronised"
    );
    Ok(result)
}
