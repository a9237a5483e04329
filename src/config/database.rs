//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`, so the
//! schema always matches the Rust structs. The indexes that back the scheduling invariants
//! (one live booking per slot, unique offerings and bundle members) are created here too.

use crate::entities::{
    Availability, Booking, ClassMetadata, Package, PackageBundle, PackageBundleItem,
    StudentEnrollment, StudentProfile, TeacherPackage, TeacherProfile, User,
    package_bundle_item, teacher_package,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, TableCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/tutoring.sqlite?mode=rwc";

/// Backstop for the no-double-booking rule: a slot can be referenced by any number of
/// cancelled bookings but by at most one live one.
const LIVE_BOOKING_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_live_slot \
     ON bookings (availability_id) WHERE status <> 'CANCELLED'";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to a
/// local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection pool for `database_url`.
///
/// The returned handle is the storage handle injected into every core component; it is
/// cheap to clone and each transition borrows one pooled connection for its transaction.
pub async fn create_connection(database_url: &str, sqlx_logging: bool) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(sqlx_logging);
    // An in-memory database lives and dies with its connection, so it must never be pooled
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    info!("Connecting to database");
    Database::connect(options).await.map_err(Into::into)
}

fn table_statements(schema: &Schema) -> Vec<TableCreateStatement> {
    // Parents before children so foreign keys resolve on backends that check at creation
    let mut tables = vec![
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(TeacherProfile),
        schema.create_table_from_entity(StudentProfile),
        schema.create_table_from_entity(Package),
        schema.create_table_from_entity(PackageBundle),
        schema.create_table_from_entity(PackageBundleItem),
        schema.create_table_from_entity(TeacherPackage),
        schema.create_table_from_entity(StudentEnrollment),
        schema.create_table_from_entity(Availability),
        schema.create_table_from_entity(Booking),
        schema.create_table_from_entity(ClassMetadata),
    ];
    for table in &mut tables {
        table.if_not_exists();
    }
    tables
}

/// Creates every table and index if missing. Safe to call on every startup.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    for table in table_statements(&schema) {
        db.execute(builder.build(&table)).await?;
    }

    let offering_index = Index::create()
        .name("idx_teacher_packages_pair")
        .table(TeacherPackage)
        .col(teacher_package::Column::TeacherId)
        .col(teacher_package::Column::PackageId)
        .unique()
        .if_not_exists()
        .to_owned();
    let bundle_item_index = Index::create()
        .name("idx_package_bundle_items_pair")
        .table(PackageBundleItem)
        .col(package_bundle_item::Column::BundleId)
        .col(package_bundle_item::Column::PackageId)
        .unique()
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&offering_index)).await?;
    db.execute(builder.build(&bundle_item_index)).await?;
    db.execute_unprepared(LIVE_BOOKING_INDEX).await?;

    debug!("Schema ready");
    Ok(())
}
