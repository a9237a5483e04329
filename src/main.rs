use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tutoring_core::{
    config::{database, settings},
    core::catalog,
    errors::Result,
    maintenance,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(
        &database::get_database_url(),
        app_config.scheduling.sqlx_logging,
    )
    .await
    .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed catalog reference data
    catalog::sync_catalog(&db, &app_config)
        .await
        .inspect_err(|e| error!("Failed to sync catalog: {}", e))?;

    // 6. One maintenance pass, when a stale threshold is configured
    if let Some(max_age) = app_config.scheduling.stale_pending_age() {
        let cancelled = maintenance::cancel_stale_pending(&db, max_age)
            .await
            .inspect_err(|e| error!("Maintenance pass failed: {}", e))?;
        info!("Cancelled {} stale pending bookings", cancelled.len());
    }

    db.close().await?;
    Ok(())
}
