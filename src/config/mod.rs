/// Database configuration, connection management and schema creation
pub mod database;

/// Application settings and catalog seed loading from config.toml
pub mod settings;
