//! Database module
pub mod entities;
pub mod repo;
pub mod types;

use crate::error::AppResult;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

pub async fn establish_connection(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let connection = Database::connect(opt).await?;
    info!("Connected to database: {}", database_url);

    Ok(connection)
}
