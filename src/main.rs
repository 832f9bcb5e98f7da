mod api;
mod approval;
mod bot;
mod config;
mod db;
mod error;
mod flow;

use crate::approval::{ApprovalCoordinator, ApprovalSettings};
use crate::bot::transport::TelegramTransport;
use crate::config::Config;
use crate::flow::engine::{FlowEngine, FlowSettings};
use anyhow::{Context, Result};
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    let log_level = config.log_level();
    let log_dir = &config.logging.dir;

    std::fs::create_dir_all(log_dir)?;

    // Daily rotated log file
    let file_appender = tracing_appender::rolling::daily(log_dir, "intakebot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let local_timer = ChronoLocal::rfc_3339();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_timer(local_timer.clone());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer)
        .with_writer(non_blocking);

    let filter_layer = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("sqlx=warn".parse()?)
        .add_directive("sea_orm=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Starting IntakeBot...");
    info!("Logs are written to: {}", log_dir);

    // Connect to database
    let db = db::establish_connection(&config.database.url).await?;
    info!("Database connection established");

    migration::Migrator::up(&db, None).await?;
    info!("✅ Database migrations completed");

    let repo = Arc::new(
        db::repo::Repo::new(db).with_message_log_limit(config.approval.cleanup_limit),
    );

    repo.ping().await?;
    info!("✅ Database ping successful");

    // HTTP façade
    let bind: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("Invalid http.bind address: {}", config.http.bind))?;
    let http_repo = repo.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(bind, http_repo).await {
            error!("HTTP server error: {:?}", e);
        }
    });

    // Telegram bot
    let bot_handle = match config.telegram.bot_token.clone() {
        Some(token) => {
            let bot = teloxide::Bot::new(token);
            let transport = Arc::new(TelegramTransport::new(bot.clone()));

            if config.telegram.operator_chat_id.is_none() {
                warn!("⚠️ telegram.operator_chat_id is not set, requests will not be forwarded");
            }

            let approvals = ApprovalCoordinator::new(
                repo.clone(),
                transport.clone(),
                ApprovalSettings::from_config(&config),
            );
            let engine = Arc::new(FlowEngine::new(
                repo.clone(),
                transport,
                approvals,
                FlowSettings::from_config(&config),
            ));
            info!("✅ Flow engine initialized");

            info!("🤖 Starting Telegram Bot...");
            Some(tokio::spawn(async move {
                if let Err(e) = bot::run(bot, engine).await {
                    error!("Bot error: {:?}", e);
                }
            }))
        }
        None => {
            warn!("⚠️ telegram.bot_token is not set, bot disabled (HTTP API only)");
            None
        }
    };

    info!("IntakeBot initialization complete");

    // Wait for shutdown signal
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down gracefully...");

    if let Some(handle) = bot_handle {
        handle.abort();
    }
    http_handle.abort();

    info!("✅ Shutdown complete");
    Ok(())
}
