//! Bookstore Payment Server
//!
//! Verifies gateway payments and turns each successful one into exactly one
//! confirmed order.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use bookpay_core::config::SharedSettings;
use bookpay_core::events::{Notifier, notification_channel};
use bookpay_core::framework::DatabaseProcessor;
use bookpay_core::processors::{
    LogMailer, Mailer, NotificationDispatcher, PaymentGateway, PaymentServices, RazorpayGateway,
    ResendMailer,
};
use bookpay_core::store::{OrderStore, PgOrderStore};
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Bookstore payment verification and order creation service
#[derive(Parser, Debug)]
#[command(name = "bookpay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./bookpay-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting bookpay-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let settings = SharedSettings::new(
        loaded_config.policy.clone(),
        loaded_config.retry.clone(),
        loaded_config.orders.clone(),
    );

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store: Arc<dyn OrderStore> =
        Arc::new(PgOrderStore::new(DatabaseProcessor::new(db_pool.clone())));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(loaded_config.gateway)?);

    // Notification dispatcher runs on its own task
    let (notification_tx, notification_rx) = notification_channel();
    let (mailer, subject_prefix): (Arc<dyn Mailer>, String) = match loaded_config.mail {
        Some(mail) => {
            let prefix = mail.subject_prefix.clone();
            (Arc::new(ResendMailer::new(mail)?), prefix)
        }
        None => {
            tracing::info!("Mail disabled, confirmations are logged only");
            (Arc::new(LogMailer), String::new())
        }
    };
    let (dispatcher_shutdown_tx, dispatcher_shutdown_rx) = watch::channel(false);
    let dispatcher = NotificationDispatcher::new(
        store.clone(),
        mailer,
        subject_prefix,
        notification_rx,
        dispatcher_shutdown_rx,
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Create application state
    let services = PaymentServices::new(
        store,
        gateway,
        Notifier::new(notification_tx),
        settings.clone(),
    );
    let state = AppState::new(services, loaded_config.secrets, Some(db_pool.clone()));

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(settings, config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Let the dispatcher drain queued confirmations
    tracing::info!("Stopping notification dispatcher...");
    if dispatcher_shutdown_tx.send(true).is_err() {
        tracing::warn!("Notification dispatcher already stopped");
    }
    if let Err(e) = dispatcher_handle.await {
        tracing::error!("Notification dispatcher task failed: {}", e);
    }

    // Signal the config reload handler to stop
    shutdown_notify.notify_one();

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
