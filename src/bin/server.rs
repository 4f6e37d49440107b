use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use cloud_alert_engine::alerting::retention::run_retention_sweeper;
use cloud_alert_engine::alerting::{AlertMonitor, Clock, SystemClock};
use cloud_alert_engine::db::services::AlertStore;
use cloud_alert_engine::metrics::HttpMetricsProvider;
use cloud_alert_engine::notifications::NotificationDispatcher;
use cloud_alert_engine::notifications::senders::{
    DisabledMailer, MailTransport, SmtpMailer, WebhookSender,
};
use cloud_alert_engine::server::config::EngineConfig;
use cloud_alert_engine::web::{AppState, create_axum_router};

const DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "alert-engine.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    // Route `log` records from dependencies into tracing.
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match EngineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };
    init_logging(&config.log_dir)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting alert engine.");

    // --- Persistence ---
    let store = match AlertStore::connect(&config.database_url, DB_MAX_CONNECTIONS).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Alert store is unreachable.");
            return Err(e.into());
        }
    };
    store.ensure_schema().await?;
    let store = Arc::new(store);

    // --- Notification channels ---
    let mailer: Arc<dyn MailTransport> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(
            &smtp.host,
            smtp.port,
            smtp.username.as_deref(),
            smtp.password.as_deref(),
            &smtp.from,
        )?),
        None => {
            warn!("No SMTP host configured; email notifications will be reported as failed.");
            Arc::new(DisabledMailer)
        }
    };
    let webhook = Arc::new(WebhookSender::new(Duration::from_secs(
        config.webhook_timeout_seconds,
    ))?);
    let dispatcher = Arc::new(NotificationDispatcher::new(mailer, webhook, store.clone()));

    // --- Alert monitor ---
    let metrics = Arc::new(HttpMetricsProvider::new(
        &config.metrics_base_url,
        Duration::from_secs(config.metrics_timeout_seconds),
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = Arc::new(AlertMonitor::new(
        store.clone(),
        metrics,
        dispatcher,
        clock.clone(),
        config.monitor_settings(),
    ));
    if let Err(e) = monitor.start().await {
        error!(error = %e, "Failed to start alert monitor.");
        return Err(e.into());
    }

    let retention_task =
        run_retention_sweeper(store.clone(), clock.clone(), config.history_retention_days);

    // --- HTTP ---
    let app_state = Arc::new(AppState {
        rules: store.clone(),
        history: store,
        monitor: monitor.clone(),
        clock,
    });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening.");

    axum::serve(listener, create_axum_router(app_state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            monitor.stop().await;
        })
        .await?;

    retention_task.abort();
    info!("Alert engine stopped.");
    Ok(())
}
