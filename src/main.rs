use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use washdesk::config::AppConfig;
use washdesk::db;
use washdesk::handlers;
use washdesk::services::push::webhook::WebhookPusher;
use washdesk::services::push::NotificationPusher;
use washdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let pusher: Option<Box<dyn NotificationPusher>> = if config.notify_webhook_url.is_empty() {
        tracing::info!("notification webhook disabled");
        None
    } else {
        if config.notify_webhook_secret.is_empty() {
            tracing::warn!("NOTIFY_WEBHOOK_SECRET is empty, webhook payloads will be unsigned");
        }
        tracing::info!(url = %config.notify_webhook_url, "pushing notifications to webhook");
        let webhook = WebhookPusher::new(
            config.notify_webhook_url.clone(),
            config.notify_webhook_secret.clone(),
        );
        Some(Box::new(webhook) as Box<dyn NotificationPusher>)
    };

    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is the default value; set it before exposing the service");
    }
    tracing::info!(
        max_crew_per_booking = config.max_crew_per_booking,
        busy_crew_policy = ?config.busy_crew_policy,
        "crew rules"
    );

    let state = Arc::new(AppState::new(conn, config.clone(), pusher));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
