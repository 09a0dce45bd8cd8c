use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::Notification;
use crate::services::push::NotificationPusher;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub pusher: Option<Box<dyn NotificationPusher>>,
    pub notification_tx: broadcast::Sender<Notification>,
}

impl AppState {
    pub fn new(
        conn: Connection,
        config: AppConfig,
        pusher: Option<Box<dyn NotificationPusher>>,
    ) -> Self {
        let (notification_tx, _) = broadcast::channel(256);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            pusher,
            notification_tx,
        }
    }

    /// Locks the shared connection. Never hold the guard across an `.await`.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Storage(anyhow::anyhow!("database lock poisoned")))
    }
}
