use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Notification, NotificationKind};
use crate::services::lifecycle::now_millis;
use crate::services::push::NotificationPusher;
use crate::state::AppState;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Appends a notification to the head of `user_id`'s list. Runs on whatever connection
/// or transaction the caller holds, so it commits or rolls back with the business write.
pub fn record(
    conn: &Connection,
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    message: &str,
    booking_id: Option<&str>,
) -> Result<Notification, AppError> {
    let created_at = now_millis();
    let id = queries::insert_notification(conn, user_id, kind, title, message, booking_id, &created_at)?;

    Ok(Notification {
        id,
        user_id: user_id.to_string(),
        kind,
        title: title.to_string(),
        message: message.to_string(),
        booking_id: booking_id.map(str::to_string),
        read: false,
        created_at,
    })
}

/// Fans committed notifications out to live subscribers and, when configured, the
/// outbound webhook. Delivery is best effort and never fails the caller.
pub fn dispatch(state: &Arc<AppState>, notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }

    for notification in &notifications {
        // No subscribers is fine
        let _ = state.notification_tx.send(notification.clone());
    }

    if state.pusher.is_none() {
        return;
    }

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let Some(pusher) = state.pusher.as_deref() else {
            return;
        };
        for notification in &notifications {
            if let Err(e) = push_with_retry(
                pusher,
                notification,
                state.config.notify_webhook_retries,
                RETRY_BACKOFF,
            )
            .await
            {
                tracing::warn!(
                    notification_id = notification.id,
                    user_id = %notification.user_id,
                    error = %e,
                    "dropping notification push"
                );
            }
        }
    });
}

pub async fn push_with_retry(
    pusher: &dyn NotificationPusher,
    notification: &Notification,
    retries: u32,
    backoff: Duration,
) -> Result<(), AppError> {
    let mut attempt = 0;
    loop {
        let err = match pusher.push(notification).await {
            Ok(()) => return Ok(()),
            Err(e) => AppError::DownstreamUnavailable(format!("{e:#}")),
        };

        if !err.is_retryable() || attempt >= retries {
            return Err(err);
        }
        attempt += 1;
        tracing::debug!(
            notification_id = notification.id,
            attempt,
            error = %err,
            "retrying notification push"
        );
        tokio::time::sleep(backoff * attempt).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db;

    struct FlakyPusher {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationPusher for FlakyPusher {
        async fn push(&self, _notification: &Notification) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("connection refused");
            }
            Ok(())
        }
    }

    fn sample() -> Notification {
        Notification {
            id: 1,
            user_id: "C1".to_string(),
            kind: NotificationKind::CrewAssignment,
            title: "New job".to_string(),
            message: "You have been assigned".to_string(),
            booking_id: Some("BOOK_1".to_string()),
            read: false,
            created_at: now_millis(),
        }
    }

    #[test]
    fn test_record_returns_stored_row() {
        let conn = db::init_db(":memory:").unwrap();
        let n = record(
            &conn,
            "C1",
            NotificationKind::CrewAssignment,
            "New job",
            "Wash at 10:00",
            Some("BOOK_1"),
        )
        .unwrap();

        let listed = queries::list_notifications(&conn, "C1", false, 10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, n.id);
        assert_eq!(listed[0].booking_id.as_deref(), Some("BOOK_1"));
        assert!(!listed[0].read);
    }

    #[tokio::test]
    async fn test_push_retries_until_success() {
        let pusher = FlakyPusher {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        push_with_retry(&pusher, &sample(), 3, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_push_gives_up_after_retries() {
        let pusher = FlakyPusher {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = push_with_retry(&pusher, &sample(), 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DownstreamUnavailable(_)));
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 3);
    }
}
