use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Notification;
use crate::state::AppState;

use super::check_auth;

// GET /api/users/:id/notifications
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let notifications = {
        let conn = state.conn()?;
        queries::list_notifications(&conn, &user_id, query.unread_only.unwrap_or(false), limit)?
    };

    Ok(Json(notifications))
}

// GET /api/users/:id/notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let unread = {
        let conn = state.conn()?;
        queries::count_unread(&conn, &user_id)?
    };

    Ok(Json(serde_json::json!({ "userId": user_id, "unread": unread })))
}

// POST /api/users/:id/notifications/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let updated = {
        let conn = state.conn()?;
        queries::mark_all_read(&conn, &user_id)?
    };

    Ok(Json(serde_json::json!({ "ok": true, "updated": updated })))
}

// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let updated = {
        let conn = state.conn()?;
        queries::mark_notification_read(&conn, id)?
    };

    if updated {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(AppError::NotFound(format!("notification {id}")))
    }
}

// GET /api/notifications/events (SSE)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token rides in the query string
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    let user_filter = query.user_id;
    let last_id = query.last_id.unwrap_or(0);

    // Subscribe before the catch-up read so nothing lands between the two
    let rx = state.notification_tx.subscribe();
    let catchup = {
        let conn = state.conn()?;
        queries::get_notifications_since(&conn, last_id, user_filter.as_deref())?
    };
    let high_water = catchup.last().map(|n| n.id).unwrap_or(last_id);

    let catchup_stream = tokio_stream::iter(
        catchup
            .into_iter()
            .map(|n| Ok::<_, Infallible>(to_event(&n))),
    );

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(n) if n.id > high_water
            && user_filter.as_deref().map_or(true, |u| u == n.user_id) =>
        {
            Some(Ok(to_event(&n)))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "notification subscriber lagged");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok::<_, Infallible>(Event::default().comment("keepalive")));

    let merged = catchup_stream.chain(live_stream).merge(keepalive_stream);

    Ok(Sse::new(merged))
}

fn to_event(notification: &Notification) -> Event {
    let data = serde_json::to_string(notification).unwrap_or_else(|e| {
        tracing::warn!(
            notification_id = notification.id,
            error = %e,
            "failed to serialize notification event"
        );
        String::new()
    });
    Event::default()
        .id(notification.id.to_string())
        .event("notification")
        .data(data)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::NotificationKind;

    #[test]
    fn test_event_carries_id_and_payload() {
        let notification = Notification {
            id: 42,
            user_id: "C1".to_string(),
            kind: NotificationKind::CrewAssignment,
            title: "New job".to_string(),
            message: "You are on booking BOOK_100".to_string(),
            booking_id: Some("BOOK_100".to_string()),
            read: false,
            created_at: Utc::now(),
        };

        let rendered = format!("{:?}", to_event(&notification));
        assert!(rendered.contains("id: 42"));
        assert!(rendered.contains("event: notification"));
        assert!(rendered.contains("BOOK_100"));
    }
}
