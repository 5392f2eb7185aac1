//! API request handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use taskhub_protocol::Topic;

use crate::auth::{CurrentUser, RequireAdmin};
use crate::realtime::StreamSession;

use super::error::ApiResult;
use super::state::AppState;

/// Liveness probe. Unauthenticated.
///
/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Open an SSE stream for one task's events (chat, typing, lifecycle).
///
/// GET /api/tasks/{task_id}/events
#[instrument(skip(state, user))]
pub async fn task_events(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    info!(task_id, user_id = %user.id(), "Opening task event stream");
    let session = StreamSession::open(state.hub.clone(), Topic::Task(task_id), None);
    Ok(session.into_sse())
}

/// Open the caller's personal SSE stream (notifications), marking them
/// online for presence until the stream closes.
///
/// GET /api/events
#[instrument(skip(state, user))]
pub async fn user_events(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let user_id = user.id().to_string();
    info!(user_id = %user_id, "Opening user event stream");
    let session = StreamSession::open(
        state.hub.clone(),
        Topic::User(user_id.clone()),
        Some(user_id),
    );
    Ok(session.into_sse())
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

/// Publish a typing indicator for a task chat.
///
/// POST /api/tasks/{task_id}/typing
#[instrument(skip(state, user))]
pub async fn typing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<i64>,
    Json(request): Json<TypingRequest>,
) -> ApiResult<StatusCode> {
    state
        .notifier
        .typing(task_id, user.id(), request.is_typing);
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PresenceSnapshot {
    pub statuses: HashMap<String, &'static str>,
}

/// Online/offline status for a set of users.
///
/// POST /api/presence/query
#[instrument(skip(state, _user))]
pub async fn presence_query(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(query): Json<PresenceQuery>,
) -> ApiResult<Json<PresenceSnapshot>> {
    let statuses = query
        .user_ids
        .into_iter()
        .map(|id| {
            let status = if state.hub.is_online(&id) {
                "online"
            } else {
                "offline"
            };
            (id, status)
        })
        .collect();
    Ok(Json(PresenceSnapshot { statuses }))
}

/// Single-user presence.
///
/// GET /api/presence/{user_id}
#[instrument(skip(state, _user))]
pub async fn get_presence(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = if state.hub.is_online(&user_id) {
        "online"
    } else {
        "offline"
    };
    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "status": status,
    })))
}

/// Typed notify trigger, one variant per API action that produces
/// realtime traffic. Used by the marketplace's CRUD services and
/// background jobs after their own writes commit.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NotifyRequest {
    TaskCreated {
        task_id: i64,
        title: String,
        poster_id: String,
    },
    TaskUpdated {
        task_id: i64,
        title: String,
        status: String,
    },
    TaskAccepted {
        task_id: i64,
        title: String,
        helper_id: String,
        helper_name: String,
    },
    TaskCompleted {
        task_id: i64,
        title: String,
        actor_id: String,
    },
    TaskCancelled {
        task_id: i64,
        title: String,
        actor_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    MessageCreated {
        task_id: i64,
        message_id: i64,
        sender_id: String,
        sender_name: String,
        content: String,
    },
    ReviewCreated {
        task_id: i64,
        reviewer_id: String,
        reviewee_id: String,
        rating: u8,
    },
}

/// Publish a domain event. Always 202: delivery is best-effort by
/// contract, so there is no failure to report to the caller.
///
/// POST /api/internal/notify
#[instrument(skip(state, _admin, request))]
pub async fn internal_notify(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(request): Json<NotifyRequest>,
) -> ApiResult<StatusCode> {
    let notifier = &state.notifier;
    match request {
        NotifyRequest::TaskCreated {
            task_id,
            title,
            poster_id,
        } => notifier.task_created(task_id, &title, &poster_id),
        NotifyRequest::TaskUpdated {
            task_id,
            title,
            status,
        } => notifier.task_updated(task_id, &title, &status),
        NotifyRequest::TaskAccepted {
            task_id,
            title,
            helper_id,
            helper_name,
        } => {
            notifier
                .task_accepted(task_id, &title, &helper_id, &helper_name)
                .await
        }
        NotifyRequest::TaskCompleted {
            task_id,
            title,
            actor_id,
        } => notifier.task_completed(task_id, &title, &actor_id).await,
        NotifyRequest::TaskCancelled {
            task_id,
            title,
            actor_id,
            reason,
        } => {
            notifier
                .task_cancelled(task_id, &title, &actor_id, reason.as_deref())
                .await
        }
        NotifyRequest::MessageCreated {
            task_id,
            message_id,
            sender_id,
            sender_name,
            content,
        } => {
            notifier
                .message_created(task_id, message_id, &sender_id, &sender_name, &content)
                .await
        }
        NotifyRequest::ReviewCreated {
            task_id,
            reviewer_id,
            reviewee_id,
            rating,
        } => notifier.review_created(task_id, &reviewer_id, &reviewee_id, rating),
    }
    Ok(StatusCode::ACCEPTED)
}
