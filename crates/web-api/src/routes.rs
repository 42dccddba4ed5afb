use application::{BroadcastReport, RelayStats};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use domain::{CloseReason, Topic};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    error::ApiError,
    state::AppState,
    ws_connection::{refuse, RelayConnection},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(websocket_upgrade))
        .route("/stats", get(relay_stats))
        .route("/topics/{topic}/messages", post(publish_to_topic))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn relay_stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.relay.stats().await)
}

#[derive(Debug, Deserialize)]
struct PublishPayload {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    topic: Topic,
    #[serde(flatten)]
    report: BroadcastReport,
}

/// 服务端向主题推送消息，系统通知走这里
async fn publish_to_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<PublishPayload>,
) -> Result<Json<PublishResponse>, ApiError> {
    let publisher = state.jwt_service.extract_user_from_headers(&headers)?;

    let topic = Topic::parse(topic).map_err(|_| ApiError::bad_request("topic is required"))?;
    let message = payload
        .message
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ApiError::bad_request("message is required"))?;

    let report = state.relay.broadcast(&topic, &message).await;
    tracing::info!(
        user_id = %publisher,
        topic = %topic,
        delivered = report.delivered,
        skipped = report.skipped,
        failed = report.failed,
        "Published message via HTTP"
    );

    Ok(Json(PublishResponse { topic, report }))
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// 握手前完成准入：凭证无效直接 401，缺少用户标识则升级后以关闭帧拒绝
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let identity = state
        .jwt_service
        .resolve_identity(&headers, query.token.as_deref())?;

    Ok(ws.on_upgrade(move |socket| async move {
        match identity {
            Some(user_id) => RelayConnection::new(socket, state, user_id).run().await,
            None => {
                tracing::warn!("User ID is required");
                refuse(socket, CloseReason::user_id_required()).await;
            }
        }
    }))
}
