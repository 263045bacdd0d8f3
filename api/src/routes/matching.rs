use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db;
use crate::error::AppError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/match/start", post(start_matching))
        .route("/match/cancel", post(cancel_matching))
        .route("/match/try", post(try_matching))
}

/// 認証不要の公開ルート。
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/match/stats", get(get_stats))
}

/// 待機プールへ登録する。既に待機中なら enqueued_at を更新するだけ。
/// アクティブな部屋に居る間は登録できない。
async fn start_matching(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(room) = db::rooms::active_room_for(&state.pool, &auth.user_id).await? {
        tracing::debug!(room_id = %room.id, "enqueue rejected: already in an active room");
        return Err(AppError::Conflict("already_in_room".into()));
    }
    db::waiting::enqueue(&state.pool, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "waiting": true })))
}

async fn cancel_matching(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = db::waiting::cancel(&state.pool, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "canceled": removed })))
}

/// マッチ試行。相手が見つからなければ room_id は null で、これはエラー
/// ではない。クライアントは1.5秒程度の間隔でこれをポーリングし続ける。
async fn try_matching(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let room = db::rooms::find_or_create_match(&state.pool, &auth.user_id).await?;
    Ok(Json(serde_json::json!({
        "room_id": room.map(|r| r.id),
    })))
}

/// 認証不要の公開統計。トップページの「今何人待ってるか」表示用。
async fn get_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let waiting_count = db::waiting::waiting_count(&state.pool).await?;
    let active_room_count = db::rooms::active_room_count(&state.pool).await?;
    Ok(Json(serde_json::json!({
        "waiting_count": waiting_count,
        "active_room_count": active_room_count,
    })))
}
