use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db;
use crate::error::AppError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/overview", get(overview))
}

const RECENT_PROFILE_LIMIT: i64 = 50;

/// 運営用ダッシュボード。role = 'admin' のプロフィール保持者のみ。
/// admin への昇格はDBを直接触る運用で、APIからは変更できない。
async fn overview(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let caller = db::profiles::get_profile(&state.pool, &auth.user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("forbidden".into()))?;
    if caller.role != "admin" {
        return Err(AppError::Forbidden("forbidden".into()));
    }

    let profiles = db::profiles::recent_profiles(&state.pool, RECENT_PROFILE_LIMIT).await?;
    let rooms = db::rooms::room_count(&state.pool).await?;
    let active_rooms = db::rooms::active_room_count(&state.pool).await?;
    let participants = db::rooms::participant_count(&state.pool).await?;
    let messages = db::messages::message_count(&state.pool).await?;

    Ok(Json(serde_json::json!({
        "profiles": profiles,
        "totals": {
            "rooms": rooms,
            "active_rooms": active_rooms,
            "participants": participants,
            "messages": messages,
        },
    })))
}
