use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db;
use crate::error::AppError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", post(create_profile))
        .route("/profile/me", get(get_me))
}

#[derive(Deserialize)]
struct CreateProfileBody {
    id: String,
    nickname: String,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    age_group: Option<String>,
}

/// プロフィール作成。自分のIDに対してのみ許可する（自己登録のみ）。
/// 重複IDはストアの一意制約エラーがそのまま返る。
async fn create_profile(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreateProfileBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.id != auth.user_id.as_str() {
        return Err(AppError::Unauthorized("unauthorized".into()));
    }
    let profile = db::profiles::create_profile(
        &state.pool,
        &auth.user_id,
        &body.nickname,
        body.gender.as_deref(),
        body.age_group.as_deref(),
    )
    .await?;
    Ok(Json(serde_json::json!(profile)))
}

async fn get_me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = db::profiles::get_profile(&state.pool, &auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile_not_found".into()))?;
    Ok(Json(serde_json::json!(profile)))
}
