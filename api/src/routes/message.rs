use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::messages::SendOutcome;
use crate::error::AppError;
use crate::notify::RoomEvent;
use crate::types::RoomId;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/room/{room_id}/message",
        get(get_messages).post(post_message),
    )
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    after_id: Option<i64>,
}

/// 履歴の読み出し。参加者のみ。`?after_id=` で差分だけ取れる
/// （ポーリングで全件を引き直さないため）。
async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let room_id = RoomId(room_id);

    if db::rooms::get_room(&state.pool, &room_id).await?.is_none() {
        return Err(AppError::NotFound("room_not_found".into()));
    }
    if !db::rooms::is_participant(&state.pool, &room_id, &auth.user_id).await? {
        return Err(AppError::Forbidden("forbidden".into()));
    }

    let messages = db::messages::get_messages(&state.pool, &room_id, query.after_id).await?;
    Ok(Json(serde_json::json!({ "messages": messages })))
}

#[derive(Deserialize)]
struct PostMessageBody {
    content: String,
}

async fn post_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    auth: AuthenticatedUser,
    Json(body): Json<PostMessageBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let room_id = RoomId(room_id);

    match db::messages::send_message(&state.pool, &room_id, &auth.user_id, &body.content).await? {
        SendOutcome::Sent {
            message,
            points,
            deducted,
        } => {
            state.notifier.publish(
                room_id.as_str(),
                RoomEvent::MessageCreated {
                    message: message.clone(),
                },
            );
            Ok(Json(serde_json::json!({
                "message": message,
                "points": points,
                "deducted": deducted,
            })))
        }
        SendOutcome::InsufficientPoints { points } => Err(AppError::InsufficientPoints { points }),
        SendOutcome::RoomInactive => Err(AppError::Conflict("room_inactive".into())),
        SendOutcome::NotParticipant => Err(AppError::Forbidden("forbidden".into())),
        SendOutcome::NotYourTurn => Err(AppError::Conflict("not_your_turn".into())),
    }
}
