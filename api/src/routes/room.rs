use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::{MessageRow, RoomState};
use crate::db::rooms::SettleOutcome;
use crate::error::AppError;
use crate::notify::RoomEvent;
use crate::types::RoomId;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/room/{room_id}", get(get_room))
        .route("/room/{room_id}/end", post(end_room))
}

/// 部屋の状態。参加者のみ。your_turn はポーリングUI向けの導出値で、
/// 保存された状態ではない。
async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let room_id = RoomId(room_id);

    let room = db::rooms::get_room(&state.pool, &room_id)
        .await?
        .ok_or_else(|| AppError::NotFound("room_not_found".into()))?;
    let participants = db::rooms::participants(&state.pool, &room_id).await?;
    if !participants
        .iter()
        .any(|p| p.user_id == auth.user_id.as_str())
    {
        return Err(AppError::Forbidden("forbidden".into()));
    }

    let your_turn = room.state() == RoomState::Active
        && db::messages::can_send(&state.pool, &room_id, &auth.user_id).await?;
    let member_ids: Vec<&str> = participants.iter().map(|p| p.user_id.as_str()).collect();

    Ok(Json(serde_json::json!({
        "id": room.id,
        "is_active": room.is_active,
        "participants": member_ids,
        "your_turn": your_turn,
    })))
}

/// 部屋を終了して清算する。全履歴がクリーンなら両参加者に+2、
/// どこかに韓国語があれば報酬なし。どちらでも終了通知を1行追記する。
async fn end_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    auth: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let room_id = RoomId(room_id);

    match db::rooms::settle_room(&state.pool, &room_id, &auth.user_id).await? {
        SettleOutcome::Rewarded { points, notice } => {
            announce_end(&state, &room_id, notice);
            Ok(Json(serde_json::json!({
                "rewarded": true,
                "gained": db::rooms::REWARD_BONUS,
                "points": points,
            })))
        }
        SettleOutcome::Penalized { notice } => {
            announce_end(&state, &room_id, notice);
            Ok(Json(serde_json::json!({
                "rewarded": false,
                "reason": "korean_used",
            })))
        }
        SettleOutcome::AlreadyEnded => Err(AppError::Conflict("room_inactive".into())),
        SettleOutcome::NotParticipant => Err(AppError::Forbidden("forbidden".into())),
    }
}

/// 終了通知を購読者へ流してから部屋のチャネルを畳む。
fn announce_end(state: &AppState, room_id: &RoomId, notice: MessageRow) {
    state.notifier.publish(
        room_id.as_str(),
        RoomEvent::MessageCreated { message: notice },
    );
    state.notifier.publish(
        room_id.as_str(),
        RoomEvent::RoomEnded {
            room_id: room_id.as_str().to_string(),
        },
    );
}
