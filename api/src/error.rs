use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API共通のエラー型。`{"error": <reason>}` 形式のJSONで返す。
/// reason は機械可読な固定文字列（`not_your_turn` など）で、
/// プレゼンテーション層はこれを見て表示を切り替える。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("insufficient points: {points} left")]
    InsufficientPoints { points: i64 },
    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::debug!("store error: {e}");
        // ストアのエラーメッセージ（一意制約違反など）はそのまま返す
        AppError::Store(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": msg }),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            AppError::InsufficientPoints { points } => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": "insufficient_points", "points": points }),
            ),
            AppError::Store(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
        };
        (status, axum::Json(body)).into_response()
    }
}
