use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::types::UserId;

/// Authorizationヘッダーから取り出した認証済みユーザ。
///
/// トークンは外部の認証プロバイダが発行するHS256のJWTで、共有シークレットで
/// 検証だけを行う。発行・失効はプロバイダの責務。`sub` クレームがユーザID。
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
}

/// Bearerトークンを検証してユーザIDを取り出す。
/// 失敗の詳細はログにのみ残し、クライアントには一律 `unauthorized` を返す。
pub(crate) fn verify_token(secret: &str, token: &str) -> Result<UserId, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256)).map_err(|e| {
        tracing::debug!(error = %e, "token verification failed");
        AppError::Unauthorized("unauthorized".into())
    })?;
    Ok(UserId(data.claims.sub))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("unauthorized".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("unauthorized".into()))?;
        let user_id = verify_token(&state.config.jwt_secret, token)?;
        Ok(AuthenticatedUser { user_id })
    }
}
