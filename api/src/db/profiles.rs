use super::models::ProfileRow;
use super::{Db, sql};
use crate::types::UserId;

/// プロフィールを新規作成する。重複IDはストアの一意制約違反としてそのまま返す。
/// points と role はスキーマのデフォルト（10 / 'normal'）に任せる。
#[tracing::instrument(skip(pool), err)]
pub async fn create_profile(
    pool: &Db,
    id: &UserId,
    nickname: &str,
    gender: Option<&str>,
    age_group: Option<&str>,
) -> Result<ProfileRow, sqlx::Error> {
    let q = sql(
        "INSERT INTO profiles (id, nickname, gender, age_group) VALUES (?, ?, ?, ?) RETURNING *",
    );
    sqlx::query_as::<_, ProfileRow>(&q)
        .bind(id.as_str())
        .bind(nickname)
        .bind(gender)
        .bind(age_group)
        .fetch_one(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn get_profile(pool: &Db, id: &UserId) -> Result<Option<ProfileRow>, sqlx::Error> {
    let q = sql("SELECT * FROM profiles WHERE id = ?");
    sqlx::query_as::<_, ProfileRow>(&q)
        .bind(id.as_str())
        .fetch_optional(pool)
        .await
}

/// 管理画面用。新しい順に最大 limit 件。
#[tracing::instrument(skip(pool), err)]
pub async fn recent_profiles(pool: &Db, limit: i64) -> Result<Vec<ProfileRow>, sqlx::Error> {
    let q = sql("SELECT * FROM profiles ORDER BY created_at DESC, id DESC LIMIT ?");
    sqlx::query_as::<_, ProfileRow>(&q)
        .bind(limit)
        .fetch_all(pool)
        .await
}
