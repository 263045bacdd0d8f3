use super::models::WaitingRow;
use super::{Db, sql};
use crate::types::UserId;

/// 待機プールに登録する。既に居る場合は enqueued_at を更新するだけ（冪等）。
#[tracing::instrument(skip(pool), err)]
pub async fn enqueue(pool: &Db, user_id: &UserId) -> Result<(), sqlx::Error> {
    let q = sql(
        "INSERT INTO waiting_pool (user_id) VALUES (?)
         ON CONFLICT (user_id) DO UPDATE SET enqueued_at = CURRENT_TIMESTAMP",
    );
    sqlx::query(&q).bind(user_id.as_str()).execute(pool).await?;
    Ok(())
}

/// 自分のエントリを取り下げる。エントリが無くても成功扱い。
#[tracing::instrument(skip(pool), err)]
pub async fn cancel(pool: &Db, user_id: &UserId) -> Result<bool, sqlx::Error> {
    let q = sql("DELETE FROM waiting_pool WHERE user_id = ?");
    let result = sqlx::query(&q).bind(user_id.as_str()).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(skip(pool), err)]
pub async fn get_entry(pool: &Db, user_id: &UserId) -> Result<Option<WaitingRow>, sqlx::Error> {
    let q = sql("SELECT * FROM waiting_pool WHERE user_id = ?");
    sqlx::query_as::<_, WaitingRow>(&q)
        .bind(user_id.as_str())
        .fetch_optional(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn waiting_count(pool: &Db) -> Result<i64, sqlx::Error> {
    let q = sql("SELECT COUNT(*) FROM waiting_pool");
    let row: (i64,) = sqlx::query_as(&q).fetch_one(pool).await?;
    Ok(row.0)
}
