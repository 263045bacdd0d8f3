use matcha_common::filter;

use super::models::{MessageRow, ParticipantRow, RoomRow};
use super::{Db, sql};
use crate::types::{RoomId, UserId};

/// 部屋の終了時にログへ追記される定型の通知メッセージ。
/// 構造的に特別な行ではなく、終了操作を行った側を送信者とする普通の1行。
pub const END_NOTICE: &str = "The other person has ended the chat.";

/// 履歴がクリーンなまま終了したとき各参加者へ加算されるボーナス。
pub const REWARD_BONUS: i64 = 2;

#[tracing::instrument(skip(pool), err)]
pub async fn get_room(pool: &Db, room_id: &RoomId) -> Result<Option<RoomRow>, sqlx::Error> {
    let q = sql("SELECT * FROM chat_rooms WHERE id = ?");
    sqlx::query_as::<_, RoomRow>(&q)
        .bind(room_id.as_str())
        .fetch_optional(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn participants(
    pool: &Db,
    room_id: &RoomId,
) -> Result<Vec<ParticipantRow>, sqlx::Error> {
    let q = sql("SELECT * FROM chat_participants WHERE room_id = ? ORDER BY user_id ASC");
    sqlx::query_as::<_, ParticipantRow>(&q)
        .bind(room_id.as_str())
        .fetch_all(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn is_participant(
    pool: &Db,
    room_id: &RoomId,
    user_id: &UserId,
) -> Result<bool, sqlx::Error> {
    let q = sql("SELECT 1 FROM chat_participants WHERE room_id = ? AND user_id = ?");
    let row: Option<(i32,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// そのユーザが参加しているアクティブな部屋。通常は高々1つ。
#[tracing::instrument(skip(pool), err)]
pub async fn active_room_for(
    pool: &Db,
    user_id: &UserId,
) -> Result<Option<RoomRow>, sqlx::Error> {
    let q = sql(
        "SELECT r.* FROM chat_rooms r
         JOIN chat_participants p ON p.room_id = r.id
         WHERE p.user_id = ? AND r.is_active = TRUE
         ORDER BY r.created_at DESC LIMIT 1",
    );
    sqlx::query_as::<_, RoomRow>(&q)
        .bind(user_id.as_str())
        .fetch_optional(pool)
        .await
}

/// マッチング本体。find-or-create を1トランザクションで行う。
///
/// 1. 呼び出し元が既にアクティブな部屋に居ればそれを返す。受動的に
///    マッチされた側はこのポーリングで初めて自分の部屋を知る。
/// 2. 最も長く待っている相手（自分以外、アクティブな部屋に未参加）を選ぶ。
/// 3. 両者の待機エントリを user_id 昇順で DELETE する。削除順を固定する
///    ことで並行するマッチャー同士のロック取得順が交差しない。相手の行を
///    消せなかったら別のマッチャーに先を越されたので手ぶらで戻る。
/// 4. 自分の行が消せなかった場合は直前に他人とマッチされた可能性がある
///    ので部屋を再確認し、見つかれば確保した相手を解放してそちらを返す。
/// 5. 部屋1行と参加者2行を作って返す。
#[tracing::instrument(skip(pool), err)]
pub async fn find_or_create_match(
    pool: &Db,
    user_id: &UserId,
) -> Result<Option<RoomRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let q = sql(
        "SELECT r.* FROM chat_rooms r
         JOIN chat_participants p ON p.room_id = r.id
         WHERE p.user_id = ? AND r.is_active = TRUE
         ORDER BY r.created_at DESC LIMIT 1",
    );
    let existing = sqlx::query_as::<_, RoomRow>(&q)
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(room) = existing {
        // 残っていれば自分の古い待機エントリを掃除しておく
        let q = sql("DELETE FROM waiting_pool WHERE user_id = ?");
        sqlx::query(&q)
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        return Ok(Some(room));
    }

    let q = sql(
        "SELECT user_id FROM waiting_pool
         WHERE user_id != ?
           AND NOT EXISTS (
               SELECT 1 FROM chat_participants p
               JOIN chat_rooms r ON r.id = p.room_id
               WHERE p.user_id = waiting_pool.user_id AND r.is_active = TRUE)
         ORDER BY enqueued_at ASC, user_id ASC
         LIMIT 1",
    );
    let partner: Option<(String,)> = sqlx::query_as(&q)
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    let Some((partner_id,)) = partner else {
        tx.commit().await?;
        return Ok(None);
    };
    let partner_id = UserId(partner_id);

    let mut claimed_own = false;
    let mut claimed_partner = false;
    let mut ids = [user_id.as_str(), partner_id.as_str()];
    ids.sort_unstable();
    for id in ids {
        let q = sql("DELETE FROM waiting_pool WHERE user_id = ?");
        let result = sqlx::query(&q).bind(id).execute(&mut *tx).await?;
        if result.rows_affected() > 0 {
            if id == partner_id.as_str() {
                claimed_partner = true;
            } else {
                claimed_own = true;
            }
        }
    }
    if !claimed_partner {
        tx.rollback().await?;
        return Ok(None);
    }
    if !claimed_own {
        let q = sql(
            "SELECT r.* FROM chat_rooms r
             JOIN chat_participants p ON p.room_id = r.id
             WHERE p.user_id = ? AND r.is_active = TRUE
             ORDER BY r.created_at DESC LIMIT 1",
        );
        let room = sqlx::query_as::<_, RoomRow>(&q)
            .bind(user_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(room) = room {
            tx.rollback().await?;
            return Ok(Some(room));
        }
        // enqueue していなかっただけなのでペア作成を続行
    }

    let room_id = RoomId::new_v4();
    let q = sql("INSERT INTO chat_rooms (id) VALUES (?) RETURNING *");
    let room = sqlx::query_as::<_, RoomRow>(&q)
        .bind(room_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
    let q = sql("INSERT INTO chat_participants (room_id, user_id) VALUES (?, ?)");
    for id in [user_id.as_str(), partner_id.as_str()] {
        sqlx::query(&q)
            .bind(room_id.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(Some(room))
}

/// 清算の結果。notice は追記された終了通知の行。
#[derive(Debug)]
pub enum SettleOutcome {
    /// 全履歴に韓国語が無く、参加者全員に +REWARD_BONUS を加算した。
    /// points は呼び出し元の新しい残高。
    Rewarded { points: i64, notice: MessageRow },
    /// 履歴のどこかに韓国語があったため加算なし。
    Penalized { notice: MessageRow },
    /// 部屋は既に終了している。報酬の二重払いはしない。
    AlreadyEnded,
    /// 呼び出し元がこの部屋の参加者でない。部屋が存在しない場合も含む。
    NotParticipant,
}

/// 部屋を終了して清算する。1トランザクション。
///
/// is_active = TRUE の行だけを倒す条件付き UPDATE を冪等性ガードとして
/// 先頭に置く。0行なら清算済みなので何も変更しない。
#[tracing::instrument(skip(pool), err)]
pub async fn settle_room(
    pool: &Db,
    room_id: &RoomId,
    caller_id: &UserId,
) -> Result<SettleOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let q = sql("SELECT 1 FROM chat_participants WHERE room_id = ? AND user_id = ?");
    let member: Option<(i32,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .bind(caller_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if member.is_none() {
        tx.rollback().await?;
        return Ok(SettleOutcome::NotParticipant);
    }

    let q = sql("UPDATE chat_rooms SET is_active = FALSE WHERE id = ? AND is_active = TRUE");
    let flipped = sqlx::query(&q)
        .bind(room_id.as_str())
        .execute(&mut *tx)
        .await?;
    if flipped.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(SettleOutcome::AlreadyEnded);
    }

    // 減点チェックと違い、報酬判定は最後の1通ではなく全履歴に対して行う
    let q = sql("SELECT content FROM messages WHERE room_id = ?");
    let contents: Vec<(String,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .fetch_all(&mut *tx)
        .await?;
    let korean_used = contents.iter().any(|(c,)| filter::contains_korean(c));

    let reward_points = if korean_used {
        None
    } else {
        let q = sql("SELECT user_id FROM chat_participants WHERE room_id = ?");
        let members: Vec<(String,)> = sqlx::query_as(&q)
            .bind(room_id.as_str())
            .fetch_all(&mut *tx)
            .await?;
        let q = sql("UPDATE profiles SET points = points + ? WHERE id = ?");
        for (member_id,) in &members {
            sqlx::query(&q)
                .bind(REWARD_BONUS)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
        }
        let q = sql("SELECT points FROM profiles WHERE id = ?");
        let balance: Option<(i64,)> = sqlx::query_as(&q)
            .bind(caller_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        Some(balance.map(|(p,)| p).unwrap_or(0))
    };

    let q = sql("INSERT INTO messages (room_id, sender_id, content) VALUES (?, ?, ?) RETURNING *");
    let notice = sqlx::query_as::<_, MessageRow>(&q)
        .bind(room_id.as_str())
        .bind(caller_id.as_str())
        .bind(END_NOTICE)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    match reward_points {
        Some(points) => Ok(SettleOutcome::Rewarded { points, notice }),
        None => Ok(SettleOutcome::Penalized { notice }),
    }
}

#[tracing::instrument(skip(pool), err)]
pub async fn room_count(pool: &Db) -> Result<i64, sqlx::Error> {
    let q = sql("SELECT COUNT(*) FROM chat_rooms");
    let row: (i64,) = sqlx::query_as(&q).fetch_one(pool).await?;
    Ok(row.0)
}

#[tracing::instrument(skip(pool), err)]
pub async fn active_room_count(pool: &Db) -> Result<i64, sqlx::Error> {
    let q = sql("SELECT COUNT(*) FROM chat_rooms WHERE is_active = TRUE");
    let row: (i64,) = sqlx::query_as(&q).fetch_one(pool).await?;
    Ok(row.0)
}

#[tracing::instrument(skip(pool), err)]
pub async fn participant_count(pool: &Db) -> Result<i64, sqlx::Error> {
    let q = sql("SELECT COUNT(*) FROM chat_participants");
    let row: (i64,) = sqlx::query_as(&q).fetch_one(pool).await?;
    Ok(row.0)
}
