use matcha_common::filter;

use super::models::{MessageRow, RoomRow, RoomState};
use super::{Db, sql};
use crate::types::{RoomId, UserId};

/// ターン制の本体。直前の送信者と異なるユーザだけが次を送れる。
/// 履歴が空の部屋はどちらが先に話してもよい。
pub fn turn_permits(last_sender: Option<&str>, sender: &str) -> bool {
    last_sender != Some(sender)
}

/// 部屋の最後の送信者。created_at が同値のときは id でタイブレーク。
#[tracing::instrument(skip(pool), err)]
pub async fn last_sender(pool: &Db, room_id: &RoomId) -> Result<Option<String>, sqlx::Error> {
    let q = sql(
        "SELECT sender_id FROM messages WHERE room_id = ?
         ORDER BY created_at DESC, id DESC LIMIT 1",
    );
    let row: Option<(String,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(s,)| s))
}

/// Turn Gate の読み取り版。保存された状態ではなく毎回ログから導出する。
/// 送信処理はこれを使わずトランザクション内で同じ判定をやり直す。
#[tracing::instrument(skip(pool), err)]
pub async fn can_send(pool: &Db, room_id: &RoomId, user_id: &UserId) -> Result<bool, sqlx::Error> {
    let last = last_sender(pool, room_id).await?;
    Ok(turn_permits(last.as_deref(), user_id.as_str()))
}

/// 部屋のメッセージ履歴。after_id を渡すとそれより後の行だけ返す（ポーリング用）。
#[tracing::instrument(skip(pool), err)]
pub async fn get_messages(
    pool: &Db,
    room_id: &RoomId,
    after_id: Option<i64>,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    let q = sql(
        "SELECT * FROM messages WHERE room_id = ? AND id > ?
         ORDER BY created_at ASC, id ASC",
    );
    sqlx::query_as::<_, MessageRow>(&q)
        .bind(room_id.as_str())
        .bind(after_id.unwrap_or(0))
        .fetch_all(pool)
        .await
}

#[tracing::instrument(skip(pool), err)]
pub async fn message_count(pool: &Db) -> Result<i64, sqlx::Error> {
    let q = sql("SELECT COUNT(*) FROM messages");
    let row: (i64,) = sqlx::query_as(&q).fetch_one(pool).await?;
    Ok(row.0)
}

/// 送信の結果。各失敗は安定した理由文字列に1対1で対応する。
#[derive(Debug)]
pub enum SendOutcome {
    Sent {
        message: MessageRow,
        points: i64,
        deducted: bool,
    },
    /// 残高が0、またはプロフィール未作成。points は現在の残高。
    InsufficientPoints { points: i64 },
    /// 部屋が存在しないか、既に終了している。
    RoomInactive,
    NotParticipant,
    NotYourTurn,
}

/// メッセージ送信。前提条件の検査から挿入・減点まで1トランザクションで
/// 行い、ターン判定と挿入の間に他の送信が割り込まないようにする。
///
/// 検査順: 残高 → 部屋の存在と状態 → 参加者か → ターン。
/// 韓国語を含む本文は挿入後に1ポイント減点する。入口で points > 0 を
/// 要求しているので残高が負になることはない。
#[tracing::instrument(skip(pool, content), err)]
pub async fn send_message(
    pool: &Db,
    room_id: &RoomId,
    sender_id: &UserId,
    content: &str,
) -> Result<SendOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let q = sql("SELECT points FROM profiles WHERE id = ?");
    let balance: Option<(i64,)> = sqlx::query_as(&q)
        .bind(sender_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    let points = balance.map(|(p,)| p).unwrap_or(0);
    if points <= 0 {
        tx.rollback().await?;
        return Ok(SendOutcome::InsufficientPoints { points });
    }

    let q = sql("SELECT * FROM chat_rooms WHERE id = ?");
    let room = sqlx::query_as::<_, RoomRow>(&q)
        .bind(room_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if !matches!(room.as_ref().map(RoomRow::state), Some(RoomState::Active)) {
        tx.rollback().await?;
        return Ok(SendOutcome::RoomInactive);
    }

    let q = sql("SELECT 1 FROM chat_participants WHERE room_id = ? AND user_id = ?");
    let member: Option<(i32,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .bind(sender_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if member.is_none() {
        tx.rollback().await?;
        return Ok(SendOutcome::NotParticipant);
    }

    let q = sql(
        "SELECT sender_id FROM messages WHERE room_id = ?
         ORDER BY created_at DESC, id DESC LIMIT 1",
    );
    let last: Option<(String,)> = sqlx::query_as(&q)
        .bind(room_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    if !turn_permits(last.as_ref().map(|(s,)| s.as_str()), sender_id.as_str()) {
        tx.rollback().await?;
        return Ok(SendOutcome::NotYourTurn);
    }

    let q = sql("INSERT INTO messages (room_id, sender_id, content) VALUES (?, ?, ?) RETURNING *");
    let message = sqlx::query_as::<_, MessageRow>(&q)
        .bind(room_id.as_str())
        .bind(sender_id.as_str())
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

    let deducted = filter::contains_korean(content);
    let points = if deducted {
        let q = sql("UPDATE profiles SET points = points - 1 WHERE id = ? RETURNING points");
        let (p,): (i64,) = sqlx::query_as(&q)
            .bind(sender_id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        p
    } else {
        points
    };

    tx.commit().await?;
    Ok(SendOutcome::Sent {
        message,
        points,
        deducted,
    })
}

#[cfg(all(test, not(feature = "postgres")))]
mod tests {
    use super::*;
    use crate::db::{self, profiles, rooms, waiting};

    async fn create_profiles(pool: &Db, ids: &[&str]) {
        for id in ids {
            profiles::create_profile(pool, &UserId((*id).into()), id, None, None)
                .await
                .unwrap();
        }
    }

    async fn matched_room(pool: &Db, a: &str, b: &str) -> RoomId {
        waiting::enqueue(pool, &UserId(a.into())).await.unwrap();
        waiting::enqueue(pool, &UserId(b.into())).await.unwrap();
        let room = rooms::find_or_create_match(pool, &UserId(b.into()))
            .await
            .unwrap()
            .expect("two waiting users should pair");
        RoomId(room.id)
    }

    fn assert_sent(outcome: SendOutcome) -> (MessageRow, i64, bool) {
        match outcome {
            SendOutcome::Sent {
                message,
                points,
                deducted,
            } => (message, points, deducted),
            other => panic!("expected Sent, got {other:?}"),
        }
    }

    // --- turn gate ---

    #[test]
    fn empty_log_lets_either_side_speak() {
        assert!(turn_permits(None, "u1"));
        assert!(turn_permits(None, "u2"));
    }

    #[test]
    fn last_sender_must_wait() {
        assert!(!turn_permits(Some("u1"), "u1"));
        assert!(turn_permits(Some("u1"), "u2"));
    }

    // --- send ---

    #[tokio::test]
    async fn first_message_may_come_from_either_side() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        assert!(can_send(&pool, &room_id, &UserId("u1".into())).await.unwrap());
        assert!(can_send(&pool, &room_id, &UserId("u2".into())).await.unwrap());

        let outcome = send_message(&pool, &room_id, &UserId("u2".into()), "Hi")
            .await
            .unwrap();
        let (message, points, deducted) = assert_sent(outcome);
        assert_eq!(message.sender_id, "u2");
        assert_eq!(message.content, "Hi");
        assert_eq!(points, 10);
        assert!(!deducted);
    }

    #[tokio::test]
    async fn turn_alternates_between_participants() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        assert_sent(
            send_message(&pool, &room_id, &UserId("u1".into()), "Hello")
                .await
                .unwrap(),
        );
        let again = send_message(&pool, &room_id, &UserId("u1".into()), "Me again")
            .await
            .unwrap();
        assert!(matches!(again, SendOutcome::NotYourTurn));
        assert!(!can_send(&pool, &room_id, &UserId("u1".into())).await.unwrap());

        assert_sent(
            send_message(&pool, &room_id, &UserId("u2".into()), "Hi")
                .await
                .unwrap(),
        );
        let again = send_message(&pool, &room_id, &UserId("u2".into()), "And me")
            .await
            .unwrap();
        assert!(matches!(again, SendOutcome::NotYourTurn));
    }

    #[tokio::test]
    async fn korean_content_deducts_one_point() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        let outcome = send_message(&pool, &room_id, &UserId("u1".into()), "안녕")
            .await
            .unwrap();
        let (message, points, deducted) = assert_sent(outcome);
        // 受理はされるが送信後に1ポイント引かれる
        assert_eq!(message.content, "안녕");
        assert!(deducted);
        assert_eq!(points, 9);

        let profile = profiles::get_profile(&pool, &UserId("u1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.points, 9);
    }

    #[tokio::test]
    async fn mixed_content_still_counts_as_korean() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        let outcome = send_message(&pool, &room_id, &UserId("u1".into()), "Hi 안녕")
            .await
            .unwrap();
        let (_, points, deducted) = assert_sent(outcome);
        assert!(deducted);
        assert_eq!(points, 9);
    }

    #[tokio::test]
    async fn zero_balance_blocks_send_regardless_of_content() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        let q = sql("UPDATE profiles SET points = 0 WHERE id = ?");
        sqlx::query(&q).bind("u1").execute(&pool).await.unwrap();

        let outcome = send_message(&pool, &room_id, &UserId("u1".into()), "Hello")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SendOutcome::InsufficientPoints { points: 0 }
        ));
        assert!(get_messages(&pool, &room_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_profile_counts_as_zero_balance() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        let outcome = send_message(&pool, &room_id, &UserId("u1".into()), "Hello")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SendOutcome::InsufficientPoints { points: 0 }
        ));
    }

    #[tokio::test]
    async fn ended_room_rejects_send() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        rooms::settle_room(&pool, &room_id, &UserId("u1".into()))
            .await
            .unwrap();
        let outcome = send_message(&pool, &room_id, &UserId("u2".into()), "Too late")
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::RoomInactive));
    }

    #[tokio::test]
    async fn missing_room_is_reported_as_inactive() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1"]).await;

        let outcome = send_message(&pool, &RoomId("nope".into()), &UserId("u1".into()), "Hi")
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::RoomInactive));
    }

    #[tokio::test]
    async fn outsider_cannot_send() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2", "u3"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        let outcome = send_message(&pool, &room_id, &UserId("u3".into()), "Let me in")
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::NotParticipant));
    }

    #[tokio::test]
    async fn history_is_ascending_and_after_id_filters() {
        let pool = db::test_pool().await;
        create_profiles(&pool, &["u1", "u2"]).await;
        let room_id = matched_room(&pool, "u1", "u2").await;

        for (user, text) in [("u1", "one"), ("u2", "two"), ("u1", "three")] {
            assert_sent(
                send_message(&pool, &room_id, &UserId(user.into()), text)
                    .await
                    .unwrap(),
            );
        }

        let all = get_messages(&pool, &room_id, None).await.unwrap();
        let texts: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);

        let newer = get_messages(&pool, &room_id, Some(all[1].id)).await.unwrap();
        let texts: Vec<&str> = newer.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["three"]);

        assert_eq!(message_count(&pool).await.unwrap(), 3);
    }
}
