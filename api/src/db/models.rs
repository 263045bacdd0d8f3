use serde::Serialize;

/// SQLite では TEXT として格納されるため String、
/// PostgreSQL では TIMESTAMPTZ として格納されるため chrono 型を使用。
#[cfg(not(feature = "postgres"))]
pub type Timestamp = String;
#[cfg(feature = "postgres")]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub nickname: String,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub points: i64,
    pub role: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WaitingRow {
    pub user_id: String,
    pub enqueued_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoomRow {
    pub id: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// ルームの状態。DB上は `is_active` の真偽値だが、
/// Active → Ended が終端遷移であることをコード上は型で扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Active,
    Ended,
}

impl RoomRow {
    pub fn state(&self) -> RoomState {
        if self.is_active {
            RoomState::Active
        } else {
            RoomState::Ended
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ParticipantRow {
    pub room_id: String,
    pub user_id: String,
    pub joined_at: Timestamp,
}

/// メッセージ。`id` はストアが払い出す単調増加の整数で、
/// `created_at` が同時刻のときの順序タイブレークに使う。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: Timestamp,
}
