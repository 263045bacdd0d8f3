use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::MessageRow;

/// 部屋単位の行変化イベント。
/// トランスポート（WS/SSE/ポーリング）はスコープ外で、ここは
/// 「新しい行を購読者へ知らせる」能力だけを提供する。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    MessageCreated { message: MessageRow },
    RoomEnded { room_id: String },
}

const CHANNEL_CAPACITY: usize = 64;

/// 部屋ごとのbroadcastチャネルのレジストリ。プロセス内限定。
#[derive(Debug, Default)]
pub struct RoomNotifier {
    channels: Mutex<HashMap<String, broadcast::Sender<RoomEvent>>>,
}

impl RoomNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 部屋のイベントを購読する。チャネルは初回購読時に作られる。
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<RoomEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// イベントを配り、受け取った購読者数を返す。購読者ゼロなら何もしない。
    /// RoomEnded を配ったらチャネルごと破棄する。部屋は終端状態に入った
    /// ので以後のイベントは無い。
    pub fn publish(&self, room_id: &str, event: RoomEvent) -> usize {
        let mut channels = self.channels.lock().unwrap();
        let ended = matches!(event, RoomEvent::RoomEnded { .. });
        let delivered = match channels.get(room_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        };
        if ended {
            channels.remove(room_id);
        }
        delivered
    }
}
