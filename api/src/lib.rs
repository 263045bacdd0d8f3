pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod routes;
pub mod types;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Db;
use crate::notify::RoomNotifier;

/// 全ハンドラで共有するアプリケーション状態。
#[derive(Clone)]
pub struct AppState {
    pub pool: Db,
    pub config: AppConfig,
    pub notifier: Arc<RoomNotifier>,
}
