mod admin;
mod matching;
mod message;
mod profile;
mod room;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(profile::routes())
        .merge(matching::routes())
        .merge(matching::public_routes())
        .merge(room::routes())
        .merge(message::routes())
        .merge(admin::routes());

    Router::new()
        .nest("/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
