//! Web server adapter.
//!
//! Axum router serving the journal pages plus a JSON API used by the
//! frontend scripts. All logic is delegated to the domain and the ports.

mod api;
mod error;
mod handlers;
mod templates;

pub use error::{ApiError, WebError};

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::JournalPort;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub struct AppState {
    pub journal: Arc<dyn JournalPort + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
    pub images_dir: PathBuf,
}

pub fn build_router(state: AppState) -> Router {
    let images_dir = state.images_dir.clone();
    Router::new()
        .route("/", get(handlers::index))
        .route("/day/{key}", get(handlers::day_view))
        .route("/trade/{id}", get(handlers::trade_view))
        .route("/analytics", get(handlers::analytics_view))
        .route("/portfolios", get(handlers::portfolios_view))
        .route("/settings", get(handlers::settings_view))
        .route("/live", get(handlers::live_view))
        .route("/api/import", post(api::import_fills))
        .route("/api/day/{id}", delete(api::delete_day))
        .route("/api/trade/{id}/tags", post(api::save_tags))
        .route("/api/trade/{id}/notes", post(api::save_notes))
        .route("/api/trade/{id}/images", post(api::upload_image))
        .route("/api/image/{id}/caption", post(api::update_caption))
        .route("/api/image/{id}", delete(api::delete_image))
        .route("/api/portfolio", post(api::create_portfolio))
        .route(
            "/api/portfolio/{id}",
            put(api::update_portfolio).delete(api::delete_portfolio),
        )
        .route("/api/portfolios", get(api::list_portfolios))
        .route(
            "/api/settings/theme",
            get(api::get_theme).post(api::save_theme),
        )
        .route("/api/settings/tags", get(api::get_tag_config))
        .route("/api/settings/tags/{group_id}", post(api::save_tag_config))
        .route(
            "/api/settings/tags/{group_id}/reset",
            post(api::reset_tag_config),
        )
        .route(
            "/api/settings/trade-defaults",
            post(api::save_trade_defaults),
        )
        .route(
            "/api/settings/instruments",
            post(api::save_instrument_config),
        )
        .route("/api/analytics", get(api::analytics))
        .route("/api/db/export", get(api::db_export))
        .route("/api/db/import", post(api::db_import))
        .route("/api/live", post(api::create_live_trade))
        .route(
            "/api/live/{id}",
            put(api::update_live_trade).delete(api::delete_live_trade),
        )
        .route("/api/live/{id}/levels", put(api::update_live_levels))
        .route("/api/live/{id}/execute", post(api::live_execute))
        .route("/api/live/{id}/push", post(api::live_push))
        .route(
            "/api/live/{id}/execution/{exec_id}",
            delete(api::delete_execution),
        )
        .route("/api/live/{id}/recalc", get(api::live_recalc))
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/images", ServeDir::new(images_dir))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(Arc::new(state))
}
