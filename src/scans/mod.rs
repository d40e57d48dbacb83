use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod hub;
pub mod record;
pub mod repo;
pub mod services;

pub use hub::ScanHub;

pub fn router() -> Router<AppState> {
    handlers::scan_routes()
}
