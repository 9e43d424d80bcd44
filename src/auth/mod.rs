use axum::Router;

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod jwt;
pub mod sessions;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
