use axum::Router;

use crate::state::AppState;

pub mod credentials;
mod dto;
mod error;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::user_routes())
        .merge(handlers::me_routes())
}
