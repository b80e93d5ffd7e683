//! JSON gateway served by axum next to the gRPC server.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /api/v1/ping` | [`handlers::ping`] |
//! | `GET /api/v1/user/{id}` | [`handlers::user_get`] |
//! | `POST /api/v1/user/` | [`handlers::user_post`] |
//! | `GET /api/v1/status` | [`handlers::status`] |
//! | `POST /v1/hello` | [`handlers::hello`] |

pub mod error;
pub mod handlers;
pub mod user;

use crate::server::service::status::StatusService;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub status: StatusService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/ping", get(handlers::ping))
        .route("/api/v1/user/", post(handlers::user_post))
        .route("/api/v1/user/{id}", get(handlers::user_get))
        .route("/api/v1/status", get(handlers::status))
        .route("/v1/hello", post(handlers::hello))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
