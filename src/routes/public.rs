use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to any client. Mounted under `/api`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer check. Does not touch the store.
        .route("/health", get(|| async { "ok" }))
        // GET /hello
        .route("/hello", get(handlers::hello))
        // GET /games
        // Every game, highest rating first.
        .route("/games", get(handlers::list_games))
        // GET /games/{id}
        .route("/games/{id}", get(handlers::get_game))
        // POST /clicks
        // Appends a click event for a game id.
        .route("/clicks", post(handlers::record_click))
        // POST /upload
        // Multipart image upload into public blob storage. The body cap is raised
        // above the 5MB image limit so the handler can answer oversize with a 400.
        .route(
            "/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(handlers::UPLOAD_BODY_LIMIT)),
        )
}
