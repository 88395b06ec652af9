use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Game management, mounted under `/api/admin`.
///
/// Access Control:
/// `create_router` wraps this router in a route layer that extracts `AdminAuth`,
/// so a request without the admin bearer token is answered with 401 before any
/// handler (and therefore any store operation) runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/games
        // Creates a game from an arbitrary JSON object.
        .route("/games", post(handlers::create_game))
        // PUT/DELETE /admin/games/{id}
        // Merge update, or removal, of a single game.
        .route(
            "/games/{id}",
            put(handlers::update_game).delete(handlers::delete_game),
        )
}
