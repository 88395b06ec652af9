use crate::{
    AppState,
    error::ApiError,
    models::{
        Click, ClickRequest, Game, GameInput, HelloResponse, MessageResponse, UploadResponse,
    },
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
};
use serde_json::Value;

/// Largest accepted image: 5 MiB. Exactly 5 MiB is still accepted.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Request body cap for the upload route. Above `MAX_UPLOAD_BYTES` so an
/// oversized image is answered with our 400, not a transport-level 413.
pub const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub const GREETING: &str = "Hello from EarnWale!";

const GAME_NOT_FOUND: &str = "Game not found";
const NO_FILE: &str = "No file provided";
const NOT_AN_IMAGE: &str = "File must be an image";
const FILE_TOO_LARGE: &str = "File size must be less than 5MB";
const UPLOAD_FAILED: &str = "Failed to upload image";

// --- Public Handlers ---

/// hello
///
/// [Public Route] Static greeting, handy as a smoke test for the frontend.
#[utoipa::path(
    get,
    path = "/api/hello",
    responses((status = 200, description = "Greeting", body = HelloResponse))
)]
pub async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: GREETING.to_string(),
    })
}

/// list_games
///
/// [Public Route] Every game, highest rating first. No filtering, no paging.
#[utoipa::path(
    get,
    path = "/api/games",
    responses(
        (status = 200, description = "All games by rating, descending", body = [Game]),
        (status = 500, description = "Store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn list_games(State(state): State<AppState>) -> Result<Json<Vec<Game>>, ApiError> {
    let games = state
        .repo
        .list_games()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch games", e))?;
    Ok(Json(games))
}

/// get_game
///
/// [Public Route] One game by id. A malformed id is a store failure (500), not a 404.
#[utoipa::path(
    get,
    path = "/api/games/{id}",
    params(("id" = String, Path, description = "Game ObjectId (hex)")),
    responses(
        (status = 200, description = "Found", body = Game),
        (status = 404, description = "Not Found", body = crate::models::ErrorResponse),
        (status = 500, description = "Malformed id or store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    state
        .repo
        .get_game(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch game", e))?
        .map(Json)
        .ok_or(ApiError::NotFound(GAME_NOT_FOUND))
}

/// record_click
///
/// [Public Route] Appends a click event. The game id is stored as given; it is
/// not checked against the games collection.
#[utoipa::path(
    post,
    path = "/api/clicks",
    request_body = ClickRequest,
    responses(
        (status = 200, description = "Recorded", body = Click),
        (status = 500, description = "Unreadable body or store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn record_click(
    State(state): State<AppState>,
    payload: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<Json<Click>, ApiError> {
    const FAILED: &str = "Failed to record click";

    let Json(payload) = payload.map_err(|e| ApiError::internal(FAILED, e))?;
    let click = state
        .repo
        .record_click(payload.game_id)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    Ok(Json(click))
}

/// An image pulled out of the multipart body, already validated.
struct ImageUpload {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BadRequest(FILE_TOO_LARGE)
    } else {
        ApiError::internal(UPLOAD_FAILED, err)
    }
}

/// Finds the `file` field and validates it: present, `image/*`, at most
/// `MAX_UPLOAD_BYTES`. The content type is checked before any byte is read and
/// the size while streaming, so an oversized file is never fully buffered.
async fn read_image(multipart: &mut Multipart) -> Result<ImageUpload, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::BadRequest(NOT_AN_IMAGE));
        }
        let file_name = field.file_name().unwrap_or_default().to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::BadRequest(FILE_TOO_LARGE));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(ImageUpload {
            file_name,
            content_type,
            data,
        });
    }

    Err(ApiError::BadRequest(NO_FILE))
}

/// upload_image
///
/// [Public Route] Stores an image in public blob storage under its original
/// filename and returns its public URL. Rejected uploads never reach storage.
#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "Uploaded", body = UploadResponse),
        (status = 400, description = "Missing file, not an image, or larger than 5MB", body = crate::models::ErrorResponse),
        (status = 500, description = "Storage failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::internal(UPLOAD_FAILED, e))?;
    let image = read_image(&mut multipart).await?;

    let size = image.data.len();
    let url = state
        .storage
        .put_public(&image.file_name, &image.content_type, image.data)
        .await
        .map_err(|e| ApiError::internal(UPLOAD_FAILED, e))?;

    tracing::info!(
        file_name = %image.file_name,
        content_type = %image.content_type,
        size,
        "Image uploaded"
    );

    Ok(Json(UploadResponse { url }))
}

// --- Admin Handlers ---
// Reached only through the admin router, whose route layer requires `AdminAuth`.

fn game_input(
    body: Result<Json<Value>, JsonRejection>,
    failed: &'static str,
) -> Result<GameInput, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::internal(failed, e))?;
    GameInput::from_json(body).map_err(|e| ApiError::internal(failed, e))
}

/// create_game
///
/// [Admin Route] Persists an arbitrary JSON object as a new game. `rating`
/// defaults to 0; `_id` and the timestamps are assigned by the store.
#[utoipa::path(
    post,
    path = "/api/admin/games",
    security(("admin_token" = [])),
    responses(
        (status = 201, description = "Created", body = Game),
        (status = 401, description = "Missing or invalid admin token", body = crate::models::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn create_game(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    const FAILED: &str = "Failed to create game";

    let input = game_input(body, FAILED)?;
    let game = state
        .repo
        .create_game(input)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    tracing::info!(game_id = %game.id, "Game created");
    Ok((StatusCode::CREATED, Json(game)))
}

/// update_game
///
/// [Admin Route] Merges the body into the stored game: keys present replace
/// the stored values, absent keys are kept.
#[utoipa::path(
    put,
    path = "/api/admin/games/{id}",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Game ObjectId (hex)")),
    responses(
        (status = 200, description = "Updated", body = Game),
        (status = 401, description = "Missing or invalid admin token", body = crate::models::ErrorResponse),
        (status = 404, description = "Not Found", body = crate::models::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn update_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Game>, ApiError> {
    const FAILED: &str = "Failed to update game";

    let input = game_input(body, FAILED)?;
    let game = state
        .repo
        .update_game(&id, input)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?
        .ok_or(ApiError::NotFound(GAME_NOT_FOUND))?;

    tracing::info!(game_id = %game.id, "Game updated");
    Ok(Json(game))
}

/// delete_game
///
/// [Admin Route] Removes a game. Deleting the same id twice yields 200 then 404.
#[utoipa::path(
    delete,
    path = "/api/admin/games/{id}",
    security(("admin_token" = [])),
    params(("id" = String, Path, description = "Game ObjectId (hex)")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid admin token", body = crate::models::ErrorResponse),
        (status = 404, description = "Not Found", body = crate::models::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::models::ErrorResponse)
    )
)]
pub async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state
        .repo
        .delete_game(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete game", e))?;

    if !deleted {
        return Err(ApiError::NotFound(GAME_NOT_FOUND));
    }

    tracing::info!(game_id = %id, "Game deleted");
    Ok(Json(MessageResponse {
        message: "Game deleted successfully".to_string(),
    }))
}
