use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to the Document Store) ---

/// Rating given to a game whose creator did not supply one.
pub const DEFAULT_RATING: f64 = 0.0;

/// Keys owned by the store. They are stripped from admin-supplied bodies.
pub const RESERVED_GAME_KEYS: [&str; 4] = ["_id", "__v", "createdAt", "updatedAt"];

/// Game
///
/// A listed game from the `games` collection. Besides the store-managed id and
/// timestamps, only `rating` has a known type (it drives the listing order);
/// every other attribute is admin-defined and round-trips untouched, flattened
/// into the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Game {
    /// Store-generated ObjectId, as 24 hex characters.
    #[serde(rename = "_id")]
    #[schema(example = "665f1c2ab9e4a1d3c8f00a12")]
    pub id: String,
    pub rating: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Free-form admin attributes (title, thumbnail, link, ...).
    #[serde(flatten)]
    #[schema(ignore)]
    pub attributes: Map<String, Value>,
}

impl Game {
    /// Builds a fresh game from admin input. Missing rating falls back to `DEFAULT_RATING`.
    pub fn new(id: String, input: GameInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            rating: input.rating.unwrap_or(DEFAULT_RATING),
            created_at: now,
            updated_at: now,
            attributes: input.attributes,
        }
    }

    /// Merge update: every key present in `input` replaces the stored one,
    /// absent keys are left alone.
    pub fn apply(&mut self, input: GameInput, now: DateTime<Utc>) {
        if let Some(rating) = input.rating {
            self.rating = rating;
        }
        self.attributes.extend(input.attributes);
        self.updated_at = now;
    }
}

/// GameInputError
///
/// Why an admin body could not be turned into a `GameInput`.
#[derive(Debug, Error, PartialEq)]
pub enum GameInputError {
    #[error("game body must be a JSON object")]
    NotAnObject,
    #[error("rating must be a number, got {0}")]
    InvalidRating(String),
    #[error("attribute name {0:?} may not contain '.' or start with '$'")]
    InvalidKey(String),
}

/// GameInput
///
/// Normalized create/update body for the admin routes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameInput {
    pub rating: Option<f64>,
    pub attributes: Map<String, Value>,
}

impl GameInput {
    /// Accepts any JSON object. Store-owned keys are dropped, `rating` is cast
    /// to a number (numeric strings included) and `null` counts as absent.
    /// Top-level names containing `.` or starting with `$` are rejected.
    pub fn from_json(body: Value) -> Result<Self, GameInputError> {
        let Value::Object(mut attributes) = body else {
            return Err(GameInputError::NotAnObject);
        };

        for key in RESERVED_GAME_KEYS {
            attributes.remove(key);
        }

        // The store would read these as nested paths or operators.
        if let Some(key) = attributes
            .keys()
            .find(|key| key.contains('.') || key.starts_with('$'))
        {
            return Err(GameInputError::InvalidKey(key.clone()));
        }

        let rating = match attributes.remove("rating") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_rating(&value)?),
        };

        Ok(Self { rating, attributes })
    }
}

fn parse_rating(value: &Value) -> Result<f64, GameInputError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|rating| rating.is_finite())
        .ok_or_else(|| GameInputError::InvalidRating(value.to_string()))
}

/// Click
///
/// An append-only click event from the `clicks` collection. `game_id` is stored
/// as given; it is not checked against existing games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Click {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_id: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// ClickRequest
///
/// Input payload for POST /api/clicks.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClickRequest {
    #[schema(example = "665f1c2ab9e4a1d3c8f00a12")]
    pub game_id: String,
}

// --- Response Payloads (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HelloResponse {
    pub message: String,
}

/// Confirmation body, e.g. after a delete.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// UploadResponse
///
/// Public URL of an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub url: String,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}
