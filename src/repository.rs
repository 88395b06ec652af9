use crate::models::{Click, DEFAULT_RATING, Game, GameInput};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    Client as MongoClient, Collection, Database, IndexModel,
    bson::{self, Bson, DateTime as BsonDateTime, Document, doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OnceCell;

/// RepositoryError
///
/// Everything that can go wrong below the handlers. The HTTP layer does not
/// distinguish between these: all of them become a 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid object id: {0}")]
    InvalidId(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store unavailable")]
    Unavailable,
}

/// Repository Trait
///
/// The persistence contract for games and clicks. Handlers only see this trait,
/// so the MongoDB implementation can be swapped for the in-memory one in tests.
///
/// Lookups by id return `Ok(None)` (or `Ok(false)` for delete) when the document
/// does not exist; a malformed id is an error.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Games ---
    // All games, highest rating first.
    async fn list_games(&self) -> Result<Vec<Game>, RepositoryError>;
    async fn get_game(&self, id: &str) -> Result<Option<Game>, RepositoryError>;
    async fn create_game(&self, input: GameInput) -> Result<Game, RepositoryError>;
    // Merge update; returns the document as it is after the update.
    async fn update_game(&self, id: &str, input: GameInput)
    -> Result<Option<Game>, RepositoryError>;
    async fn delete_game(&self, id: &str) -> Result<bool, RepositoryError>;

    // --- Clicks ---
    async fn record_click(&self, game_id: String) -> Result<Click, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

fn parse_object_id(id: &str) -> Result<ObjectId, RepositoryError> {
    ObjectId::parse_str(id).map_err(|_| RepositoryError::InvalidId(id.to_string()))
}

// --- MongoDB ---

const GAMES_COLLECTION: &str = "games";
const CLICKS_COLLECTION: &str = "clicks";

/// MongoRepository
///
/// The `Repository` backed by MongoDB. The connection is opened on first use and
/// then shared by every request; if opening fails, the next call tries again.
pub struct MongoRepository {
    uri: String,
    database_name: String,
    database: OnceCell<Database>,
}

impl MongoRepository {
    /// Does not touch the network; see `database`.
    pub fn new(uri: &str, database_name: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database_name: database_name.to_string(),
            database: OnceCell::new(),
        }
    }

    /// Returns the shared database handle, connecting first if needed.
    pub async fn database(&self) -> Result<&Database, RepositoryError> {
        self.database
            .get_or_try_init(|| async {
                tracing::info!(database = %self.database_name, "Connecting to MongoDB");
                let client = MongoClient::with_uri_str(&self.uri).await.map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    RepositoryError::from(e)
                })?;
                Ok::<_, RepositoryError>(client.database(&self.database_name))
            })
            .await
    }

    async fn games(&self) -> Result<Collection<Document>, RepositoryError> {
        Ok(self.database().await?.collection(GAMES_COLLECTION))
    }

    async fn clicks(&self) -> Result<Collection<Document>, RepositoryError> {
        Ok(self.database().await?.collection(CLICKS_COLLECTION))
    }

    /// Creates the indexes backing the listing sort and click lookups.
    pub async fn ensure_indexes(&self) -> Result<(), RepositoryError> {
        let rating_index = IndexModel::builder()
            .keys(doc! { "rating": -1 })
            .options(
                IndexOptions::builder()
                    .name("rating_desc".to_string())
                    .build(),
            )
            .build();
        self.games().await?.create_index(rating_index, None).await?;
        tracing::info!("Created index on games.rating");

        let game_id_index = IndexModel::builder()
            .keys(doc! { "gameId": 1 })
            .options(
                IndexOptions::builder()
                    .name("game_id_lookup".to_string())
                    .build(),
            )
            .build();
        self.clicks().await?.create_index(game_id_index, None).await?;
        tracing::info!("Created index on clicks.gameId");

        Ok(())
    }
}

/// Encodes the admin-supplied part of a game as BSON fields.
fn input_fields(input: &GameInput) -> Result<Document, RepositoryError> {
    let mut fields = Document::new();
    for (key, value) in &input.attributes {
        fields.insert(key.clone(), bson::to_bson(value)?);
    }
    if let Some(rating) = input.rating {
        fields.insert("rating", rating);
    }
    Ok(fields)
}

fn bson_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Decodes a stored game. Documents written by other tools may lack the
/// timestamps; the ObjectId creation time stands in for them. A missing rating
/// reads as `DEFAULT_RATING`, a non-numeric one is an error.
pub fn game_from_document(mut document: Document) -> Result<Game, RepositoryError> {
    let oid = document
        .get_object_id("_id")
        .map_err(|e| RepositoryError::Malformed(format!("_id: {}", e)))?;
    document.remove("_id");
    document.remove("__v");

    let rating = match document.remove("rating") {
        None | Some(Bson::Null) => DEFAULT_RATING,
        Some(value) => bson_number(&value).ok_or_else(|| {
            RepositoryError::Malformed(format!("game {}: non-numeric rating {}", oid, value))
        })?,
    };

    let created_at = match document.remove("createdAt") {
        Some(Bson::DateTime(at)) => at,
        _ => oid.timestamp(),
    };
    let updated_at = match document.remove("updatedAt") {
        Some(Bson::DateTime(at)) => at,
        _ => created_at,
    };

    let attributes = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        other => return Err(RepositoryError::Malformed(format!("game body: {}", other))),
    };

    Ok(Game {
        id: oid.to_hex(),
        rating,
        created_at: created_at.to_chrono(),
        updated_at: updated_at.to_chrono(),
        attributes,
    })
}

#[async_trait]
impl Repository for MongoRepository {
    async fn list_games(&self) -> Result<Vec<Game>, RepositoryError> {
        let options = FindOptions::builder().sort(doc! { "rating": -1 }).build();
        let mut cursor = self.games().await?.find(None, options).await?;

        let mut games = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            games.push(game_from_document(document)?);
        }
        Ok(games)
    }

    async fn get_game(&self, id: &str) -> Result<Option<Game>, RepositoryError> {
        let oid = parse_object_id(id)?;
        self.games()
            .await?
            .find_one(doc! { "_id": oid }, None)
            .await?
            .map(game_from_document)
            .transpose()
    }

    async fn create_game(&self, input: GameInput) -> Result<Game, RepositoryError> {
        let now = BsonDateTime::now();
        let mut document = doc! { "_id": ObjectId::new() };
        document.extend(input_fields(&input)?);
        if !document.contains_key("rating") {
            document.insert("rating", DEFAULT_RATING);
        }
        document.insert("createdAt", now);
        document.insert("updatedAt", now);

        self.games().await?.insert_one(&document, None).await?;
        game_from_document(document)
    }

    async fn update_game(
        &self,
        id: &str,
        input: GameInput,
    ) -> Result<Option<Game>, RepositoryError> {
        let oid = parse_object_id(id)?;
        let mut changes = input_fields(&input)?;
        changes.insert("updatedAt", BsonDateTime::now());

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.games()
            .await?
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": changes }, options)
            .await?
            .map(game_from_document)
            .transpose()
    }

    async fn delete_game(&self, id: &str) -> Result<bool, RepositoryError> {
        let oid = parse_object_id(id)?;
        let result = self
            .games()
            .await?
            .delete_one(doc! { "_id": oid }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn record_click(&self, game_id: String) -> Result<Click, RepositoryError> {
        let oid = ObjectId::new();
        let now = BsonDateTime::now();
        let document = doc! { "_id": oid, "gameId": game_id.as_str(), "createdAt": now };

        self.clicks().await?.insert_one(&document, None).await?;

        Ok(Click {
            id: oid.to_hex(),
            game_id,
            created_at: now.to_chrono(),
        })
    }
}

// --- In-Memory (tests and local experiments) ---

/// InMemoryRepository
///
/// A process-local `Repository` with the same observable behavior as the MongoDB
/// one: ObjectId-shaped ids, malformed ids rejected, descending rating order.
/// `new_failing` makes every call fail with `RepositoryError::Unavailable`.
#[derive(Default)]
pub struct InMemoryRepository {
    games: Mutex<Vec<Game>>,
    clicks: Mutex<Vec<Click>>,
    should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the stored games, in insertion order.
    pub fn games(&self) -> Vec<Game> {
        self.games.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Snapshot of the recorded clicks, in insertion order.
    pub fn clicks(&self) -> Vec<Click> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.should_fail {
            Err(RepositoryError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn lock_games(&self) -> Result<std::sync::MutexGuard<'_, Vec<Game>>, RepositoryError> {
        self.check()?;
        self.games.lock().map_err(|_| RepositoryError::Unavailable)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_games(&self) -> Result<Vec<Game>, RepositoryError> {
        let mut games = self.lock_games()?.clone();
        games.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        Ok(games)
    }

    async fn get_game(&self, id: &str) -> Result<Option<Game>, RepositoryError> {
        parse_object_id(id)?;
        let games = self.lock_games()?;
        Ok(games.iter().find(|g| g.id == id).cloned())
    }

    async fn create_game(&self, input: GameInput) -> Result<Game, RepositoryError> {
        let game = Game::new(ObjectId::new().to_hex(), input, Utc::now());
        self.lock_games()?.push(game.clone());
        Ok(game)
    }

    async fn update_game(
        &self,
        id: &str,
        input: GameInput,
    ) -> Result<Option<Game>, RepositoryError> {
        parse_object_id(id)?;
        let mut games = self.lock_games()?;
        Ok(games.iter_mut().find(|g| g.id == id).map(|game| {
            game.apply(input, Utc::now());
            game.clone()
        }))
    }

    async fn delete_game(&self, id: &str) -> Result<bool, RepositoryError> {
        parse_object_id(id)?;
        let mut games = self.lock_games()?;
        let before = games.len();
        games.retain(|g| g.id != id);
        Ok(games.len() < before)
    }

    async fn record_click(&self, game_id: String) -> Result<Click, RepositoryError> {
        self.check()?;
        let click = Click {
            id: ObjectId::new().to_hex(),
            game_id,
            created_at: Utc::now(),
        };
        self.clicks
            .lock()
            .map_err(|_| RepositoryError::Unavailable)?
            .push(click.clone());
        Ok(click)
    }
}
