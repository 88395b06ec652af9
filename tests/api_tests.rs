use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use earnwale_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    handlers::GREETING,
    models::{Click, Game},
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";
const MISSING_ID: &str = "65a0000000000000000000ff";

// --- Test Harness ---

struct TestApp {
    router: axum::Router,
    repo: Arc<InMemoryRepository>,
}

fn spawn_app_with(repo: InMemoryRepository) -> TestApp {
    let repo = Arc::new(repo);
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config: AppConfig {
            admin_token: ADMIN_TOKEN.to_string(),
            ..AppConfig::default()
        },
    };
    TestApp {
        router: create_router(state),
        repo,
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(InMemoryRepository::new())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    async fn admin(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn create_game(&self, body: Value) -> Value {
        let (status, game) = self
            .admin(Method::POST, "/api/admin/games", Some(ADMIN_TOKEN), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        game
    }
}

// --- Public Routes ---

#[tokio::test]
async fn test_hello() {
    let app = spawn_app();
    let (status, body) = app.get("/api/hello").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": GREETING }));
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();
    let (status, body) = app.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn test_routes_live_under_api_base_path() {
    let app = spawn_app();
    let (status, _) = app.get("/games").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_games_sorted_by_rating_desc() {
    let app = spawn_app();
    for (title, rating) in [("Low", json!(1.5)), ("High", json!(9)), ("Mid", json!("4.2"))] {
        app.create_game(json!({ "title": title, "rating": rating }))
            .await;
    }
    app.create_game(json!({ "title": "Unrated" })).await;

    let (status, body) = app.get("/api/games").await;
    assert_eq!(status, StatusCode::OK);

    let games: Vec<Game> = serde_json::from_value(body).unwrap();
    let titles: Vec<&str> = games
        .iter()
        .map(|g| g.attributes["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["High", "Mid", "Low", "Unrated"]);
    assert!(games.windows(2).all(|w| w[0].rating >= w[1].rating));
}

#[tokio::test]
async fn test_list_games_empty() {
    let app = spawn_app();
    let (status, body) = app.get("/api/games").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_games_store_failure() {
    let app = spawn_app_with(InMemoryRepository::new_failing());
    let (status, body) = app.get("/api/games").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to fetch games" }));
}

#[tokio::test]
async fn test_get_missing_game_is_404() {
    let app = spawn_app();
    let (status, body) = app.get(&format!("/api/games/{}", MISSING_ID)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Game not found" }));
}

#[tokio::test]
async fn test_get_game_malformed_id_is_500() {
    let app = spawn_app();
    let (status, body) = app.get("/api/games/not-an-object-id").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to fetch game" }));
}

#[tokio::test]
async fn test_record_click() {
    let app = spawn_app();
    let request = Request::post("/api/clicks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "gameId": MISSING_ID }).to_string()))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    // The game does not exist; clicks are recorded regardless.
    let click: Click = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(click.game_id, MISSING_ID);
    assert_eq!(body["gameId"], MISSING_ID);
    assert!(body.get("createdAt").is_some());
    assert_eq!(app.repo.clicks(), vec![click]);
}

#[tokio::test]
async fn test_record_click_unreadable_body_is_500() {
    let app = spawn_app();
    let request = Request::post("/api/clicks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to record click" }));
    assert!(app.repo.clicks().is_empty());
}

#[tokio::test]
async fn test_record_click_store_failure() {
    let app = spawn_app_with(InMemoryRepository::new_failing());
    let request = Request::post("/api/clicks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "gameId": "g1" }).to_string()))
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Admin Routes ---

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let app = spawn_app();
    let created = app
        .create_game(json!({
            "title": "Space Miner",
            "rating": 4.5,
            "thumbnail": "https://cdn.example.com/space.png",
            "tags": ["arcade", "space"],
            "reward": { "coins": 50 }
        }))
        .await;

    let id = created["_id"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    assert_eq!(created["rating"], json!(4.5));
    assert_eq!(created["reward"], json!({ "coins": 50 }));

    let (status, fetched) = app.get(&format!("/api/games/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_game_ignores_store_managed_keys() {
    let app = spawn_app();
    let created = app
        .create_game(json!({ "_id": "forged", "createdAt": "yesterday", "title": "X" }))
        .await;

    assert_ne!(created["_id"], "forged");
    assert_ne!(created["createdAt"], "yesterday");
    assert_eq!(created["rating"], json!(0.0));
}

#[tokio::test]
async fn test_create_game_non_object_body_is_500() {
    let app = spawn_app();
    let (status, body) = app
        .admin(
            Method::POST,
            "/api/admin/games",
            Some(ADMIN_TOKEN),
            Some(json!(["not", "an", "object"])),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to create game" }));
    assert!(app.repo.games().is_empty());
}

#[tokio::test]
async fn test_update_game_merges_fields() {
    let app = spawn_app();
    let created = app
        .create_game(json!({ "title": "Old", "link": "https://a.example", "rating": 2 }))
        .await;
    let id = created["_id"].as_str().unwrap();

    let (status, updated) = app
        .admin(
            Method::PUT,
            &format!("/api/admin/games/{}", id),
            Some(ADMIN_TOKEN),
            Some(json!({ "title": "New", "rating": 7 })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["_id"], created["_id"]);
    assert_eq!(updated["title"], "New");
    assert_eq!(updated["link"], "https://a.example");
    assert_eq!(updated["rating"], json!(7.0));
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let (_, fetched) = app.get(&format!("/api/games/{}", id)).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_update_missing_game_is_404() {
    let app = spawn_app();
    let (status, body) = app
        .admin(
            Method::PUT,
            &format!("/api/admin/games/{}", MISSING_ID),
            Some(ADMIN_TOKEN),
            Some(json!({ "title": "Ghost" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Game not found" }));
}

#[tokio::test]
async fn test_update_with_invalid_rating_is_500() {
    let app = spawn_app();
    let created = app.create_game(json!({ "title": "T", "rating": 3 })).await;
    let id = created["_id"].as_str().unwrap();

    let (status, body) = app
        .admin(
            Method::PUT,
            &format!("/api/admin/games/{}", id),
            Some(ADMIN_TOKEN),
            Some(json!({ "rating": "five stars" })),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to update game" }));
    assert_eq!(app.repo.games()[0].rating, 3.0);
}

#[tokio::test]
async fn test_delete_game_twice() {
    let app = spawn_app();
    let created = app.create_game(json!({ "title": "Doomed" })).await;
    let path = format!("/api/admin/games/{}", created["_id"].as_str().unwrap());

    let (status, body) = app
        .admin(Method::DELETE, &path, Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Game deleted successfully" }));

    let (status, body) = app
        .admin(Method::DELETE, &path, Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Game not found" }));
}

#[tokio::test]
async fn test_delete_malformed_id_is_500() {
    let app = spawn_app();
    let (status, body) = app
        .admin(Method::DELETE, "/api/admin/games/xyz", Some(ADMIN_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to delete game" }));
}

// --- Admin Authorization ---

#[tokio::test]
async fn test_admin_create_without_token_is_401_and_store_untouched() {
    let app = spawn_app();
    let (status, body) = app
        .admin(
            Method::POST,
            "/api/admin/games",
            None,
            Some(json!({ "title": "Sneaky" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));
    assert!(app.repo.games().is_empty());
}

#[tokio::test]
async fn test_admin_mutations_with_wrong_token_never_touch_store() {
    let app = spawn_app();
    let created = app
        .create_game(json!({ "title": "Safe", "rating": 5 }))
        .await;
    let path = format!("/api/admin/games/{}", created["_id"].as_str().unwrap());
    let before = app.repo.games();

    let (status, _) = app
        .admin(
            Method::PUT,
            &path,
            Some("wrong-token"),
            Some(json!({ "title": "Hacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .admin(Method::DELETE, &path, Some("wrong-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .admin(
            Method::POST,
            "/api/admin/games",
            Some(""),
            Some(json!({ "title": "Empty token" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.repo.games(), before);
}

#[tokio::test]
async fn test_unconfigured_admin_token_locks_admin_routes() {
    let repo = Arc::new(InMemoryRepository::new());
    let router = create_router(AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config: AppConfig {
            admin_token: String::new(),
            ..AppConfig::default()
        },
    });

    for token in ["local-admin-token", ""] {
        let request = Request::post("/api/admin/games")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "title": "Sneaky" }).to_string()))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(repo.games().is_empty());
}

#[tokio::test]
async fn test_admin_token_without_bearer_prefix_is_401() {
    let app = spawn_app();
    let request = Request::post("/api/admin/games")
        .header(header::AUTHORIZATION, ADMIN_TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "title": "No prefix" }).to_string()))
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.repo.games().is_empty());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = spawn_app();
    let (status, body) = app.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/games/{id}").is_some());
    assert!(body["paths"].get("/api/admin/games").is_some());
}
