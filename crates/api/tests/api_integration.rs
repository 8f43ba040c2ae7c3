//! API integration tests.
//!
//! Requests go through the real router, auth middleware and services,
//! backed by a migrated in-memory database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware::from_fn_with_state,
};
use chrono::{Duration, Utc};
use lgu_api::{AppState, auth_middleware, health_router, router as api_router};
use lgu_common::{
    Config, LocalStorage,
    config::{
        AuthConfig, DatabaseConfig, LoggingConfig, MarketplaceConfig, ServerConfig,
        StorageSettings,
    },
};
use lgu_core::{Actor, ActorRole, Claims, JwtIdentityProvider, NoOpNotificationDispatcher};
use lgu_db::test_utils::TestDatabase;
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";
const MUNI: i32 = 10;

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            url: "http://localhost:3000".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
            leeway_secs: 0,
        },
        storage: StorageSettings::default(),
        marketplace: MarketplaceConfig::default(),
        logging: LoggingConfig::default(),
        locations: HashMap::from([(MUNI.to_string(), "san-isidro".to_string())]),
    }
}

struct TestApp {
    app: Router,
    tokens: JwtIdentityProvider,
    _db: TestDatabase,
}

async fn setup() -> TestApp {
    let db = TestDatabase::in_memory().await.unwrap();
    let config = test_config();
    let identity = JwtIdentityProvider::new(&config.auth);
    let storage = Arc::new(LocalStorage::new(
        std::env::temp_dir().join("lgu-api-tests"),
        "/uploads".to_string(),
    ));

    let state = AppState::new(
        db.conn.clone(),
        &config,
        storage,
        Arc::new(NoOpNotificationDispatcher),
        Arc::new(identity.clone()),
    );

    let app = Router::new()
        .merge(health_router())
        .nest("/api", api_router())
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    TestApp {
        app,
        tokens: identity,
        _db: db,
    }
}

impl TestApp {
    fn token(&self, actor: &Actor) -> String {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        self.tokens.issue(&Claims::for_actor(actor, exp)).unwrap()
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        actor: Option<&Actor>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, "api-test")
            .header("x-forwarded-for", "198.51.100.20");
        if let Some(actor) = actor {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(actor)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// A listing created by `seller` and approved by the provincial admin.
    async fn approved_item(&self, seller: &Actor, kind: &str, price: Option<&str>) -> i64 {
        let (status, body) = self
            .send(
                "POST",
                "/api/marketplace/items",
                Some(seller),
                Some(json!({
                    "title": "Rice cooker",
                    "description": "Works fine, 1.8L",
                    "category": "appliances",
                    "condition": "good",
                    "transaction_type": kind,
                    "price": price,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "pending");
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = self
            .send(
                "POST",
                &format!("/api/admin/marketplace/{id}/approve"),
                Some(&admin()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "available");
        id
    }
}

fn resident(id: i32) -> Actor {
    Actor::resident(id, MUNI)
}

fn admin() -> Actor {
    Actor {
        role: ActorRole::Admin,
        ..Actor::resident(99, MUNI)
    }
}

fn pickup_body() -> Value {
    json!({
        "pickup_at": (Utc::now() + Duration::hours(2)).to_rfc3339(),
        "pickup_location": "Municipal Hall lobby",
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_mutations_require_a_token() {
    let app = setup().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/marketplace/transactions",
            None,
            Some(json!({ "item_id": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app
        .send("GET", "/api/marketplace/my-transactions", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_token_is_anonymous() {
    let app = setup().await;
    let request = Request::builder()
        .method("GET")
        .uri("/api/marketplace/my-items")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();

    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sale_over_http() {
    let app = setup().await;
    let buyer = resident(1);
    let seller = resident(2);
    let item_id = app.approved_item(&seller, "sell", Some("450.00")).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/marketplace/transactions",
            Some(&buyer),
            Some(json!({ "item_id": item_id, "notes": "Can pick up today" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    assert!(!body["data"]["amount"].is_null());
    let tx = body["data"]["id"].as_i64().unwrap();

    let steps: [(&Actor, &str, Option<Value>, &str); 5] = [
        (&seller, "propose", Some(pickup_body()), "awaiting_buyer"),
        (&buyer, "confirm", None, "accepted"),
        (&seller, "handover-seller", None, "handed_over"),
        (&buyer, "handover-buyer", None, "received"),
        (&buyer, "complete", None, "completed"),
    ];
    for (actor, action, body, expected) in steps {
        let (status, resp) = app
            .send(
                "POST",
                &format!("/api/marketplace/transactions/{tx}/{action}"),
                Some(actor),
                body,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{action}: {resp}");
        assert_eq!(resp["data"]["status"], expected, "{action}");
    }

    let (status, body) = app
        .send(
            "GET",
            &format!("/api/marketplace/transactions/{tx}/audit"),
            Some(&seller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let audit = body["data"]["audit"].as_array().unwrap();
    let actions: Vec<&str> = audit.iter().map(|a| a["action"].as_str().unwrap()).collect();
    assert_eq!(
        actions,
        [
            "request",
            "propose",
            "confirm",
            "handover_seller",
            "handover_buyer",
            "complete"
        ]
    );
    assert_eq!(audit[0]["ip_address"], "198.51.100.20");
    assert_eq!(audit[0]["user_agent"], "api-test");

    // Completed listings leave the catalog.
    let (status, _) = app
        .send(
            "GET",
            &format!("/api/marketplace/items/{item_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_party_gets_forbidden_role() {
    let app = setup().await;
    let buyer = resident(1);
    let seller = resident(2);
    let item_id = app.approved_item(&seller, "donate", None).await;

    let (_, body) = app
        .send(
            "POST",
            "/api/marketplace/transactions",
            Some(&buyer),
            Some(json!({ "item_id": item_id })),
        )
        .await;
    let tx = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/marketplace/transactions/{tx}/propose"),
            Some(&buyer),
            Some(pickup_body()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN_ROLE");
    assert!(body["error"]["message"].is_string());
    assert!(body.get("data").is_none());

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/marketplace/items/{item_id}"),
            Some(&seller),
            Some(json!({ "title": "Renamed mid-request" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert!(body["error"]["message"].is_string());

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/marketplace/transactions/{tx}/complete"),
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = app
        .send(
            "POST",
            "/api/marketplace/transactions",
            Some(&buyer),
            Some(json!({ "item_id": item_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DUPLICATE_REQUEST");
}

#[tokio::test]
async fn test_admin_endpoints() {
    let app = setup().await;
    let buyer = resident(1);
    let seller = resident(2);
    let item_id = app.approved_item(&seller, "sell", Some("100")).await;

    let (status, body) = app
        .send(
            "GET",
            "/api/admin/transactions",
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (_, body) = app
        .send(
            "POST",
            "/api/marketplace/transactions",
            Some(&buyer),
            Some(json!({ "item_id": item_id })),
        )
        .await;
    let tx = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/marketplace/transactions/{tx}/dispute"),
            Some(&buyer),
            Some(json!({ "reason": "Seller stopped replying" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "disputed");

    let (status, body) = app
        .send(
            "GET",
            "/api/admin/transactions?status=disputed",
            Some(&admin()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["transactions"][0]["item_title"], "Rice cooker");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/admin/transactions/{tx}/status"),
            Some(&admin()),
            Some(json!({ "status": "resolved", "notes": "Both parties reached" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "accepted");

    let (status, body) = app
        .send(
            "GET",
            &format!("/api/admin/transactions/{tx}"),
            Some(&admin()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let audit = body["data"]["audit"].as_array().unwrap();
    assert_eq!(audit.last().unwrap()["action"], "admin_resolution");
    assert_eq!(audit.last().unwrap()["actor_role"], "admin");
}

#[tokio::test]
async fn test_marketplace_stats() {
    let app = setup().await;
    let seller = resident(2);
    app.approved_item(&seller, "sell", Some("100")).await;
    app.approved_item(&seller, "donate", None).await;

    let (status, body) = app
        .send("GET", "/api/admin/marketplace/stats", Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]["code"].is_string());

    let (status, body) = app
        .send("GET", "/api/admin/marketplace/stats", Some(&admin()), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total_items"], 2);
    assert_eq!(body["data"]["available_items"], 2);
    assert_eq!(body["data"]["pending_items"], 0);
}

#[tokio::test]
async fn test_moderation_queue() {
    let app = setup().await;
    let seller = resident(2);

    let (_, body) = app
        .send(
            "POST",
            "/api/marketplace/items",
            Some(&seller),
            Some(json!({
                "title": "Old bicycle",
                "description": "Needs new tires",
                "category": "vehicles",
                "condition": "fair",
                "transaction_type": "donate",
            })),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            "GET",
            &format!("/api/marketplace/items/{id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send("GET", "/api/admin/marketplace/pending", Some(&admin()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/admin/marketplace/{id}/reject"),
            Some(&admin()),
            Some(json!({ "reason": "Missing photos" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejection_reason"], "Missing photos");

    let (_, body) = app
        .send("GET", "/api/admin/marketplace/pending", Some(&admin()), None)
        .await;
    assert_eq!(body["data"]["total"], 0);
}
