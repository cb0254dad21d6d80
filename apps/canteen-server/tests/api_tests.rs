use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use canteen_core::{Money, Role, User};
use canteen_db::{Database, DbConfig};
use canteen_server::auth::JwtManager;
use canteen_server::config::ServerConfig;
use canteen_server::notifier::{NotifyError, TicketNotifier};
use canteen_server::rate_limit::{InMemoryLoginAttemptStore, LoginLimits};
use canteen_server::services::TicketService;
use canteen_server::{build_router, AppState};

// =============================================================================
// Harness
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Purchase { to: String, tickets: Vec<String> },
    Winner { to: String, ticket_number: String },
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

#[async_trait]
impl TicketNotifier for RecordingNotifier {
    async fn send_purchase_confirmation(
        &self,
        to: &str,
        ticket_numbers: &[String],
        _total: Money,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push(Sent::Purchase {
            to: to.to_string(),
            tickets: ticket_numbers.to_vec(),
        });
        Ok(())
    }

    async fn send_winner_notification(
        &self,
        to: &str,
        ticket_number: &str,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push(Sent::Winner {
            to: to.to_string(),
            ticket_number: ticket_number.to_string(),
        });
        Ok(())
    }
}

struct TestApp {
    router: Router,
    db: Database,
    jwt: JwtManager,
    notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ServerConfig::for_tests();
        let notifier = Arc::new(RecordingNotifier::default());
        let attempts = Arc::new(InMemoryLoginAttemptStore::new(LoginLimits {
            max_attempts: 3,
            lockout: Duration::from_secs(900),
        }));

        let state = AppState::new(db.clone(), &config, notifier.clone(), attempts)
            .with_ticket_service(TicketService::with_seed(db.clone(), notifier.clone(), 7));

        TestApp {
            router: build_router(state),
            db,
            jwt: JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_secs),
            notifier,
        }
    }

    /// Creates an operator directly and returns a bearer token for it.
    async fn operator(&self, username: &str, role: Role) -> (User, String) {
        let user = self
            .db
            .users()
            .create(username, "not-a-real-hash", role)
            .await
            .unwrap();
        let token = self.jwt.generate_token(&user).unwrap();
        (user, token)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn buy(&self, token: Option<&str>, email: &str, quantity: i64, amount: f64) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/api/tickets/purchase",
                token,
                Some(json!({
                    "email": email,
                    "quantity": quantity,
                    "totalAmount": amount,
                    "paymentMethod": "cash"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "purchase failed: {body}");
        body
    }

    /// Waits for fire-and-forget notifications to land.
    async fn sent(&self, expected: usize) -> Vec<Sent> {
        for _ in 0..100 {
            let sent = self.notifier.sent.lock().await.clone();
            if sent.len() >= expected {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.sent.lock().await.clone()
    }
}

// =============================================================================
// Purchase
// =============================================================================

#[tokio::test]
async fn test_public_purchase_and_confirmation() {
    let app = TestApp::new().await;

    let body = app.buy(None, "Buyer@Example.com", 1, 0.5).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["email"], "buyer@example.com");
    assert_eq!(body["totalAmount"], 0.5);

    let tickets = body["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 1);
    let number = tickets[0].as_str().unwrap().to_string();
    assert!(
        canteen_core::ticket_number::is_valid_ticket_number(&number),
        "unexpected number {number}"
    );

    let sent = app.sent(1).await;
    assert_eq!(
        sent,
        vec![Sent::Purchase {
            to: "buyer@example.com".to_string(),
            tickets: vec![number],
        }]
    );
}

#[tokio::test]
async fn test_purchase_rejects_wrong_price() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/tickets/purchase",
            None,
            Some(json!({"email": "a@b.co", "quantity": 1, "totalAmount": 0.49})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "PRICE_MISMATCH");

    let (status, body) = app
        .send(
            "POST",
            "/api/tickets/purchase",
            None,
            Some(json!({"email": "a@b.co", "quantity": 2, "totalAmount": 1.0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "QUANTITY_NOT_OFFERED");

    assert_eq!(app.db.tickets().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_purchase_accepts_claims_within_a_cent() {
    let app = TestApp::new().await;

    for claimed in [0.495, 0.505, 0.507] {
        let body = app.buy(None, "a@b.co", 1, claimed).await;
        // The configured price is charged, not the claim
        assert_eq!(body["totalAmount"], 0.5, "claimed {claimed}");
    }

    for claimed in [0.49, 0.51] {
        let (status, body) = app
            .send(
                "POST",
                "/api/tickets/purchase",
                None,
                Some(json!({"email": "a@b.co", "quantity": 1, "totalAmount": claimed})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "claimed {claimed}");
        assert_eq!(body["code"], "PRICE_MISMATCH");
    }

    assert_eq!(app.db.tickets().count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/api/tickets/purchase",
            None,
            Some(json!({"email": "a@b.co"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_config_offer_round_trip() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;

    let (status, body) = app.send("GET", "/api/tickets/config", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["basePrice"], 0.5);

    let (status, body) = app
        .send(
            "PUT",
            "/api/tickets/config",
            Some(&admin),
            Some(json!({"basePrice": 0.5, "quantityOffers": [{"quantity": 3, "price": 1.0}]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["active"], true);

    let body = app.buy(None, "group@example.com", 3, 1.0).await;
    assert_eq!(body["tickets"].as_array().unwrap().len(), 3);

    // Invalid submission keeps the current version
    let (status, _) = app
        .send(
            "PUT",
            "/api/tickets/config",
            Some(&admin),
            Some(json!({"basePrice": -1.0, "quantityOffers": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send("GET", "/api/tickets/config/admin", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["effective"]["quantityOffers"][0]["quantity"], 3);
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_config_rejects_sub_cent_negative_prices() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;

    for body in [
        json!({"basePrice": -0.004, "quantityOffers": []}),
        json!({"basePrice": 0.5, "quantityOffers": [{"quantity": 3, "price": -0.001}]}),
    ] {
        let (status, response) = app
            .send("PUT", "/api/tickets/config", Some(&admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{response}");
        assert_eq!(response["code"], "VALIDATION_ERROR");
    }

    assert!(app.db.ticket_configs().get_active().await.unwrap().is_none());
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new().await;
    let (_, seller) = app.operator("alice", Role::Seller).await;
    let (_, admin) = app.operator("root", Role::Admin).await;

    let (status, body) = app.send("GET", "/api/tickets/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = app
        .send("GET", "/api/tickets/stats", Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app
        .send("GET", "/api/tickets/stats", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = app
        .send("GET", "/api/tickets/stats", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_disabled_operator_token_is_rejected() {
    let app = TestApp::new().await;
    let (user, token) = app.operator("alice", Role::Seller).await;

    let (status, _) = app.send("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    app.db
        .users()
        .update(
            &user.id,
            &canteen_db::UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, _) = app.send("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_cookie_and_lockout() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(
            "POST",
            "/api/users",
            Some(&app.operator("root", Role::Admin).await.1),
            Some(json!({"username": "alice", "password": "correct-pass", "role": "seller"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .raw(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "alice", "password": "correct-pass"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    let token_cookie = cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, token_cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..3 {
        let (status, _) = app
            .send(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": "alice", "password": "wrong"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = app
        .raw(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "alice", "password": "correct-pass"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_cancel_rules_and_audit_trail() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;

    app.buy(None, "buyer@example.com", 1, 0.5).await;
    let (_, page) = app.send("GET", "/api/tickets", Some(&admin), None).await;
    let id = page["tickets"][0]["id"].as_str().unwrap().to_string();
    let number = page["tickets"][0]["ticketNumber"].as_str().unwrap().to_string();
    let cancel_uri = format!("/api/tickets/{id}/cancel");

    let (status, _) = app
        .send("POST", &cancel_uri, Some(&admin), Some(json!({"reason": "  "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            "POST",
            &cancel_uri,
            Some(&admin),
            Some(json!({"reason": "Refund at the counter"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellationReason"], "Refund at the counter");

    let (status, body) = app
        .send("POST", &cancel_uri, Some(&admin), Some(json!({"reason": "again"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TICKET_ALREADY_CANCELLED");

    let (_, body) = app
        .send(
            "GET",
            &format!("/api/tickets/logs?ticketNumber={number}"),
            Some(&admin),
            None,
        )
        .await;
    let actions: Vec<&str> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["action"].as_str())
        .collect();
    assert!(actions.contains(&"created"));
    assert!(actions.contains(&"cancelled"));

    let (_, stats) = app.send("GET", "/api/tickets/stats", Some(&admin), None).await;
    assert_eq!(stats["cancelled"], 1);
    assert_eq!(stats["revenue"], 0.0);
}

#[tokio::test]
async fn test_draw_reset_and_notifications() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;
    let draw = json!({"excludeWinners": true});

    let (status, body) = app
        .send("POST", "/api/tickets/draw", Some(&admin), Some(draw.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NO_ELIGIBLE_TICKETS");

    app.buy(None, "lucky@example.com", 1, 0.5).await;

    let (status, body) = app
        .send("POST", "/api/tickets/draw", Some(&admin), Some(draw.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["winner"]["email"], "lucky@example.com");
    let winner_id = body["winner"]["id"].as_str().unwrap().to_string();
    let winner_number = body["winner"]["ticketNumber"].as_str().unwrap().to_string();

    // The only ticket already won
    let (status, _) = app
        .send("POST", "/api/tickets/draw", Some(&admin), Some(draw.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Winners cannot be cancelled
    let (status, body) = app
        .send(
            "POST",
            &format!("/api/tickets/{winner_id}/cancel"),
            Some(&admin),
            Some(json!({"reason": "nope"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TICKET_IS_WINNER");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/tickets/{winner_id}/reset-winner"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["isWinner"], false);

    let (status, _) = app
        .send("POST", "/api/tickets/draw", Some(&admin), Some(draw))
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.sent(3).await;
    assert!(sent.contains(&Sent::Winner {
        to: "lucky@example.com".to_string(),
        ticket_number: winner_number,
    }));
}

#[tokio::test]
async fn test_batch_and_resend() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;
    app.send(
        "PUT",
        "/api/tickets/config",
        Some(&admin),
        Some(json!({"basePrice": 0.5, "quantityOffers": [{"quantity": 2, "price": 0.9}]})),
    )
    .await;

    let purchase = app.buy(None, "pair@example.com", 2, 0.9).await;
    let (_, page) = app.send("GET", "/api/tickets", Some(&admin), None).await;
    let id = page["tickets"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("GET", &format!("/api/tickets/{id}/batch"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batchId"], purchase["batchId"]);
    assert_eq!(body["tickets"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send("POST", &format!("/api/tickets/{id}/resend"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tickets"].as_array().unwrap().len(), 2);

    assert_eq!(app.sent(2).await.len(), 2);
}

#[tokio::test]
async fn test_delete_all_requires_confirmation() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;
    app.buy(None, "a@example.com", 1, 0.5).await;
    app.buy(None, "b@example.com", 1, 0.5).await;

    let (status, body) = app
        .send(
            "DELETE",
            "/api/tickets/all",
            Some(&admin),
            Some(json!({"confirm": "yes"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFIRMATION_REQUIRED");

    let (status, body) = app
        .send(
            "DELETE",
            "/api/tickets/all",
            Some(&admin),
            Some(json!({"confirm": "DELETE_ALL_TICKETS"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 2);
    assert_eq!(app.db.tickets().count().await.unwrap(), 0);
}

// =============================================================================
// Reporting
// =============================================================================

#[tokio::test]
async fn test_seller_attribution_and_report() {
    let app = TestApp::new().await;
    let (_, admin) = app.operator("root", Role::Admin).await;
    let (seller, seller_token) = app.operator("alice", Role::Seller).await;

    app.buy(Some(&seller_token), "one@example.com", 1, 0.5).await;
    app.buy(Some(&seller_token), "two@example.com", 1, 0.5).await;
    app.buy(None, "walkin@example.com", 1, 0.5).await;

    let (status, body) = app
        .send("GET", "/api/tickets/seller/stats", Some(&seller_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"]["tickets"], 2);
    assert_eq!(body["total"]["amount"], 1.0);
    assert_eq!(body["today"]["tickets"], 2);

    let (status, body) = app
        .send("GET", "/api/tickets/seller-report", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let sellers = body["sellers"].as_array().unwrap();
    assert_eq!(sellers.len(), 2);
    assert_eq!(sellers[0]["sellerId"], seller.id.as_str());
    assert_eq!(sellers[0]["sellerName"], "alice");
    assert_eq!(sellers[0]["purchaseCount"], 2);
    assert_eq!(sellers[1]["sellerId"], Value::Null);
    assert_eq!(sellers[1]["sellerName"], "unassigned");
    assert_eq!(body["totals"]["totalQuantity"], 3);
    assert_eq!(body["totals"]["totalRevenue"], 1.5);

    let (status, body) = app
        .send(
            "GET",
            "/api/tickets/seller-report?startDate=2024-02-02&endDate=2024-02-01",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_user_management_guards() {
    let app = TestApp::new().await;
    let (root, admin) = app.operator("root", Role::Admin).await;
    app.operator("alice", Role::Seller).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({"username": "alice", "password": "another-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{}", root.id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/users/{}", root.id),
            Some(&admin),
            Some(json!({"role": "seller"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send("GET", "/api/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}
