//! HTTP API tests.
//!
//! Drives the axum router in-process with `oneshot`: signup and login,
//! session checks, capability checks and the error body shape.
//!
//! Run with: `cargo test -p utshob --test http_api`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Duration;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use utshob::auth::SessionSealer;
use utshob::server::{AppState, build_router, cors_layer};
use utshob::{InMemoryMarketplaceStore, Marketplace};
use utshob_testing::test_clock;

const SESSION_KEY: [u8; 32] = [7; 32];

struct TestApp {
    router: Router,
    marketplace: Arc<Marketplace>,
    sealer: SessionSealer,
}

impl TestApp {
    async fn new() -> Self {
        let marketplace = Arc::new(Marketplace::new(
            Arc::new(InMemoryMarketplaceStore::new()),
            Arc::new(test_clock()),
        ));
        marketplace
            .ensure_admin("Administrator", "admin@example.com", "changeme")
            .await
            .expect("admin bootstrap");
        let sealer = SessionSealer::new(&SESSION_KEY, Duration::days(7)).expect("valid key");
        let state = AppState::new(Arc::clone(&marketplace), sealer.clone(), "memory");

        Self {
            router: build_router(state, cors_layer("*")),
            marketplace,
            sealer,
        }
    }

    async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn signup(&self, email: &str, role: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users/signup",
                None,
                Some(json!({
                    "name": "Test User",
                    "email": email,
                    "password": "secret1",
                    "number": "01712345678",
                    "address": "Dhaka",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        body["user"].clone()
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.request(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["component"], "memory");
}

#[tokio::test]
async fn test_signup_login_and_me() {
    let app = TestApp::new().await;
    let user = app.signup("rumana@example.com", "customer").await;
    assert_eq!(user["phone"], "01712345678");
    assert!(user.get("passwordHash").is_none());

    let token = app.login("RUMANA@example.com", "secret1").await;
    let (status, me) = app.request(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);
    assert_eq!(me["role"], "customer");
}

#[tokio::test]
async fn test_error_body_shape() {
    let app = TestApp::new().await;
    app.signup("rumana@example.com", "customer").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "rumana@example.com", "password": "nope-nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "code": "BAD_REQUEST", "message": "Invalid credentials" }));

    let (status, body) = app
        .request(Method::GET, &format!("/api/services/{}", uuid::Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_signup_is_refused() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/users/signup",
            None,
            Some(json!({
                "name": "Root",
                "email": "root@example.com",
                "password": "secret1",
                "phone": "017",
                "address": "Dhaka",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_missing_tampered_and_expired_tokens() {
    let app = TestApp::new().await;
    app.signup("rumana@example.com", "customer").await;

    let (status, body) = app.request(Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let token = app.login("rumana@example.com", "secret1").await;
    let mut tampered = token.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();
    let (status, body) = app.request(Method::GET, "/api/users/me", Some(&tampered), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid session token");

    let account = app.marketplace.authenticate("rumana@example.com", "secret1").await.unwrap();
    let (expired, _) = app
        .sealer
        .issue(&account, app.marketplace.now() - Duration::days(8))
        .unwrap();
    let (status, body) = app.request(Method::GET, "/api/users/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session expired");
}

#[tokio::test]
async fn test_deleted_account_loses_its_session() {
    let app = TestApp::new().await;
    let user = app.signup("rumana@example.com", "customer").await;
    let token = app.login("rumana@example.com", "secret1").await;
    let admin = app.login("admin@example.com", "changeme").await;

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/users/{}", user["id"].as_str().unwrap()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully");

    let (status, body) = app.request(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account no longer exists");
}

#[tokio::test]
async fn test_capabilities_are_enforced() {
    let app = TestApp::new().await;
    app.signup("rumana@example.com", "customer").await;
    app.signup("studio@example.com", "vendor").await;
    let customer = app.login("rumana@example.com", "secret1").await;
    let vendor = app.login("studio@example.com", "secret1").await;

    let listing = json!({
        "organizationName": "Shutter Stories",
        "category": "Photography",
        "price": 5000,
        "description": "Full-day coverage",
    });

    let (status, _) = app
        .request(Method::POST, "/api/services", Some(&customer), Some(listing.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request(Method::GET, "/api/users", Some(&vendor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, service) = app
        .request(Method::POST, "/api/services", Some(&vendor), Some(listing))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(service["availability"], "Yes");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/bookings",
            Some(&vendor),
            Some(json!({ "serviceId": service["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_book_and_pay_over_http() {
    let app = TestApp::new().await;
    let customer_user = app.signup("rumana@example.com", "customer").await;
    app.signup("studio@example.com", "vendor").await;
    app.signup("other@example.com", "customer").await;
    let customer = app.login("rumana@example.com", "secret1").await;
    let vendor = app.login("studio@example.com", "secret1").await;
    let other = app.login("other@example.com", "secret1").await;
    let customer_id = customer_user["id"].as_str().unwrap().to_string();

    let (_, service) = app
        .request(
            Method::POST,
            "/api/services",
            Some(&vendor),
            Some(json!({
                "organizationName": "Shutter Stories",
                "category": "Photography",
                "price": 5000,
                "description": "Full-day coverage",
            })),
        )
        .await;

    let (status, created) = app
        .request(
            Method::POST,
            "/api/bookings",
            Some(&customer),
            Some(json!({ "serviceId": service["id"], "specialRequirements": "Outdoor" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Booking created successfully");
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/bookings",
            Some(&other),
            Some(json!({ "serviceId": service["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");
    assert_eq!(body["message"], "Service is not available for booking");

    let (status, _) = app
        .request(Method::GET, &format!("/api/bookings/{booking_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::GET, &format!("/api/payments/pending/{customer_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pending) = app
        .request(Method::GET, &format!("/api/payments/pending/{customer_id}"), Some(&customer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["totalDue"], 5000);
    assert_eq!(pending["count"], 1);

    let (status, receipt) = app
        .request(
            Method::POST,
            "/api/payments/process",
            Some(&customer),
            Some(json!({
                "paymentMethod": "bank",
                "paymentProvider": "City Bank",
                "cardNumber": "4111111111111111",
                "amount": 5000,
                "requiredAmount": 5000,
                "services": pending["services"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["success"], true);
    assert_eq!(receipt["paymentStatus"], "successful");

    let (_, booking) = app
        .request(Method::GET, &format!("/api/bookings/{booking_id}"), Some(&vendor), None)
        .await;
    assert_eq!(booking["paymentStatus"], "paid");
    assert_eq!(booking["status"], "confirmed");

    let (_, history) = app
        .request(Method::GET, &format!("/api/payments/history/{customer_id}"), Some(&customer), None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["cardNumber"], "************1111");

    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/bookings/{booking_id}/status"),
            Some(&vendor),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["booking"]["status"], "completed");
}

#[tokio::test]
async fn test_feedback_over_http() {
    let app = TestApp::new().await;
    app.signup("rumana@example.com", "customer").await;
    let vendor_user = app.signup("studio@example.com", "vendor").await;
    let customer = app.login("rumana@example.com", "secret1").await;
    let vendor = app.login("studio@example.com", "secret1").await;
    let vendor_id = vendor_user["id"].as_str().unwrap().to_string();

    let (_, service) = app
        .request(
            Method::POST,
            "/api/services",
            Some(&vendor),
            Some(json!({
                "organizationName": "Dhol Beats",
                "category": "Music",
                "price": 2000,
                "description": "Live drummers",
            })),
        )
        .await;

    let rate = |stars: i32| json!({ "serviceId": service["id"], "vendorId": vendor_id, "rating": stars });
    let (_, first) = app
        .request(Method::POST, "/api/ratings/submit", Some(&customer), Some(rate(3)))
        .await;
    assert_eq!(first["message"], "Rating submitted successfully");
    let (_, second) = app
        .request(Method::POST, "/api/ratings/submit", Some(&customer), Some(rate(5)))
        .await;
    assert_eq!(second["message"], "Rating updated successfully");
    assert_eq!(second["rating"]["id"], first["rating"]["id"]);

    let (status, summary) = app
        .request(Method::GET, &format!("/api/ratings/vendor/{vendor_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["averageRating"], 5.0);
    assert_eq!(summary["totalRatings"], 1);

    let review = json!({ "serviceId": service["id"], "vendorId": vendor_id, "comment": "Loud and lovely" });
    let (status, _) = app
        .request(Method::POST, "/api/reviews/submit", Some(&customer), Some(review.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .request(Method::POST, "/api/reviews/submit", Some(&customer), Some(review))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already reviewed this service");

    let (_, reviews) = app
        .request(Method::GET, &format!("/api/reviews/vendor/{vendor_id}"), None, None)
        .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
}
