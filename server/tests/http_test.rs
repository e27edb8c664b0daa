//! HTTP-Level Pipeline Tests
//!
//! Sends requests through the full router: rate limit guard, session
//! resolution, role guards and the error envelope.

mod helpers;

use axum::http::StatusCode;
use helpers::{body_to_json, header_str, TestApp, TestRequest};
use serde_json::json;
use wiki_server::db::{FeedbackStore, Role, UserStore};
use wiki_server::ratelimit::{LimitConfig, RateLimitConfig, RateLimits, TierLimits};

#[tokio::test]
async fn test_health_reports_backend() {
    let app = TestApp::new();
    let resp = app.request(TestRequest::get("/health").build()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rateLimitBackend"], "memory");
}

#[tokio::test]
async fn test_allowed_response_carries_rate_limit_headers() {
    let app = TestApp::new();
    let (user, token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(TestRequest::get("/api/users/me").bearer(&token).build())
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("30"));
    assert_eq!(header_str(&resp, "x-ratelimit-remaining"), Some("29"));
    assert_eq!(
        header_str(&resp, "x-ratelimit-reset"),
        Some("2023-11-14T22:15:00.000Z")
    );
    assert!(header_str(&resp, "retry-after").is_none());

    let body = body_to_json(resp).await;
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["username"], "scout");
}

#[tokio::test]
async fn test_exceeding_limit_returns_429() {
    let app = TestApp::new();
    let (_, token) = app.create_user("scout", &[Role::User]).await;

    for name in ["scout_a", "scout_b", "scout_c"] {
        let resp = app
            .request(
                TestRequest::patch("/api/users/me")
                    .bearer(&token)
                    .json(&json!({ "username": name }))
                    .build(),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "rename to {name} should pass");
    }

    let resp = app
        .request(
            TestRequest::patch("/api/users/me")
                .bearer(&token)
                .json(&json!({ "username": "scout_d" }))
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("3"));
    assert_eq!(header_str(&resp, "x-ratelimit-remaining"), Some("0"));
    // Daily windows align to UTC midnight
    assert_eq!(header_str(&resp, "retry-after"), Some("6360"));

    let body = body_to_json(resp).await;
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["retryAfter"], 6360);

    // The denied rename never reached the handler
    let resp = app
        .request(TestRequest::get("/api/users/me").bearer(&token).build())
        .await;
    assert_eq!(body_to_json(resp).await["username"], "scout_c");
}

#[tokio::test]
async fn test_unsupported_method_does_not_spend_budget() {
    let app = TestApp::new();
    let (_, token) = app.create_user("scout", &[Role::User]).await;

    for _ in 0..3 {
        let resp = app
            .request(TestRequest::put("/api/users/me").bearer(&token).build())
            .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(header_str(&resp, "x-ratelimit-remaining").is_none());
    }
    let resp = app
        .request(TestRequest::delete("/api/feedback").bearer(&token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = app
        .request(
            TestRequest::patch("/api/users/me")
                .bearer(&token)
                .json(&json!({ "username": "scout_a" }))
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "x-ratelimit-remaining"), Some("2"));
}

#[tokio::test]
async fn test_denied_request_does_not_invoke_handler() {
    let mut limits = RateLimits::default();
    limits.feedback_post = TierLimits::split(
        LimitConfig::new(5, 3600).unwrap(),
        LimitConfig::new(1, 3600).unwrap(),
    );
    let app = TestApp::with_rate_limits(RateLimitConfig {
        limits,
        ..RateLimitConfig::default()
    });

    let submit = || {
        TestRequest::post("/api/feedback")
            .header("x-forwarded-for", "203.0.113.7")
            .json(&json!({ "category": "bug", "message": "Search returns nothing" }))
            .build()
    };

    assert_eq!(app.request(submit()).await.status(), StatusCode::CREATED);
    assert_eq!(
        app.request(submit()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.db.list_feedback(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_callers_get_stricter_tier() {
    let app = TestApp::new();

    let resp = app
        .request(
            TestRequest::post("/api/feedback")
                .header("x-forwarded-for", "203.0.113.8, 10.0.0.1")
                .json(&json!({ "category": "content", "message": "Outpost map is outdated" }))
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("10"));
    assert!(body_to_json(resp).await["userId"].is_null());

    let (user, token) = app.create_user("scout", &[Role::User]).await;
    let resp = app
        .request(
            TestRequest::post("/api/feedback")
                .bearer(&token)
                .json(&json!({ "category": "feature", "message": "Please add a loot tracker" }))
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("30"));
    assert_eq!(body_to_json(resp).await["userId"], user.id.to_string());
}

#[tokio::test]
async fn test_unauthenticated_error_uses_envelope_and_keeps_headers() {
    let app = TestApp::new();

    let resp = app.request(TestRequest::get("/api/users/me").build()).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_str(&resp, "x-ratelimit-remaining"), Some("29"));

    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
    assert_eq!(body["error"]["statusCode"], 401);
    assert_eq!(body["error"]["message"], "Authentication required");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn test_failed_requests_still_count() {
    let app = TestApp::new();

    let first = app.request(TestRequest::get("/api/users/me").build()).await;
    let second = app.request(TestRequest::get("/api/users/me").build()).await;

    assert_eq!(header_str(&first, "x-ratelimit-remaining"), Some("29"));
    assert_eq!(header_str(&second, "x-ratelimit-remaining"), Some("28"));
}

#[tokio::test]
async fn test_production_hides_request_id() {
    let app = TestApp::production();

    let resp = app.request(TestRequest::get("/api/users/me").build()).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_to_json(resp).await;
    assert!(body.get("requestId").is_none());
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new();
    let (target, token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(
            TestRequest::get(&format!("/api/admin/users/{}", target.id))
                .bearer(&token)
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("50"));
    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
    assert_eq!(body["error"]["message"], "Admin access required");
}

#[tokio::test]
async fn test_feedback_review_requires_admin_or_moderator() {
    let app = TestApp::new();
    let (_, user_token) = app.create_user("scout", &[Role::User]).await;
    let (_, mod_token) = app.create_user("warden", &[Role::Moderator]).await;

    let resp = app
        .request(TestRequest::get("/api/feedback").bearer(&user_token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_to_json(resp).await["error"]["message"],
        "Admin or Moderator access required"
    );

    let resp = app
        .request(TestRequest::get("/api/feedback?limit=5").bearer(&mod_token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("60"));
}

#[tokio::test]
async fn test_invalid_id_is_not_echoed() {
    let app = TestApp::new();
    let (_, token) = app.create_user("overseer", &[Role::Admin]).await;

    let resp = app
        .request(
            TestRequest::get("/api/admin/users/not-a-real-id")
                .bearer(&token)
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_ID");
    assert!(!body.to_string().contains("not-a-real-id"));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.create_user("overseer", &[Role::Admin]).await;

    let resp = app
        .request(
            TestRequest::get(&format!("/api/admin/users/{}", uuid::Uuid::new_v4()))
                .bearer(&token)
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_to_json(resp).await["error"]["message"], "User not found");
}

#[tokio::test]
async fn test_ban_takes_effect_on_next_request() {
    let app = TestApp::new();
    let (_, admin_token) = app.create_user("overseer", &[Role::Admin]).await;
    let (target, target_token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(
            TestRequest::post(&format!("/api/admin/users/{}/ban", target.id))
                .bearer(&admin_token)
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["isBanned"], true);

    let resp = app
        .request(TestRequest::get("/api/users/me").bearer(&target_token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"]["code"], "USER_BANNED");

    let resp = app
        .request(
            TestRequest::delete(&format!("/api/admin/users/{}/ban", target.id))
                .bearer(&admin_token)
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .request(TestRequest::get("/api/users/me").bearer(&target_token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_cannot_ban_self() {
    let app = TestApp::new();
    let (admin, token) = app.create_user("overseer", &[Role::Admin]).await;

    let resp = app
        .request(
            TestRequest::post(&format!("/api/admin/users/{}/ban", admin.id))
                .bearer(&token)
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"]["code"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_role_change_applies_immediately() {
    let app = TestApp::new();
    let (_, admin_token) = app.create_user("overseer", &[Role::Admin]).await;
    let (target, target_token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(
            TestRequest::put(&format!("/api/admin/users/{}/roles", target.id))
                .bearer(&admin_token)
                .json(&json!({ "roles": ["user", "moderator", "user"] }))
                .build(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["roles"], json!(["moderator", "user"]));

    let resp = app
        .request(TestRequest::get("/api/feedback").bearer(&target_token).build())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_username_conflict() {
    let app = TestApp::new();
    app.create_user("medic", &[Role::User]).await;
    let (_, token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(
            TestRequest::patch("/api/users/me")
                .bearer(&token)
                .json(&json!({ "username": "medic" }))
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "DUPLICATE_KEY");
    assert_eq!(
        body["error"]["message"],
        "A record with this username already exists"
    );
}

#[tokio::test]
async fn test_schema_validation_reports_fields() {
    let app = TestApp::new();
    let (_, token) = app.create_user("scout", &[Role::User]).await;

    let resp = app
        .request(
            TestRequest::patch("/api/users/me")
                .bearer(&token)
                .json(&json!({ "username": "X" }))
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]
        .as_str()
        .unwrap()
        .starts_with("username: "));
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let app = TestApp::new();

    let resp = app
        .request(
            TestRequest::post("/api/feedback")
                .header("x-forwarded-for", "203.0.113.9")
                .raw_json("{not json")
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header_str(&resp, "x-ratelimit-limit"), Some("10"));
    let body = body_to_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid request body");
}

#[tokio::test]
async fn test_banned_user_cannot_post_feedback() {
    let app = TestApp::new();
    let (user, token) = app.create_user("scout", &[Role::User]).await;
    app.db.set_banned(user.id, true).await.unwrap();

    let resp = app
        .request(
            TestRequest::post("/api/feedback")
                .bearer(&token)
                .json(&json!({ "category": "other", "message": "Let me back in please" }))
                .build(),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
