//! HTTP API tests
//!
//! 使用 sandbox provider 搭建完整的 App，覆盖鉴权、授权、配额和校验。

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::App;
use chrono::Utc;
use serde_json::{Value, json};

use smsrelay::api::services::AppStartTime;
use smsrelay::api::services::relay::{ApiGovernorConfig, api_governor_config};
use smsrelay::api::{RequestIdMiddleware, configure_app};
use smsrelay::config::{ConsentPolicy, StaticConfig};
use smsrelay::services::{
    ConsentRegistry, DeliveryTracker, DispatchOptions, DispatchService, SandboxProvider,
    SendQuota,
};

const API_TOKEN: &str = "test-api-token";
const RECIPIENT: &str = "4155550123";
const RECIPIENT_E164: &str = "+14155550123";

// =============================================================================
// Test Setup
// =============================================================================

struct Fixture {
    config: StaticConfig,
    dispatch: Arc<DispatchService>,
    sandbox: Arc<SandboxProvider>,
    governor: ApiGovernorConfig,
}

fn fixture_with(mut config: StaticConfig) -> Fixture {
    config.phone.default_country_code = Some("1".into());

    let sandbox = Arc::new(SandboxProvider::new());
    let dispatch = Arc::new(DispatchService::new(
        sandbox.clone(),
        Arc::new(ConsentRegistry::new(config.consent.policy)),
        Arc::new(SendQuota::new(
            config.quota.per_minute,
            config.quota.per_recipient_per_minute,
        )),
        Arc::new(DeliveryTracker::new(1_000, Duration::from_secs(3600))),
        DispatchOptions::from_config(&config),
    ));
    let governor = api_governor_config(&config.api).expect("valid rate limit");

    Fixture {
        config,
        dispatch,
        sandbox,
        governor,
    }
}

fn fixture(per_minute: u32) -> Fixture {
    let mut config = StaticConfig::default();
    config.api.token = API_TOKEN.into();
    config.quota.per_minute = per_minute;
    fixture_with(config)
}

macro_rules! init_app {
    ($fx:expr) => {
        test::init_service(App::new().wrap(RequestIdMiddleware).configure(|cfg| {
            configure_app(
                cfg,
                &$fx.config,
                $fx.dispatch.clone(),
                AppStartTime {
                    start_datetime: Utc::now(),
                },
                &$fx.governor,
            )
        }))
        .await
    };
}

fn authed(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", API_TOKEN)))
}

fn sms_request(body: &str) -> TestRequest {
    authed(TestRequest::post().uri("/api/v1/messages/sms"))
        .set_json(json!({ "to": RECIPIENT, "body": body }))
}

fn opt_in_request() -> TestRequest {
    authed(TestRequest::put().uri(&format!("/api/v1/consent/{}", RECIPIENT)))
        .set_json(json!({ "status": "opted_in" }))
}

// =============================================================================
// Authentication
// =============================================================================

#[actix_rt::test]
async fn test_api_disabled_without_token() {
    let fx = fixture_with(StaticConfig::default());
    let app = init_app!(fx);

    let req = TestRequest::get().uri("/api/v1/quota").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_missing_or_wrong_token_is_unauthorized() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = TestRequest::get().uri("/api/v1/quota").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("WWW-Authenticate").unwrap(),
        "Bearer"
    );

    let req = TestRequest::get()
        .uri("/api/v1/quota")
        .insert_header(("Authorization", "Bearer nope"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1001);
}

// =============================================================================
// Sending
// =============================================================================

#[actix_rt::test]
async fn test_sms_without_consent_is_forbidden() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let resp = test::call_service(&app, sms_request("hello").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 3000);
    assert!(body.get("data").is_none());

    assert!(fx.sandbox.sent().is_empty());
}

#[actix_rt::test]
async fn test_sms_after_opt_in() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let resp = test::call_service(&app, opt_in_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["phone"], RECIPIENT_E164);
    assert_eq!(body["data"]["status"], "opted_in");
    assert_eq!(body["data"]["source"], "api");

    let resp = test::call_service(&app, sms_request("Your code is 1234").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 0);
    let data = &body["data"];
    assert!(data["sid"].as_str().unwrap().starts_with("SM"));
    assert_eq!(data["status"], "queued");
    assert_eq!(data["channel"], "sms");
    assert_eq!(data["to"], RECIPIENT_E164);
    assert_eq!(data["segments"], 1);
    assert_eq!(data["quota_remaining"], 59);

    let sent = fx.sandbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, RECIPIENT_E164);
    assert_eq!(sent[0].body.as_deref(), Some("Your code is 1234"));
}

#[actix_rt::test]
async fn test_allow_unless_opted_out_policy() {
    let mut config = StaticConfig::default();
    config.api.token = API_TOKEN.into();
    config.consent.policy = ConsentPolicy::AllowUnlessOptedOut;
    let fx = fixture_with(config);
    let app = init_app!(fx);

    let resp = test::call_service(&app, sms_request("hi").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = authed(TestRequest::put().uri(&format!("/api/v1/consent/{}", RECIPIENT)))
        .set_json(json!({ "status": "opted_out" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let resp = test::call_service(&app, sms_request("hi again").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(fx.sandbox.sent().len(), 1);
}

#[actix_rt::test]
async fn test_quota_exceeded_sets_retry_after() {
    let fx = fixture(1);
    let app = init_app!(fx);
    test::call_service(&app, opt_in_request().to_request()).await;

    let resp = test::call_service(&app, sms_request("first").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, sms_request("second").to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp
        .headers()
        .get("Retry-After")
        .expect("Retry-After header")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 3001);

    assert_eq!(fx.sandbox.sent().len(), 1);
}

#[actix_rt::test]
async fn test_invalid_phone_and_body() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = authed(TestRequest::post().uri("/api/v1/messages/sms"))
        .set_json(json!({ "to": "call-me", "body": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 2000);

    test::call_service(&app, opt_in_request().to_request()).await;
    let resp = test::call_service(&app, sms_request("   ").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1000);
}

#[actix_rt::test]
async fn test_malformed_json_uses_api_response_shape() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = authed(TestRequest::post().uri("/api/v1/messages/sms"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"to\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1000);
}

#[actix_rt::test]
async fn test_mms_and_call() {
    let fx = fixture(60);
    let app = init_app!(fx);
    test::call_service(&app, opt_in_request().to_request()).await;

    let req = authed(TestRequest::post().uri("/api/v1/messages/mms"))
        .set_json(json!({
            "to": RECIPIENT,
            "body": "look",
            "media_urls": ["https://cdn.example.com/cat.png"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["channel"], "mms");

    let req = authed(TestRequest::post().uri("/api/v1/messages/mms"))
        .set_json(json!({ "to": RECIPIENT, "media_urls": ["file:///etc/passwd"] }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = authed(TestRequest::post().uri("/api/v1/calls"))
        .set_json(json!({ "to": RECIPIENT, "message": "Your code is 1234" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["data"]["sid"].as_str().unwrap().starts_with("CA"));
    assert_eq!(body["data"]["channel"], "voice");

    let req = authed(TestRequest::post().uri("/api/v1/calls"))
        .set_json(json!({ "to": RECIPIENT }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    assert_eq!(fx.sandbox.sent().len(), 2);
}

// =============================================================================
// Lookups
// =============================================================================

#[actix_rt::test]
async fn test_message_status_lookup() {
    let fx = fixture(60);
    let app = init_app!(fx);
    test::call_service(&app, opt_in_request().to_request()).await;

    let resp = test::call_service(&app, sms_request("hello").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    let sid = body["data"]["sid"].as_str().unwrap().to_string();

    let req = authed(TestRequest::get().uri(&format!("/api/v1/messages/{}", sid))).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["sid"], sid.as_str());
    assert_eq!(body["data"]["status"], "queued");

    let req = authed(TestRequest::get().uri("/api/v1/messages/SMdoesnotexist")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1004);
}

#[actix_rt::test]
async fn test_validate_phone() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = authed(TestRequest::post().uri("/api/v1/phone/validate"))
        .set_json(json!({ "phone": "(415) 555-0123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["e164"], RECIPIENT_E164);

    let req = authed(TestRequest::post().uri("/api/v1/phone/validate"))
        .set_json(json!({ "phone": "not-a-number", "lookup": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["valid"], false);
    assert!(body["data"]["error"].is_string());
    assert!(body["data"]["lookup"].is_null());
}

#[actix_rt::test]
async fn test_consent_listing_and_lookup() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = authed(TestRequest::get().uri(&format!("/api/v1/consent/{}", RECIPIENT))).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["decision"]["allowed"], false);
    assert!(body["data"]["record"].is_null());

    test::call_service(&app, opt_in_request().to_request()).await;

    let req = authed(TestRequest::get().uri("/api/v1/consent")).to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = authed(TestRequest::put().uri(&format!("/api/v1/consent/{}", RECIPIENT)))
        .set_json(json!({ "status": "maybe" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_rt::test]
async fn test_consent_update_fails_when_snapshot_unwritable() {
    let dir = tempfile::TempDir::new().unwrap();
    let state = dir.path().join("state");

    let mut fx = fixture(60);
    fx.dispatch = Arc::new(DispatchService::new(
        fx.sandbox.clone(),
        Arc::new(
            ConsentRegistry::with_snapshot(ConsentPolicy::RequireOptIn, state.join("consent.json"))
                .unwrap(),
        ),
        Arc::new(SendQuota::new(60, 0)),
        Arc::new(DeliveryTracker::new(1_000, Duration::from_secs(3600))),
        DispatchOptions::from_config(&fx.config),
    ));
    std::fs::write(&state, "").unwrap();
    let app = init_app!(fx);

    let resp = test::call_service(&app, opt_in_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1005);
    assert!(fx.dispatch.check_consent(RECIPIENT_E164).unwrap().decision.allowed);
}

#[actix_rt::test]
async fn test_quota_snapshot() {
    let fx = fixture(10);
    let app = init_app!(fx);

    let req = authed(TestRequest::get().uri("/api/v1/quota")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["used"], 0);
}

// =============================================================================
// Rate limiting, request id, health
// =============================================================================

#[actix_rt::test]
async fn test_rate_limit_per_client() {
    let mut config = StaticConfig::default();
    config.api.token = API_TOKEN.into();
    config.api.requests_per_second = 1;
    config.api.burst = 2;
    let fx = fixture_with(config);
    let app = init_app!(fx);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let req = authed(TestRequest::get().uri("/api/v1/quota")).to_request();
        statuses.push(test::call_service(&app, req).await.status());
    }
    assert_eq!(statuses[0], StatusCode::OK);
    assert_eq!(statuses[2], StatusCode::TOO_MANY_REQUESTS);

    let req = authed(TestRequest::get().uri("/api/v1/quota")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("Retry-After"));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1029);
    assert!(body["message"].as_str().unwrap().starts_with("Too many requests"));
}

#[actix_rt::test]
async fn test_request_id_header() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;
    let generated = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let req = TestRequest::get()
        .uri("/health/live")
        .insert_header(("X-Request-ID", "upstream-42"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "upstream-42");

    let req = TestRequest::get()
        .uri("/health/live")
        .insert_header(("X-Request-ID", "bad id with spaces"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_ne!(
        resp.headers().get("x-request-id").unwrap(),
        "bad id with spaces"
    );
}

#[actix_rt::test]
async fn test_health_endpoints() {
    let fx = fixture(60);
    let app = init_app!(fx);

    let req = TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["checks"]["provider"], "sandbox");

    let req = TestRequest::get().uri("/health/ready").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/health/live").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
}
