//! Carrier callback tests
//!
//! 状态回调和入站短信，包括共享密钥校验。

use std::sync::Arc;
use std::time::Duration;

use actix_web::App;
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use chrono::Utc;
use serde_json::Value;

use smsrelay::api::services::AppStartTime;
use smsrelay::api::services::relay::{ApiGovernorConfig, api_governor_config};
use smsrelay::api::{RequestIdMiddleware, configure_app};
use smsrelay::config::StaticConfig;
use smsrelay::services::{
    ConsentRegistry, ConsentSource, ConsentStatus, DeliveryStatus, DeliveryTracker,
    DispatchOptions, DispatchService, SandboxProvider, SendQuota, SmsRequest,
};

const CALLBACK_TOKEN: &str = "cb-secret";
const PHONE: &str = "+14155550123";

struct Fixture {
    config: StaticConfig,
    dispatch: Arc<DispatchService>,
    governor: ApiGovernorConfig,
}

fn fixture(callback_token: &str) -> Fixture {
    let mut config = StaticConfig::default();
    config.callbacks.token = callback_token.into();

    let dispatch = Arc::new(DispatchService::new(
        Arc::new(SandboxProvider::new()),
        Arc::new(ConsentRegistry::new(config.consent.policy)),
        Arc::new(SendQuota::new(0, 0)),
        Arc::new(DeliveryTracker::new(1_000, Duration::from_secs(3600))),
        DispatchOptions::from_config(&config),
    ));
    let governor = api_governor_config(&config.api).expect("valid rate limit");

    Fixture {
        config,
        dispatch,
        governor,
    }
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

/// 授权后发送一条短信，返回 SID
async fn submit_sms(dispatch: &DispatchService) -> String {
    dispatch
        .update_consent(PHONE, ConsentStatus::OptedIn)
        .expect("valid phone");
    dispatch
        .send_sms(SmsRequest {
            to: PHONE.into(),
            body: "hello".into(),
            from: None,
        })
        .await
        .expect("sandbox send")
        .receipt
        .sid
}

fn status_form(sid: &str, status: &str) -> TestRequest {
    TestRequest::post()
        .uri("/callbacks/status")
        .insert_header(("X-Callback-Token", CALLBACK_TOKEN))
        .set_form([("MessageSid", sid), ("MessageStatus", status), ("To", PHONE)])
}

// =============================================================================
// Token checks
// =============================================================================

#[actix_rt::test]
async fn test_callback_requires_token() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);

    let req = TestRequest::post()
        .uri("/callbacks/status")
        .set_form([("MessageSid", "SM1"), ("MessageStatus", "sent")])
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = TestRequest::post()
        .uri("/callbacks/status")
        .insert_header(("X-Callback-Token", "wrong"))
        .set_form([("MessageSid", "SM1"), ("MessageStatus", "sent")])
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[actix_rt::test]
async fn test_callback_token_in_query() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);

    let req = TestRequest::post()
        .uri(&format!("/callbacks/status?token={}", CALLBACK_TOKEN))
        .set_form([("MessageSid", "SM1"), ("MessageStatus", "sent")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["outcome"], "created");
}

#[actix_rt::test]
async fn test_callback_open_without_configured_token() {
    let fx = fixture("");
    let app = init_app!(fx);

    let req = TestRequest::post()
        .uri("/callbacks/status")
        .set_form([("CallSid", "CA1"), ("CallStatus", "ringing")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

// =============================================================================
// Status callbacks
// =============================================================================

#[actix_rt::test]
async fn test_status_callback_updates_record() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);
    let sid = submit_sms(&fx.dispatch).await;

    let resp = test::call_service(&app, status_form(&sid, "sent").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "sent");
    assert_eq!(body["data"]["outcome"], "updated");

    let resp = test::call_service(&app, status_form(&sid, "delivered").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // 迟到的 sent 不会覆盖 delivered
    let resp = test::call_service(&app, status_form(&sid, "sent").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["outcome"], "ignored");
    assert_eq!(body["data"]["status"], "delivered");

    let record = fx.dispatch.message_status(&sid).unwrap();
    assert_eq!(record.status, DeliveryStatus::Delivered);
}

#[actix_rt::test]
async fn test_status_callback_rejects_bad_input() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);

    let resp = test::call_service(&app, status_form("SM1", "teleported").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/callbacks/status")
        .insert_header(("X-Callback-Token", CALLBACK_TOKEN))
        .set_form([("MessageStatus", "sent")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1000);
}

#[actix_rt::test]
async fn test_unsubscribed_failure_opts_out() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);
    let sid = submit_sms(&fx.dispatch).await;

    let req = TestRequest::post()
        .uri("/callbacks/status")
        .insert_header(("X-Callback-Token", CALLBACK_TOKEN))
        .set_form([
            ("MessageSid", sid.as_str()),
            ("MessageStatus", "failed"),
            ("ErrorCode", "21610"),
            ("To", PHONE),
        ])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let view = fx.dispatch.check_consent(PHONE).unwrap();
    assert!(!view.decision.allowed);
    let record = view.record.unwrap();
    assert_eq!(record.status, ConsentStatus::OptedOut);
    assert_eq!(record.source, ConsentSource::Provider);
}

// =============================================================================
// Inbound messages
// =============================================================================

fn inbound(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/callbacks/inbound")
        .insert_header(("X-Callback-Token", CALLBACK_TOKEN))
        .set_form([("From", PHONE), ("Body", body), ("MessageSid", "SMin")])
}

#[actix_rt::test]
async fn test_inbound_stop_and_start() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);

    let resp = test::call_service(&app, inbound(" stop ").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get("Content-Type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/xml")
    );
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.starts_with("<Response><Message>"));
    assert!(body.contains("unsubscribed"));

    let record = fx.dispatch.check_consent(PHONE).unwrap().record.unwrap();
    assert_eq!(record.status, ConsentStatus::OptedOut);
    assert_eq!(record.source, ConsentSource::Keyword);

    let resp = test::call_service(&app, inbound("START").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(fx.dispatch.check_consent(PHONE).unwrap().decision.allowed);
}

#[actix_rt::test]
async fn test_inbound_without_keyword_sends_empty_response() {
    let fx = fixture(CALLBACK_TOKEN);
    let app = init_app!(fx);

    let resp = test::call_service(&app, inbound("what time is it?").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"<Response/>");
    assert!(fx.dispatch.check_consent(PHONE).unwrap().record.is_none());
}
