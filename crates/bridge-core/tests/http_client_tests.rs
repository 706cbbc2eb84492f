//! Platform and SMS clients against a mock HTTP server

use std::time::Duration;

use serde_json::json;
use vmbridge_core::config::{PlatformConfig, SmsConfig};
use vmbridge_core::{
    AccountId, BridgeError, ConversationPoster, HttpConversationPoster, Notifier, StreamFields, TwilioSmsNotifier,
};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn platform_config(server: &MockServer) -> PlatformConfig {
    PlatformConfig {
        api_url: format!("{}/v17/", server.uri()),
        access_token: "test-token".to_string(),
        request_timeout_secs: 5,
    }
}

fn fields(pairs: &[(&'static str, &str)]) -> StreamFields {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

#[tokio::test]
async fn test_create_stream_sends_form_and_parses_participants() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v17/streams"))
        .and(matchers::query_param("on_behalf_of", "20"))
        .and(matchers::header("authorization", "Bearer test-token"))
        .and(matchers::header("content-type", "application/x-www-form-urlencoded"))
        .and(matchers::body_string_contains("participant=%2B15551230000"))
        .and(matchers::body_string_contains("reason=voicemail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 55,
            "others": [{"id": 31, "display_name": "+1 555-123-0000"}],
            "title": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let poster = HttpConversationPoster::new(&platform_config(&server)).unwrap();
    let stream = poster
        .post_to_conversation(
            AccountId(20),
            0,
            fields(&[("participant", "+15551230000"), ("reason", "voicemail")]),
        )
        .await
        .unwrap();

    assert_eq!(stream.id, 55);
    assert_eq!(stream.others.len(), 1);
    assert_eq!(stream.others[0].id, AccountId(31));
}

#[tokio::test]
async fn test_append_posts_to_chunks_path() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v17/streams/55/chunks"))
        .and(matchers::query_param("on_behalf_of", "31"))
        .and(matchers::body_string_contains("audio_url="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 55})))
        .expect(1)
        .mount(&server)
        .await;

    let poster = HttpConversationPoster::new(&platform_config(&server)).unwrap();
    let stream = poster
        .post_to_conversation(AccountId(31), 55, fields(&[("audio_url", "https://example.com/rec.mp3")]))
        .await
        .unwrap();

    assert_eq!(stream.id, 55);
    assert!(stream.others.is_empty());
}

#[tokio::test]
async fn test_non_200_is_remote_rejected_with_context() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v17/streams"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let poster = HttpConversationPoster::new(&platform_config(&server)).unwrap();
    let err = poster
        .post_to_conversation(AccountId(10), 0, fields(&[("participant", "20")]))
        .await
        .unwrap_err();

    match err {
        BridgeError::RemoteRejected {
            path,
            account_id,
            status,
        } => {
            assert_eq!(path, "/v17/streams");
            assert_eq!(account_id, AccountId(10));
            assert_eq!(status, 403);
        }
        other => panic!("Expected RemoteRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_created_status_is_not_success_for_streams() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    let poster = HttpConversationPoster::new(&platform_config(&server)).unwrap();
    let err = poster
        .post_to_conversation(AccountId(10), 0, StreamFields::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::RemoteRejected { status: 201, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let poster = HttpConversationPoster::new(&platform_config(&server)).unwrap();
    let err = poster
        .post_to_conversation(AccountId(10), 0, StreamFields::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_platform_is_transport_error() {
    let config = PlatformConfig {
        api_url: "http://127.0.0.1:1/v17/".to_string(),
        access_token: "t".to_string(),
        request_timeout_secs: 2,
    };
    let poster = HttpConversationPoster::new(&config).unwrap();

    let err = poster
        .post_to_conversation(AccountId(10), 0, StreamFields::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Transport(_)));
}

fn sms_config(server: &MockServer) -> SmsConfig {
    SmsConfig {
        messages_url: format!("{}/2010-04-01/Accounts/AC1/Messages", server.uri()),
        from_number: "+14427776437".to_string(),
        key_sid: "SK1".to_string(),
        key_secret: "shh".to_string(),
        advisory_message: "verify your number".to_string(),
        notify_on_queue: true,
    }
}

#[tokio::test]
async fn test_sms_sent_with_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/2010-04-01/Accounts/AC1/Messages"))
        // base64("SK1:shh")
        .and(matchers::header("authorization", "Basic U0sxOnNoaA=="))
        .and(matchers::body_string_contains("From=%2B14427776437"))
        .and(matchers::body_string_contains("To=%2B15559998888"))
        .and(matchers::body_string_contains("Body=verify+your+number"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TwilioSmsNotifier::new(&sms_config(&server), Duration::from_secs(5)).unwrap();
    notifier.send_sms("+15559998888", "verify your number").await.unwrap();
}

#[tokio::test]
async fn test_sms_non_created_status_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TwilioSmsNotifier::new(&sms_config(&server), Duration::from_secs(5)).unwrap();
    let err = notifier.send_sms("+15559998888", "hi").await.unwrap_err();

    assert!(matches!(err, BridgeError::NotificationRejected { status: 400, .. }));
}
