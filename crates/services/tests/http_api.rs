use std::time::Duration;

use quiz_core::model::{SessionId, SessionKind};
use serde_json::json;
use services::{
    ApiConfig, ApiError, HttpQuizApi, ScoringService, SessionStarter, StartRequest, SubmitRequest,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> HttpQuizApi {
    HttpQuizApi::new(ApiConfig::new(&server.uri()).unwrap()).unwrap()
}

fn empty_submit() -> SubmitRequest {
    SubmitRequest {
        answers: Vec::new(),
        time_spent: 5,
    }
}

#[tokio::test]
async fn start_sends_filters_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "kind": "comprehensive_test",
            "subjectId": "math",
            "questionCount": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "abc",
            "timeLimitSeconds": 600,
            "questions": [
                {"id": "q1", "prompt": "Pick one", "options": ["a", "b"]},
                {"id": "q2", "prompt": "Pick two", "options": ["c", "d"], "explanation": "d"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ApiConfig::new(&format!("{}/api/", server.uri()))
        .unwrap()
        .with_token("secret");
    let api = HttpQuizApi::new(config).unwrap();

    let mut request = StartRequest::new(SessionKind::ComprehensiveTest);
    request.subject_id = Some("math".into());
    request.question_count = Some(2);

    let started = api.start(&request).await.unwrap();
    assert_eq!(started.session_id.as_str(), "abc");
    assert_eq!(started.time_limit_seconds, Some(600));
    assert_eq!(started.questions.len(), 2);
    assert_eq!(started.questions[1].explanation(), Some("d"));
}

#[tokio::test]
async fn status_error_prefers_json_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/s1/submit"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "already scored"})))
        .mount(&server)
        .await;

    let err = api(&server)
        .submit(&SessionId::from("s1"), &empty_submit())
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, ref message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "already scored");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "already scored");
}

#[tokio::test]
async fn status_error_falls_back_to_body_text_then_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/text/submit"))
        .respond_with(ResponseTemplate::new(502).set_body_string("  upstream down \n"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/bare/submit"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = api(&server);
    let text = api
        .submit(&SessionId::from("text"), &empty_submit())
        .await
        .unwrap_err();
    assert!(matches!(
        text,
        ApiError::Status { status: 502, ref message } if message == "upstream down"
    ));

    let bare = api
        .submit(&SessionId::from("bare"), &empty_submit())
        .await
        .unwrap_err();
    assert!(matches!(
        bare,
        ApiError::Status { status: 500, ref message } if message == "Internal Server Error"
    ));
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "abc",
            "questions": [{"id": "q1", "prompt": "No options", "options": []}]
        })))
        .mount(&server)
        .await;

    let err = api(&server)
        .start(&StartRequest::new(SessionKind::Quiz))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/slow/submit"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"score": 1, "total": 1, "timeSpent": 5}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ApiConfig::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(100));
    let err = HttpQuizApi::new(config)
        .unwrap()
        .submit(&SessionId::from("slow"), &empty_submit())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "the request timed out");
}
