use super::*;
use crate::server::config::ServerConfig;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let status = StatusService::new(&ServerConfig::for_tests()).unwrap();
    router(AppState { status })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn ping_pongs() {
    let (status, body) = send(app(), get("/api/v1/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "pong" }));
}

#[tokio::test]
async fn user_get_greets_valid_ids() {
    let (status, body) = send(app(), get("/api/v1/user/abc-123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Hello abc-123!" }));
}

#[tokio::test]
async fn user_get_rejects_ids_outside_the_pattern() {
    let (status, body) = send(app(), get("/api/v1/user/abc_123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Resource not found");
}

#[tokio::test]
async fn user_post_adds_valid_users() {
    let request = post_json(
        "/api/v1/user/",
        r#"{"id":"42","name":"Ada","email":"ada@example.com","address":"London"}"#,
    );
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "User 'Ada' (id: 42) was successfully added."
    );
}

#[tokio::test]
async fn user_post_reports_validation_failures() {
    let request = post_json("/api/v1/user/", r#"{"email":"nope"}"#);
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "id: non zero value required;name: non zero value required;email: does not validate as email"
    );
}

#[tokio::test]
async fn user_post_rejects_malformed_json() {
    let (status, body) = send(app(), post_json("/api/v1/user/", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn hello_runs_the_greeter() {
    let (status, body) = send(app(), post_json("/v1/hello", r#"{"name":"Ferris"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello, Ferris!");

    let (status, _) = send(app(), post_json("/v1/hello", r#"{"name":" "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn status_renders_every_unit() {
    let (status, body) = send(app(), get("/api/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expected"], 5);
    assert_eq!(body["partial"], false);
    assert_eq!(body["completed"], 5);
    assert_eq!(body["canceled"], 0);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for result in results {
        let id = result["unit_id"].as_str().unwrap();
        assert!(id.starts_with("job-"));
        assert_eq!(result["state"], "completed");
        assert_eq!(result["message"], format!("Status for '{id}'"));
    }
}

#[tokio::test(start_paused = true)]
async fn status_honours_the_units_query() {
    let (status, body) = send(app(), get("/api/v1/status?units=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let (status, _) = send(app(), get("/api/v1/status?units=11")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(), get("/api/v1/status?units=many")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn status_is_unavailable_after_shutdown() {
    let status = StatusService::new(&ServerConfig::for_tests()).unwrap();
    status.shutdown().await;
    let app = router(AppState { status });

    let (code, body) = send(app, get("/api/v1/status")).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Service is shutting down");
}

#[tokio::test(start_paused = true)]
async fn status_times_out_when_complete_results_are_required() {
    let mut config = ServerConfig::for_tests();
    config.work_min = core::time::Duration::from_secs(10);
    config.work_max = core::time::Duration::from_secs(20);
    config.collect_deadline = Some(core::time::Duration::from_millis(100));
    config.require_complete = true;
    let app = router(AppState {
        status: StatusService::new(&config).unwrap(),
    });

    let (code, body) = send(app, get("/api/v1/status?units=2")).await;
    assert_eq!(code, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["message"].as_str().unwrap().contains("received 0 of 2"));
}
