use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use stub_server::{app, Stub, StubResponse};
use tower::ServiceExt;

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .header("token", "abc123")
        .body(body.to_string())
        .unwrap()
}

// --- fallback ---

#[tokio::test]
async fn default_stub_answers_empty_json_object() {
    let resp = app(Stub::default())
        .oneshot(Request::builder().uri("/api/user").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(value, serde_json::json!({}));
}

#[tokio::test]
async fn any_path_and_method_is_answered() {
    let stub = Stub::new(StubResponse::new(204));
    let resp = app(stub)
        .oneshot(form_request("DELETE", "/api/user/blocked/someone", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// --- script ---

#[tokio::test]
async fn scripted_responses_are_served_in_order() {
    let stub = Stub::default();
    stub.push(StubResponse::new(503));
    stub.push(StubResponse::new(200).header("token", "abc123"));

    let resp = app(stub.clone())
        .oneshot(form_request("POST", "/api/login", "user_name=rand&password=pass"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = app(stub.clone())
        .oneshot(form_request("POST", "/api/login", "user_name=rand&password=pass"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["token"], "abc123");

    let resp = app(stub)
        .oneshot(form_request("POST", "/api/login", "user_name=rand&password=pass"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("token").is_none());
}

#[tokio::test]
async fn json_body_is_returned_verbatim() {
    let stub = Stub::default();
    let downloads = serde_json::json!([{"id": 1, "link": "http://www.scorelab.org/assets/img/score.jpg"}]);
    stub.push(StubResponse::json(200, &downloads));

    let resp = app(stub)
        .oneshot(Request::builder().uri("/api/downloads/1").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    let value: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(value, downloads);
}

#[tokio::test]
async fn set_fallback_replaces_default() {
    let stub = Stub::default();
    stub.set_fallback(StubResponse::new(418));

    let resp = app(stub)
        .oneshot(Request::builder().uri("/api/user/heavy").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
}

// --- recording ---

#[tokio::test]
async fn requests_are_recorded() {
    let stub = Stub::default();
    app(stub.clone())
        .oneshot(form_request("POST", "/api/download/7", "rate=5"))
        .await
        .unwrap();
    app(stub.clone())
        .oneshot(Request::builder().uri("/api/file?gid=2089b05ecca3d829").body(String::new()).unwrap())
        .await
        .unwrap();

    let recorded = stub.recorded();
    assert_eq!(recorded.len(), 2);

    assert_eq!(recorded[0].method, "POST");
    assert_eq!(recorded[0].path, "/api/download/7");
    assert_eq!(recorded[0].query, None);
    assert_eq!(recorded[0].body, "rate=5");
    assert_eq!(recorded[0].header("token"), Some("abc123"));
    assert_eq!(
        recorded[0].header("content-type"),
        Some("application/x-www-form-urlencoded")
    );

    assert_eq!(recorded[1].method, "GET");
    assert_eq!(recorded[1].path, "/api/file");
    assert_eq!(recorded[1].query.as_deref(), Some("gid=2089b05ecca3d829"));
}

#[tokio::test]
async fn invalid_scripted_status_becomes_500() {
    let stub = Stub::default();
    stub.push(StubResponse::new(1000));

    let resp = app(stub)
        .oneshot(Request::builder().uri("/").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
