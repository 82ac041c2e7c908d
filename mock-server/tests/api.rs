use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, router, AppState, MockConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const APP_ID: &str = "mock-app-id";
const MASTER_KEY: &str = "mock-master-key";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Parse-Application-Id", APP_ID)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<String> {
    request(method, uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    request(method, uri).body(String::new()).unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_application_id_is_unauthorized() {
    let resp = app()
        .oneshot(Request::builder().uri("/1/classes/GameScore").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({"error": "unauthorized"}));
}

#[tokio::test]
async fn wrong_application_id_is_unauthorized() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/1/classes/GameScore")
                .header("X-Parse-Application-Id", "someone-else")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- classes ---

#[tokio::test]
async fn query_empty_class_returns_empty_results() {
    let resp = app().oneshot(empty_request("GET", "/1/classes/GameScore")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"results": []}));
}

#[tokio::test]
async fn create_object_returns_201_without_echoing_fields() {
    let resp = app()
        .oneshot(json_request("POST", "/1/classes/GameScore", json!({"score": 1337})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert!(body["objectId"].is_string());
    assert!(body["createdAt"].is_string());
    assert!(body.get("score").is_none());
}

#[tokio::test]
async fn get_missing_object_is_404_with_code() {
    let resp = app()
        .oneshot(empty_request("GET", "/1/classes/GameScore/nope"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["code"], 101);
}

#[tokio::test]
async fn bad_where_is_rejected() {
    let resp = app()
        .oneshot(empty_request("GET", "/1/classes/GameScore?where=%7Bnope"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], 107);
}

#[tokio::test]
async fn object_lifecycle() {
    let state = AppState::new(MockConfig::default());
    let app = router(state);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/classes/GameScore", json!({"score": 10, "player": "a"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["objectId"].as_str().unwrap().to_string();

    // increment
    let resp = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/1/classes/GameScore/{id}"),
            json!({"score": {"__op": "Increment", "amount": 5}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["score"], 15);

    // count
    let resp = app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/1/classes/GameScore?count=1&limit=0&where=%7B%22player%22%3A%22a%22%7D",
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await, json!({"results": [], "count": 1}));

    // delete
    let resp = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/1/classes/GameScore/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(empty_request("GET", &format!("/1/classes/GameScore/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- users ---

#[tokio::test]
async fn sign_up_requires_username_and_password() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/users", json!({"password": "p"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], 200);

    let resp = app
        .oneshot(json_request("POST", "/1/users", json!({"username": "u"})))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["code"], 201);
}

#[tokio::test]
async fn sign_up_log_in_and_me() {
    let app = app();

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/users", json!({"username": "cooldude6", "password": "p_n7!-e8"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let signed_up = body_json(resp).await;
    assert!(signed_up["sessionToken"].as_str().unwrap().starts_with("r:"));

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/users", json!({"username": "cooldude6", "password": "x"})))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["code"], 202);

    let resp = app
        .clone()
        .oneshot(empty_request("GET", "/1/login?username=cooldude6&password=p_n7%21-e8"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let logged_in = body_json(resp).await;
    assert_eq!(logged_in["username"], "cooldude6");
    assert!(logged_in.get("password").is_none());
    let token = logged_in["sessionToken"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(
            request("GET", "/1/users/me")
                .header("X-Parse-Session-Token", token)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["objectId"], signed_up["objectId"]);

    let resp = app
        .oneshot(empty_request("GET", "/1/login?username=cooldude6&password=wrong"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_user_requires_session_or_master_key() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/users", json!({"username": "u", "password": "p"})))
        .await
        .unwrap();
    let id = body_json(resp).await["objectId"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(json_request("PUT", &format!("/1/users/{id}"), json!({"phone": "1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], 206);

    let resp = app
        .oneshot(
            request("PUT", &format!("/1/users/{id}"))
                .header("X-Parse-Master-Key", MASTER_KEY)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(json!({"phone": "1"}).to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- files ---

#[tokio::test]
async fn file_delete_requires_master_key() {
    let state = AppState::new(MockConfig::default());
    let app = router(state.clone());

    let resp = app
        .clone()
        .oneshot(
            request("POST", "/1/files/hello.txt")
                .header(http::header::CONTENT_TYPE, "text/plain")
                .body("Hello, World!".to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let name = body_json(resp).await["name"].as_str().unwrap().to_string();
    assert!(name.ends_with("-hello.txt"));
    {
        let db = state.db.read().await;
        let file = db.file(&name).unwrap();
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(file.bytes, b"Hello, World!");
    }

    let resp = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/1/files/{name}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .oneshot(
            request("DELETE", &format!("/1/files/{name}"))
                .header("X-Parse-Master-Key", MASTER_KEY)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(state.db.read().await.file(&name).is_none());
}

// --- events, push, batch ---

#[tokio::test]
async fn events_and_pushes_are_recorded() {
    let state = AppState::new(MockConfig::default());
    let app = router(state.clone());

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/events/AppOpened", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/1/push", json!({"channels": ["Giants"]})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], 115);

    let resp = app
        .oneshot(json_request(
            "POST",
            "/1/push",
            json!({"channels": ["Giants"], "data": {"alert": "The Giants won!"}}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await, json!({"result": true}));

    let db = state.db.read().await;
    assert_eq!(db.events, vec![("AppOpened".to_string(), json!({}))]);
    assert_eq!(db.pushes.len(), 1);
}

#[tokio::test]
async fn batch_reports_per_entry_outcomes() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/1/batch",
            json!({"requests": [
                {"method": "POST", "path": "/1/classes/GameScore", "body": {"score": 1}},
                {"method": "DELETE", "path": "/1/classes/GameScore/missing"},
                {"method": "POST", "path": "/classes/GameScore", "body": {"score": 2}},
            ]}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body[0]["success"]["objectId"].is_string());
    assert_eq!(body[1]["error"]["code"], 101);
    assert_eq!(body[2]["error"]["code"], 107);
}
