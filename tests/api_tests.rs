use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use fplcup::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_PASSWORD: &str = "correct-horse-battery";

async fn spawn_app(upstream: &MockServer) -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.admin_password = ADMIN_PASSWORD.to_string();
    config.server.secure_cookies = false;
    config.upstream.base_url = upstream.uri();
    config.upstream.backoff_base_ms = 1;

    let state = fplcup::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    fplcup::api::router(state)
}

async fn mock_upstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bootstrap-static/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                { "id": 1, "name": "Gameweek 1", "is_current": true, "is_next": false,
                  "deadline_time": "2024-08-16T17:30:00Z" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entry/555/history/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current": [{ "event": 1, "points": 64, "total_points": 64 }]
        })))
        .mount(&server)
        .await;
    server
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_token(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            &json!({ "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app.clone().oneshot(get("/api/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(with_token(get("/api/users"), "not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let legacy = Request::builder()
        .uri("/api/users")
        .header(header::COOKIE, "admin=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(legacy).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login(&app).await;
    let response = app
        .clone()
        .oneshot(with_token(get("/api/users"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_sets_cookie_and_logout_clears_it() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            &json!({ "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("admin-token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(!cookie.contains("Secure"));

    let token_pair = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/users")
        .header(header::COOKIE, token_pair.as_str())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut logout = json_request("POST", "/api/admin/logout", &json!({}));
    logout
        .headers_mut()
        .insert(header::COOKIE, token_pair.parse().unwrap());
    let response = app.clone().oneshot(logout).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.starts_with("admin-token=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_login_rejections_and_lockout() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/admin/login", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/login",
                &json!({ "password": "wrong-password" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Locked out even with the right password.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            &json!({ "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let body = body_json(response).await;
    assert!(body["retry_after"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_registration_waits_for_approval() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/registrations",
            &json!({
                "name": "Sam Player",
                "email": "sam@example.com",
                "company": "Acme",
                "entryId": "555"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/leaderboard?gw=1"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["leaderboard"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["meta"]["total_users"], 0);

    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(with_token(get("/api/users?status=PENDING"), &token))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["status"], "PENDING");
    assert_eq!(body["data"][0]["entry_id"], 555);

    let response = app
        .clone()
        .oneshot(with_token(
            json_request(
                "PATCH",
                &format!("/api/users/{user_id}"),
                &json!({ "status": "APPROVED" }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/leaderboard?gw=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body["data"]["leaderboard"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Sam Player");
    assert_eq!(rows[0]["points"], 64);
    assert_eq!(rows[0]["rank"], 1);
    assert!(rows[0].get("email").is_none());
    assert_eq!(body["data"]["meta"]["gameweek"], "1");
}

#[tokio::test]
async fn test_admin_user_management() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(with_token(
            json_request(
                "POST",
                "/api/users",
                &json!({ "name": "Direct Add", "email": "direct@example.com", "entryId": 555 }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    let id = body["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(with_token(
            json_request("PATCH", &format!("/api/users/{id}"), &json!({ "status": "PENDING" })),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app
        .clone()
        .oneshot(with_token(delete, &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let delete_again = Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app
        .clone()
        .oneshot(with_token(delete_again, &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leaderboards_report_failed_fetches() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;
    let token = login(&app).await;

    for (name, email, entry_id) in [
        ("Sam Player", "sam@example.com", 555),
        ("Ghost Entry", "ghost@example.com", 404),
    ] {
        let response = app
            .clone()
            .oneshot(with_token(
                json_request(
                    "POST",
                    "/api/users",
                    &json!({ "name": name, "email": email, "entryId": entry_id }),
                ),
                &token,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/api/leaderboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let meta = &body["data"]["meta"];
    assert_eq!(meta["gameweek"], "current");
    assert_eq!(meta["total_users"], 2);
    assert_eq!(meta["successful_fetches"], 1);
    assert_eq!(meta["failed_fetches"], 1);
    assert_eq!(body["data"]["leaderboard"][0]["name"], "Sam Player");
    assert_eq!(body["data"]["leaderboard"][0]["points"], 64);
    let warnings = body["data"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["user"], "Ghost Entry");
    assert_eq!(warnings[0]["entry_id"], 404);

    let response = app
        .clone()
        .oneshot(get("/api/monthly?year=2024&month=8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["month_event_ids"], json!([1]));
    assert_eq!(body["data"]["leaderboard"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["winner"]["name"], "Sam Player");
    let warnings = body["data"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["user"], "Ghost Entry");
}

#[tokio::test]
async fn test_request_validation() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    for uri in [
        "/api/leaderboard?gw=39",
        "/api/leaderboard?gw=abc",
        "/api/monthly?year=1999&month=5",
        "/api/monthly?year=2024&month=13",
        "/api/fpl/weekly",
        "/api/fpl/weekly?entryId=-5",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/registrations",
            &json!({ "name": "S", "email": "not-an-email", "entryId": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_weekly_points_endpoint() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app
        .clone()
        .oneshot(get("/api/fpl/weekly?entryId=555"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!({ "event_id": 1, "points": 64 }));

    let response = app
        .clone()
        .oneshot(get("/api/fpl/weekly?entryId=555&gw=10"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"], json!({ "event_id": 10, "points": 0 }));

    let response = app
        .clone()
        .oneshot(get("/api/fpl/weekly?entryId=777"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_headers_and_rejection() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app
        .clone()
        .oneshot(get("/api/monthly?year=2024&month=9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "29");
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    let bad_registration = json!({ "name": "x" });
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/registrations", &bad_registration))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/registrations", &bad_registration))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let body = body_json(response).await;
    assert_eq!(body["error"], "Too many requests");
    assert!(body["retry_after"].as_u64().unwrap() <= 300);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let upstream = mock_upstream().await;
    let app = spawn_app(&upstream).await;

    let response = app.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "ok");
    assert!(body.get("upstream").is_none());

    let response = app
        .clone()
        .oneshot(get("/api/health?upstream=true"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["upstream"]["status"], "ok");

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
