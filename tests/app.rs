use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use tower::ServiceExt;

use microblog::web::middleware::LOGIN_MESSAGE_HEADER;
use microblog::{Application, Settings};

async fn app_with(overrides: &[(&str, &str)]) -> Router {
    let mut vars = vec![
        ("APP_MODE", "testing"),
        ("DATABASE_URL", "sqlite::memory:"),
        ("DATABASE_MAX_CONNECTIONS", "1"),
        ("SECRET_KEY", "test-secret"),
    ];
    vars.extend_from_slice(overrides);

    let settings = Settings::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    });
    Application::build(settings).await.unwrap().router()
}

async fn app() -> Router {
    app_with(&[]).await
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn register(app: &Router, username: &str) -> String {
    let response = send(
        app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "cat",
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

async fn publish(app: &Router, token: &str, body: &str) {
    let response = send(app, request("POST", "/", Some(token), Some(json!({ "body": body })))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn timeline(app: &Router, token: &str) -> Value {
    let response = send(app, request("GET", "/index", Some(token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_check_responds() {
    let app = app().await;
    let response = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn following_brings_posts_into_the_timeline() {
    let app = app().await;
    let susan = register(&app, "susan").await;
    let john = register(&app, "john").await;

    publish(&app, &john, "post from john").await;
    publish(&app, &susan, "post from susan").await;

    let own = timeline(&app, &susan).await;
    assert_eq!(own["total"], 1);
    assert_eq!(own["items"][0]["body"], "post from susan");

    let response = send(&app, request("POST", "/follow/john", Some(&susan), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "You are following john!");

    let merged = timeline(&app, &susan).await;
    assert_eq!(merged["total"], 2);
    let bodies: Vec<&str> = merged["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["body"].as_str().unwrap())
        .collect();
    assert!(bodies.contains(&"post from john"));

    let response = send(&app, request("POST", "/unfollow/john", Some(&susan), None)).await;
    assert_eq!(body_json(response).await["message"], "You are not following john.");
    assert_eq!(timeline(&app, &susan).await["total"], 1);
}

#[tokio::test]
async fn profile_reports_follow_counts() {
    let app = app().await;
    let susan = register(&app, "susan").await;
    register(&app, "john").await;
    send(&app, request("POST", "/follow/john", Some(&susan), None)).await;

    let response = send(&app, request("GET", "/user/john", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let profile = body_json(response).await;
    assert_eq!(profile["user"]["username"], "john");
    assert_eq!(profile["followers_count"], 1);
    assert_eq!(profile["followed_count"], 0);
}

#[tokio::test]
async fn following_yourself_or_strangers_is_rejected() {
    let app = app().await;
    let susan = register(&app, "susan").await;

    let response = send(&app, request("POST", "/follow/susan", Some(&susan), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("You cannot follow yourself!"));

    let response = send(&app, request("POST", "/follow/nobody", Some(&susan), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("User nobody not found."));
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let app = app().await;
    let response = send(&app, request("GET", "/index?page=2", None, None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/auth/login?next=%2Findex%3Fpage%3D2"
    );
    assert_eq!(
        response.headers()[LOGIN_MESSAGE_HEADER],
        "Please log in to access this page."
    );
}

#[tokio::test]
async fn login_message_follows_the_negotiated_locale() {
    let app = app().await;
    let mut request = request("GET", "/", None, None);
    request
        .headers_mut()
        .insert(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.5".parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let raw = response.headers()[LOGIN_MESSAGE_HEADER].to_str().unwrap();
    assert_eq!(
        percent_decode_str(raw).decode_utf8().unwrap(),
        "请登录后访问此页面。"
    );
}

#[tokio::test]
async fn login_and_logout_round_trip() {
    let app = app().await;
    register(&app, "susan").await;

    let response = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "susan", "password": "dog" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "susan", "password": "cat" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();
    timeline(&app, &token).await;

    let response = send(&app, request("POST", "/auth/logout", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, request("GET", "/index", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn explore_is_public() {
    let app = app().await;
    let susan = register(&app, "susan").await;
    publish(&app, &susan, "hello world").await;

    let response = send(&app, request("GET", "/explore", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 1);
}

#[tokio::test]
async fn search_without_backend_is_unavailable() {
    let app = app().await;
    let susan = register(&app, "susan").await;

    let response = send(&app, request("GET", "/search?q=hello", Some(&susan), None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("Search is not available."));
}

#[tokio::test]
async fn translate_without_credentials_returns_localized_notice() {
    let app = app().await;
    let susan = register(&app, "susan").await;
    let payload = json!({
        "text": "Hola",
        "source_language": "es",
        "dest_language": "en",
    });

    let response = send(&app, request("POST", "/translate", Some(&susan), Some(payload.clone()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["text"],
        "Error: the translation service is not configured."
    );

    let mut request = request("POST", "/translate", Some(&susan), Some(payload));
    request
        .headers_mut()
        .insert(header::ACCEPT_LANGUAGE, "zh".parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(body_json(response).await["text"], "错误：翻译服务未配置。");
}

#[tokio::test]
async fn api_needs_a_token_except_for_signup() {
    let app = app().await;

    let response = send(&app, request("GET", "/api/users", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request(
            "POST",
            "/api/users",
            None,
            Some(json!({
                "username": "susan",
                "email": "susan@example.com",
                "password": "cat",
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_i64().unwrap();

    let token = register(&app, "john").await;
    let response = send(&app, request("GET", &format!("/api/users/{}", id), Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "susan");

    let response = send(&app, request("GET", "/api/users", Some(&token), None)).await;
    assert_eq!(body_json(response).await["total"], 2);
}

#[tokio::test]
async fn unknown_pages_render_the_not_found_template() {
    let app = app().await;
    let mut request = request("GET", "/nowhere", None, None);
    request
        .headers_mut()
        .insert(header::ACCEPT_LANGUAGE, "zh".parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("页面未找到"));
    assert!(html.contains(r#"lang="zh""#));
}

#[tokio::test]
async fn unknown_api_routes_answer_in_json() {
    let app = app().await;
    let response = send(&app, request("GET", "/api/nowhere", None, None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn broker_failures_render_the_error_page_for_browsers() {
    let app = app_with(&[("REDIS_URL", "redis://127.0.0.1:1/")]).await;
    let susan = register(&app, "susan").await;

    let response = send(&app, request("POST", "/export_posts", Some(&susan), None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());

    let mut request = request("POST", "/export_posts", Some(&susan), None);
    request
        .headers_mut()
        .insert(header::ACCEPT, "text/html".parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("An unexpected error has occurred"));
}

#[tokio::test]
async fn api_key_smtp_login_does_not_block_startup() {
    let app = app_with(&[
        ("MAIL_SERVER", "smtp.sendgrid.net"),
        ("MAIL_USERNAME", "apikey"),
        ("MAIL_PASSWORD", "secret"),
    ])
    .await;

    let response = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
