use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use blognest_api::{build_app, AppConfig};
use blognest_auth::AuthConfig;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "blognest-test-boundary";

fn auth_config() -> AuthConfig {
    AuthConfig {
        access_secret: "access-secret-for-integration-tests!!".to_string(),
        refresh_secret: "refresh-secret-for-integration-tests!".to_string(),
        access_token_expiration: 900,
        refresh_token_expiration: 604800,
        jwt_issuer: "blognest".to_string(),
        jwt_audience: "blognest-api".to_string(),
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 6,
    }
}

async fn test_app() -> (Router, TempDir) {
    let uploads = tempfile::tempdir().unwrap();
    let config = AppConfig {
        uploads_dir: uploads.path().to_path_buf(),
        max_upload_bytes: 1024,
        ..AppConfig::default()
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let app = build_app(&config, auth_config(), pool).await.unwrap();
    (app, uploads)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    builder.body(Body::empty()).unwrap()
}

fn multipart_request(
    uri: &str,
    token: &str,
    field: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, token)
        .body(Body::from(body))
        .unwrap()
}

struct Session {
    id: String,
    access: String,
    refresh: String,
}

async fn register(app: &Router, name: &str, email: &str) -> Session {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/user/register",
            None,
            json!({"name": name, "email": email, "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    Session {
        id: body["data"]["id"].as_str().unwrap().to_string(),
        access: body["accessToken"].as_str().unwrap().to_string(),
        refresh: body["refreshToken"].as_str().unwrap().to_string(),
    }
}

async fn create_post(app: &Router, session: &Session, title: &str, category: &str) -> Value {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/posts",
            Some(&session.access),
            json!({"title": title, "category": category, "content": "Some content"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

#[tokio::test]
async fn health_and_user_router_liveness() {
    let (app, _uploads) = test_app().await;

    let response = send(&app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = send(&app, get("/api/user/test", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_profile() {
    let (app, _uploads) = test_app().await;
    let session = register(&app, "Ada", "Ada@Example.com").await;

    let response = send(&app, get("/api/user/profile", Some(&session.access))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["avatar"], Value::Null);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/login",
            None,
            json!({"email": "ada@example.com", "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["accessToken"].as_str().unwrap().starts_with("Bearer "));

    let response = send(&app, get("/api/user/profile", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _uploads) = test_app().await;
    register(&app, "Ada", "ada@example.com").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/register",
            None,
            json!({"name": "Other", "email": "ada@example.com", "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn post_crud_and_ownership() {
    let (app, _uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let post = create_post(&app, &ada, "  First post  ", "Rust").await;
    let id = post["id"].as_str().unwrap().to_string();
    assert_eq!(post["title"], "First post");
    assert_eq!(post["author_name"], "Ada");

    let response = send(&app, get(&format!("/api/posts/{id}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Someone else's post can be read but not changed
    let response = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/posts/{id}"),
            Some(&bob.access),
            json!({"title": "Hijacked"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/posts/{id}"))
            .header(header::AUTHORIZATION, &bob.access)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/posts/{id}"),
            Some(&ada.access),
            json!({"content": "Edited"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["content"], "Edited");
    assert_eq!(body["data"]["title"], "First post");

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/posts/{id}"))
            .header(header::AUTHORIZATION, &ada.access)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get(&format!("/api/posts/{id}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_validation_and_auth() {
    let (app, _uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/posts",
            None,
            json!({"title": "t", "category": "c", "content": "x"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/posts",
            Some(&ada.access),
            json!({"title": "x".repeat(201), "category": "c", "content": "x"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/posts",
            Some(&ada.access),
            json!({"title": "t", "category": "c", "content": "   "}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn assert_validation_envelope(response: Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn malformed_input_uses_error_envelope() {
    let (app, _uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;
    let post = create_post(&app, &ada, "Mine", "Rust").await;
    let id = post["id"].as_str().unwrap();

    assert_validation_envelope(send(&app, get("/api/posts/not-a-uuid", None)).await).await;
    assert_validation_envelope(send(&app, get("/api/posts/user/not-a-uuid", None)).await).await;
    assert_validation_envelope(send(&app, get("/api/posts?page=abc", None)).await).await;

    let response = send(
        &app,
        json_request(
            "PATCH",
            "/api/posts/not-a-uuid",
            Some(&ada.access),
            json!({"title": "x"}),
        ),
    )
    .await;
    assert_validation_envelope(response).await;

    // Thumbnail upload without a multipart body
    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/api/posts/{id}/thumbnail"),
            Some(&ada.access),
            json!({}),
        ),
    )
    .await;
    assert_validation_envelope(response).await;
}

#[tokio::test]
async fn listing_pagination_category_and_author() {
    let (app, _uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    create_post(&app, &ada, "One", "Rust").await;
    create_post(&app, &ada, "Two", "Travel").await;
    create_post(&app, &bob, "Three", "rust").await;

    let response = send(&app, get("/api/posts?page=1&per_page=2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["total_pages"], 2);
    assert_eq!(body["data"]["pagination"]["has_next"], true);

    // Newest first
    let titles: Vec<&str> = body["data"]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Three", "Two"]);

    let response = send(&app, get("/api/posts?page=2&per_page=2", None)).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["posts"][0]["title"], "One");
    assert_eq!(body["data"]["pagination"]["has_next"], false);
    assert_eq!(body["data"]["pagination"]["has_prev"], true);

    // Past the last page
    let response = send(&app, get("/api/posts?page=5&per_page=2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["posts"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["pagination"]["page"], 5);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["has_next"], false);

    let response = send(&app, get("/api/posts?page=9223372036854775807", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["posts"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["pagination"]["page"], 1_000_000);

    let response = send(&app, get("/api/posts/category/RUST", None)).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = send(&app, get(&format!("/api/posts/user/{}", bob.id), None)).await;
    let body = body_json(response).await;
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Three");
}

#[tokio::test]
async fn thumbnail_upload_is_served_and_replaced() {
    let (app, uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let post = create_post(&app, &ada, "Pictures", "Photo").await;
    let id = post["id"].as_str().unwrap();
    let uri = format!("/api/posts/{id}/thumbnail");

    let response = send(
        &app,
        multipart_request(&uri, &bob.access, "thumbnail", "image/png", b"png-bytes"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        multipart_request(&uri, &ada.access, "thumbnail", "text/plain", b"hello"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        multipart_request(&uri, &ada.access, "thumbnail", "image/png", &[0u8; 2000]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        multipart_request(&uri, &ada.access, "thumbnail", "image/png", b"png-bytes"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await["data"]["thumbnail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(first.starts_with("/uploads/thumbnails/"));

    let response = send(&app, get(&first, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"png-bytes");

    let response = send(
        &app,
        multipart_request(&uri, &ada.access, "thumbnail", "image/webp", b"webp-bytes"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await["data"]["thumbnail"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(first, second);

    let old_file = uploads
        .path()
        .join(first.trim_start_matches("/uploads/"));
    assert!(!old_file.exists());
}

#[tokio::test]
async fn avatar_upload_updates_profile() {
    let (app, uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;

    let response = send(
        &app,
        multipart_request("/api/user/avatar", &ada.access, "avatar", "image/jpeg", b"jpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let avatar = body_json(response).await["data"]["avatar"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(avatar.starts_with("/uploads/avatars/"));
    assert!(avatar.ends_with(".jpg"));
    assert!(uploads
        .path()
        .join(avatar.trim_start_matches("/uploads/"))
        .exists());

    let response = send(&app, get("/api/user/profile", Some(&ada.access))).await;
    assert_eq!(body_json(response).await["data"]["avatar"], avatar.as_str());

    let response = send(
        &app,
        multipart_request("/api/user/avatar", &ada.access, "wrong", "image/jpeg", b"jpeg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_account_cascades() {
    let (app, uploads) = test_app().await;
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let post = create_post(&app, &ada, "Doomed", "Misc").await;
    create_post(&app, &bob, "Survivor", "Misc").await;

    let uri = format!("/api/posts/{}/thumbnail", post["id"].as_str().unwrap());
    let response = send(
        &app,
        multipart_request(&uri, &ada.access, "thumbnail", "image/gif", b"gif"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/api/user/delete")
            .header(header::AUTHORIZATION, &ada.access)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get(&format!("/api/posts/user/{}", ada.id), None)).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let response = send(&app, get("/api/posts/category/misc", None)).await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/refresh",
            None,
            json!({"refreshToken": ada.refresh}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, get("/api/user/profile", Some(&ada.access))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(!uploads
        .path()
        .join(format!("thumbnails/{}", ada.id))
        .exists());
}

#[tokio::test]
async fn logout_keeps_other_sessions() {
    let (app, _uploads) = test_app().await;
    let first = register(&app, "Ada", "ada@example.com").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/login",
            None,
            json!({"email": "ada@example.com", "password": "secret1"}),
        ),
    )
    .await;
    let second_refresh = body_json(response).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/logout",
            Some(&first.access),
            json!({"refreshToken": first.refresh}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/refresh",
            None,
            json!({"refreshToken": first.refresh}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/user/refresh",
            None,
            json!({"refreshToken": second_refresh}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
