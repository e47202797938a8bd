use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppConfig, AppState,
    auth::{Claims, LOCAL_USER_HEADER},
    create_router,
    models::{Post, Role, SubscriptionStatus, User},
    policy::PAID_CONTENT_PLACEHOLDER,
    repository::{MemoryRepository, Repository, RepositoryState},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::{sync::Arc, time::SystemTime};
use tokio::net::TcpListener;
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Fixtures ---

const AUTHOR_ID: Uuid = Uuid::from_u128(100);
const READER_ID: Uuid = Uuid::from_u128(200);
const SUBSCRIBER_ID: Uuid = Uuid::from_u128(300);
const ADMIN_ID: Uuid = Uuid::from_u128(400);
const FREE_POST_ID: Uuid = Uuid::from_u128(1);
const PAID_POST_ID: Uuid = Uuid::from_u128(2);

fn test_user(id: Uuid, role: Role, subscription_status: SubscriptionStatus) -> User {
    User {
        id,
        email: format!("{}@blog.test", id.simple()),
        role,
        subscription_status,
    }
}

async fn seeded_repo() -> Arc<MemoryRepository> {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert_user(test_user(AUTHOR_ID, Role::Standard, SubscriptionStatus::Free)).await;
    repo.insert_user(test_user(READER_ID, Role::Standard, SubscriptionStatus::Free)).await;
    repo.insert_user(test_user(SUBSCRIBER_ID, Role::Standard, SubscriptionStatus::Paid)).await;
    repo.insert_user(test_user(ADMIN_ID, Role::Admin, SubscriptionStatus::Free)).await;

    let now = Utc::now();
    repo.seed_post(Post {
        id: FREE_POST_ID,
        title: "Welcome".to_string(),
        content: "Free for all".to_string(),
        is_paid: false,
        author_id: AUTHOR_ID,
        created_at: now - Duration::hours(1),
    })
    .await;
    repo.seed_post(Post {
        id: PAID_POST_ID,
        title: "Deep dive".to_string(),
        content: "Premium insight".to_string(),
        is_paid: true,
        author_id: AUTHOR_ID,
        created_at: now,
    })
    .await;
    repo
}

fn app(repo: Arc<MemoryRepository>) -> Router {
    let state = AppState {
        repo: repo as RepositoryState,
        config: AppConfig::default(),
    };
    create_router(state)
}

fn bearer_token(user_id: Uuid) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };

    let key = EncodingKey::from_secret(AppConfig::default().jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

enum Caller {
    Anonymous,
    Bypass(Uuid),
    Bearer(Uuid),
    BrokenToken,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Caller,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    builder = match caller {
        Caller::Anonymous => builder,
        Caller::Bypass(id) => builder.header(LOCAL_USER_HEADER, id.to_string()),
        Caller::Bearer(id) => {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer_token(id)))
        }
        Caller::BrokenToken => builder.header(header::AUTHORIZATION, "Bearer not-a-jwt"),
    };

    let request = match body {
        Some(json_body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn find_post<'a>(list: &'a Value, id: Uuid) -> &'a Value {
    list["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == id.to_string())
        .expect("post missing from listing")
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = app(Arc::new(MemoryRepository::new()));
    let (status, body) = send(&app, Method::GET, "/health", Caller::Anonymous, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_db_test_reports_clock() {
    let app = app(Arc::new(MemoryRepository::new()));
    let (status, body) = send(&app, Method::GET, "/db-test", Caller::Anonymous, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["now"].is_string());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = app(Arc::new(MemoryRepository::new()));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_anonymous_list_includes_redacted_paid_post_on_every_alias() {
    let app = app(seeded_repo().await);

    for uri in ["/api/posts", "/api/posts/", "/api/posts/getAllPosts"] {
        let (status, body) = send(&app, Method::GET, uri, Caller::Anonymous, None).await;
        assert_eq!(status, StatusCode::OK, "alias {uri}");

        let paid = find_post(&body, PAID_POST_ID);
        assert_eq!(paid["content"], PAID_CONTENT_PLACEHOLDER);
        assert_eq!(paid["title"], "Deep dive");
        assert_eq!(paid["is_paid"], true);
        assert!(paid["created_at"].is_string());

        let free = find_post(&body, FREE_POST_ID);
        assert_eq!(free["content"], "Free for all");

        // Newest first.
        assert_eq!(body["posts"][0]["id"], PAID_POST_ID.to_string());
    }
}

#[tokio::test]
async fn test_invalid_token_on_optional_route_degrades_to_anonymous() {
    let app = app(seeded_repo().await);

    let (status, body) = send(&app, Method::GET, "/api/posts", Caller::BrokenToken, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(find_post(&body, PAID_POST_ID)["content"], PAID_CONTENT_PLACEHOLDER);
}

#[tokio::test]
async fn test_paid_subscriber_fetches_paid_post() {
    let app = app(seeded_repo().await);
    let uri = format!("/api/posts/{}", PAID_POST_ID);

    let (status, body) = send(&app, Method::GET, &uri, Caller::Bearer(SUBSCRIBER_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["content"], "Premium insight");

    let (status, body) = send(&app, Method::GET, &uri, Caller::Anonymous, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "message": PAID_CONTENT_PLACEHOLDER }));
}

#[tokio::test]
async fn test_create_requires_identity() {
    let app = app(seeded_repo().await);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/posts/create",
        Caller::Anonymous,
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Authentication required" }));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/posts/createPost",
        Caller::BrokenToken,
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_on_both_aliases() {
    let repo = seeded_repo().await;
    let app = app(repo.clone());

    for uri in ["/api/posts/create", "/api/posts/createPost"] {
        let (status, body) = send(
            &app,
            Method::POST,
            uri,
            Caller::Bypass(READER_ID),
            Some(json!({ "title": "Mine", "content": "My words", "is_paid": true })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED, "alias {uri}");
        assert_eq!(body["message"], "Post created successfully");
        assert_eq!(body["post"]["author_id"], READER_ID.to_string());
        assert_eq!(body["post"]["is_paid"], true);
    }

    assert_eq!(repo.list_posts().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_create_missing_title_is_400() {
    let app = app(seeded_repo().await);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/posts/create",
        Caller::Bearer(READER_ID),
        Some(json!({ "content": "no title" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "title and content are required");
}

#[tokio::test]
async fn test_non_owner_update_forbidden_on_both_aliases() {
    let repo = seeded_repo().await;
    let app = app(repo.clone());

    for uri in [
        format!("/api/posts/{}", FREE_POST_ID),
        format!("/api/posts/updatepost/{}", FREE_POST_ID),
    ] {
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Caller::Bearer(SUBSCRIBER_ID),
            Some(json!({ "title": "Hijacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "alias {uri}");
        assert_eq!(body["message"], "Not authorized");
    }

    let stored = repo.find_post(FREE_POST_ID).await.unwrap().unwrap();
    assert_eq!(stored.title, "Welcome");
}

#[tokio::test]
async fn test_owner_partial_update() {
    let app = app(seeded_repo().await);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", PAID_POST_ID),
        Caller::Bearer(AUTHOR_ID),
        Some(json!({ "title": "Deeper dive" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post updated");
    assert_eq!(body["post"]["title"], "Deeper dive");
    assert_eq!(body["post"]["content"], "Premium insight");
    assert_eq!(body["post"]["is_paid"], true);
}

#[tokio::test]
async fn test_mutating_missing_post_is_404_not_403() {
    let app = app(seeded_repo().await);
    let missing = Uuid::new_v4();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", missing),
        Caller::Bearer(READER_ID),
        Some(json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/posts/deletepost/{}", missing),
        Caller::Bearer(READER_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_with_absent_or_mistyped_body_is_400() {
    let app = app(seeded_repo().await);

    for body in [None, Some(json!({ "title": 1, "content": "x" }))] {
        let (status, response) = send(
            &app,
            Method::POST,
            "/api/posts/create",
            Caller::Bypass(READER_ID),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["message"], "title and content are required");
    }
}

#[tokio::test]
async fn test_update_without_body_is_an_empty_update() {
    let app = app(seeded_repo().await);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", Uuid::new_v4()),
        Caller::Bypass(AUTHOR_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/updatepost/{}", FREE_POST_ID),
        Caller::Bypass(AUTHOR_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "Welcome");
    assert_eq!(body["post"]["content"], "Free for all");
}

#[tokio::test]
async fn test_unreadable_update_body_is_checked_after_ownership() {
    let app = app(seeded_repo().await);
    let uri = format!("/api/posts/{}", FREE_POST_ID);
    let mistyped = json!({ "title": 1 });

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Caller::Bearer(SUBSCRIBER_ID),
        Some(mistyped.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &uri, Caller::Bearer(AUTHOR_ID), Some(mistyped)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid update payload");
}

#[tokio::test]
async fn test_malformed_post_id_is_404() {
    let app = app(seeded_repo().await);

    let (status, body) = send(&app, Method::GET, "/api/posts/42", Caller::Anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, body) = send(&app, Method::DELETE, "/api/posts/42", Caller::Bearer(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/posts/updatepost/not-a-uuid",
        Caller::Bearer(AUTHOR_ID),
        Some(json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutation_without_identity_is_401_even_for_missing_post() {
    let app = app(seeded_repo().await);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/posts/{}", Uuid::new_v4()),
        Caller::Anonymous,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_deletes_any_post_then_get_is_404() {
    let app = app(seeded_repo().await);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/posts/deletepost/{}", FREE_POST_ID),
        Caller::Bypass(ADMIN_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Post deleted" }));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}", FREE_POST_ID),
        Caller::Bypass(ADMIN_ID),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_failure_surfaces_as_500() {
    let app = app(Arc::new(MemoryRepository::new_failing()));

    let (status, body) = send(&app, Method::GET, "/api/posts", Caller::Anonymous, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().starts_with("Error listing posts"));
}

#[tokio::test]
async fn test_served_over_tcp() {
    let router = app(seeded_repo().await);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();

    let health = client
        .get(format!("{}/health", address))
        .send()
        .await
        .expect("req fail");
    assert!(health.status().is_success());

    let created = client
        .post(format!("{}/api/posts/create", address))
        .bearer_auth(bearer_token(AUTHOR_ID))
        .json(&json!({ "title": "Over the wire", "content": "Hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);

    let body: Value = created.json().await.unwrap();
    assert_eq!(body["post"]["is_paid"], false);
}
