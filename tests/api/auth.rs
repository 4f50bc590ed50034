use crate::helper::{spawn_app, OWNER_EMAIL, OWNER_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn owner_login_returns_token_pair() {
    let app = spawn_app().await;
    let response = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": OWNER_EMAIL.to_uppercase(), "password": OWNER_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["data"]["accessToken"].is_string());
    assert!(body["data"]["refreshToken"].is_string());
    assert_eq!(body["data"]["account"]["email"], OWNER_EMAIL);
    assert!(body["data"]["account"].get("passwordHash").is_none());
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": OWNER_EMAIL, "password": "not-the-password" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn login_with_malformed_email_is_a_validation_error() {
    let app = spawn_app().await;
    let response = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": "not-an-email", "password": OWNER_PASSWORD }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let app = spawn_app().await;
    let response = app
        .post_json(
            "/auth/login",
            None,
            &json!({ "email": OWNER_EMAIL, "password": OWNER_PASSWORD }),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    let refresh_token = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let first = app
        .post_json("/auth/refresh-token", None, &json!({ "refreshToken": refresh_token }))
        .await;
    assert_eq!(first.status().as_u16(), 200);
    let rotated: Value = first.json().await.unwrap();
    assert_ne!(rotated["data"]["refreshToken"], refresh_token);

    let replay = app
        .post_json("/auth/refresh-token", None, &json!({ "refreshToken": refresh_token }))
        .await;
    assert_eq!(replay.status().as_u16(), 401);
}

#[tokio::test]
async fn staff_routes_require_a_bearer_token() {
    let app = spawn_app().await;
    let response = app
        .api_client
        .get(&format!("{}/tables", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("/tables", "garbage").await;
    assert_eq!(response.status().as_u16(), 401);
}
