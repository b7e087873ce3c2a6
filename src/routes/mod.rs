use axum::Router;
use tower_http::normalize_path::NormalizePath;

use crate::{config::Domain, state::SharedState};

pub mod achievements;
pub mod catalog;
pub mod docs;
pub mod forum;
pub mod health;
pub mod notifications;
pub mod online;
pub mod payments;
pub mod purchases;
pub mod recommendations;
pub mod reviews;
pub mod shopping;
pub mod social;
pub mod users;
pub mod workshop;

fn domain_router(domain: Domain, state: &SharedState) -> Router<SharedState> {
    match domain {
        Domain::Users => users::router(),
        Domain::Catalog => catalog::router(state.clone()),
        Domain::Reviews => reviews::router(),
        Domain::Shopping => shopping::router(),
        Domain::Purchases => purchases::router(),
        Domain::Payments => payments::router(),
        Domain::Online => online::router(),
        Domain::Social => social::router(),
        Domain::Notifications => notifications::router(),
        Domain::Recommendations => recommendations::router(),
        Domain::Achievements => achievements::router(),
        Domain::Forum => forum::router(),
        Domain::Workshop => workshop::router(state.clone()),
    }
}

/// Compose the configured domain trees under their `/api/v1/<domain>`
/// prefixes, plus health and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let mut api_router = health::router().merge(docs::router());
    for domain in &state.config().domains {
        api_router = api_router.nest(&domain.prefix(), domain_router(*domain, &state));
    }
    api_router.with_state(state)
}

/// Serve `router` so that `/path/` and `/path` reach the same handler.
///
/// Path normalisation has to run before routing, so it wraps the router
/// instead of being added as a router layer.
pub fn trailing_slash_tolerant(router: Router<()>) -> NormalizePath<Router<()>> {
    NormalizePath::trim_trailing_slash(router)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::state::test_support::memory_state;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_lists_mounted_domains() {
        let app = router(memory_state().await);
        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["services"].as_array().map(Vec::len), Some(13));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = router(memory_state().await);
        let (status, body) = send(
            &app,
            Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/online/lobbies"].is_object());
        assert!(body["paths"]["/api/v1/online/ws/lobbies/{id}"].is_object());
        assert!(body["paths"]["/api/v1/workshop/items/upload"].is_object());
    }

    #[tokio::test]
    async fn lobby_flow_over_http() {
        let app = router(memory_state().await);
        let host = uuid::Uuid::new_v4();
        let (status, lobby) = send(
            &app,
            post_json(
                "/api/v1/online/lobbies",
                json!({ "host_id": host, "name": "Friday raid" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(lobby.get("passcode").is_none());

        let id = lobby["id"].as_str().unwrap().to_owned();
        let (status, body) = send(
            &app,
            Request::post(format!("/api/v1/online/lobbies/{id}/leave?user_id={host}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Lobby closed");
    }

    #[tokio::test]
    async fn trailing_slash_reaches_the_domain_root() {
        let app = trailing_slash_tolerant(router(memory_state().await));
        let user = uuid::Uuid::new_v4();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/purchases/",
                json!({ "user_id": user, "total_amount": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/purchases/user/{user}/"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn user_directory_lives_under_users() {
        let app = router(memory_state().await);
        let (status, user) = send(
            &app,
            post_json(
                "/api/v1/users/register",
                json!({ "username": "ada", "email": "ada@example.com", "password": "difference-engine" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = user["id"].as_str().unwrap().to_owned();

        let (status, profile) = send(
            &app,
            Request::get(format!("/api/v1/users/users/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["username"], "ada");

        let (status, listed) = send(
            &app,
            Request::get("/api/v1/users/users").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, login) = send(
            &app,
            post_json(
                "/api/v1/users/login",
                json!({ "username_or_email": "ada", "password": "difference-engine" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = login["access_token"].as_str().unwrap();
        let (status, me) = send(
            &app,
            Request::get("/api/v1/users/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"].as_str(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn review_votes_come_from_the_query_string() {
        let app = router(memory_state().await);
        let (status, review) = send(
            &app,
            post_json(
                "/api/v1/reviews",
                json!({
                    "user_id": uuid::Uuid::new_v4(),
                    "game_id": uuid::Uuid::new_v4(),
                    "content": "Tight controls",
                    "rating": 5,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = review["id"].as_str().unwrap().to_owned();

        let voter = uuid::Uuid::new_v4();
        let (status, vote) = send(
            &app,
            Request::post(format!(
                "/api/v1/reviews/{id}/vote?user_id={voter}&is_helpful=true"
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(vote["review_id"].as_str(), Some(id.as_str()));
        assert_eq!(vote["is_helpful"], true);

        let (_, review) = send(
            &app,
            Request::get(format!("/api/v1/reviews/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(review["helpful_votes"], 1);
    }

    #[tokio::test]
    async fn notification_listing_honours_only_unread() {
        let app = router(memory_state().await);
        let user = uuid::Uuid::new_v4();
        let mut ids = Vec::new();
        for title in ["Sale", "Friend request"] {
            let (status, created) = send(
                &app,
                post_json(
                    "/api/v1/notifications",
                    json!({ "user_id": user, "title": title, "message": "hello" }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(created["id"].as_str().unwrap().to_owned());
        }
        let (status, _) = send(
            &app,
            post_json(
                &format!("/api/v1/notifications/{}/read", ids[0]),
                json!({ "is_read": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for query in ["only_unread=true", "unread_only=true"] {
            let (_, listed) = send(
                &app,
                Request::get(format!("/api/v1/notifications/user/{user}?{query}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(listed.as_array().map(Vec::len), Some(1), "{query}");
        }
        let (_, listed) = send(
            &app,
            Request::get(format!("/api/v1/notifications/user/{user}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(listed.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn workshop_moderation_requires_admin_token() {
        let app = router(memory_state().await);
        let id = uuid::Uuid::new_v4();
        let (status, _) = send(
            &app,
            post_json(
                &format!("/api/v1/workshop/items/{id}/moderation"),
                json!({ "action": "approved" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    fn upload_form(token: &str, metadata: Value, file: &[u8]) -> Request<Body> {
        let boundary = "storefront-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"skin.png\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::post("/api/v1/workshop/items/upload")
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn workshop_upload_then_moderator_delete() {
        let state = memory_state().await;
        let tokens = state.tokens();
        let issued = tokens
            .issue(uuid::Uuid::new_v4(), "modder", tokens.ttl())
            .unwrap();
        let app = router(state.clone());

        let (status, item) = send(
            &app,
            upload_form(
                &issued.token,
                json!({ "title": "Neon skin", "description": "glow" }),
                b"\x89PNG",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(item["file_size"], 4);
        assert!(item["file_url"].as_str().unwrap().starts_with("file://"));
        let id = item["id"].as_str().unwrap().to_owned();

        let (status, _) = send(
            &app,
            upload_form(&issued.token, json!({ "title": "" }), b"x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let delete = |admin: Option<&str>| {
            let mut request = Request::delete(format!("/api/v1/workshop/items/{id}"))
                .header("authorization", format!("Bearer {}", issued.token));
            if let Some(token) = admin {
                request = request.header("x-admin-token", token);
            }
            request.body(Body::empty()).unwrap()
        };
        let (status, _) = send(&app, delete(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, delete(Some("admin"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(
            &app,
            Request::get(format!("/api/v1/workshop/items/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let app = router(memory_state().await);
        let (status, _) = send(
            &app,
            post_json(
                "/api/v1/achievements/achievements",
                json!({ "code": "x", "title": "X", "progress_target": 0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
