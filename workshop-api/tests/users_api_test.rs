/// HTTP tests for the account lifecycle endpoints
///
/// Runs the full router against an in-memory store.

mod common;

use axum::http::StatusCode;
use common::{TestContext, STRONG_PASSWORD};
use serde_json::json;
use workshop_shared::store::UserStore;

#[tokio::test]
async fn test_user_routes_require_session_and_permission() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.send("GET", "/v1/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx.send("GET", "/v1/users", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let clerk = ctx.seed("carol", "clerk", &["audit:read"]).await;
    let token = common::token_for(&clerk);
    let (status, body) = ctx.send("GET", "/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // granted by slug rather than role
    let manager = ctx.seed("dave", "manager", &["users.admin"]).await;
    let token = common::token_for(&manager);
    let (status, _) = ctx.send("GET", "/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_user() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .as_admin(
            "POST",
            "/v1/users",
            Some(json!({
                "username": "bob",
                "display_name": "Bob",
                "email": " Bob@Shop.Example ",
                "role": "mechanic",
                "password": STRONG_PASSWORD,
                "permissions": ["audit.read", "audit:read", " "]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["email"], "bob@shop.example");
    assert_eq!(body["active"], true);
    assert_eq!(body["force_password_change"], false);
    assert_eq!(body["permissions"], json!(["audit:read"]));
    assert!(body.get("password_hash").is_none());

    let (_, trail) = ctx.as_admin("GET", "/v1/audit", None).await;
    assert_eq!(trail["items"][0]["action"], "CREATE_USER");
    assert_eq!(trail["items"][0]["actor"], "alice");
    assert_eq!(trail["items"][0]["detail"], "role=mechanic, email=bob@shop.example");
}

#[tokio::test]
async fn test_create_rejects_bad_input_and_duplicates() {
    let ctx = TestContext::new().await;
    ctx.seed("bob", "mechanic", &[]).await;

    let base = json!({
        "username": "robert",
        "display_name": "Robert",
        "email": "robert@x.com",
        "role": "mechanic",
        "password": STRONG_PASSWORD
    });

    let mut weak = base.clone();
    weak["password"] = json!("abcdefgh");
    let (status, body) = ctx.as_admin("POST", "/v1/users", Some(weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let mut bad_email = base.clone();
    bad_email["email"] = json!("robert@localhost");
    let (status, _) = ctx.as_admin("POST", "/v1/users", Some(bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut same_email = base.clone();
    same_email["email"] = json!("BOB@x.com");
    let (status, body) = ctx.as_admin("POST", "/v1/users", Some(same_email)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "email already exists");

    let mut same_name = base.clone();
    same_name["username"] = json!("BOB");
    let (status, body) = ctx.as_admin("POST", "/v1/users", Some(same_name)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "username already exists");

    assert_eq!(ctx.store.count_users().await.unwrap(), 2);
}

#[tokio::test]
async fn test_list_filters_and_pages() {
    let ctx = TestContext::new().await;
    for name in ["bob", "bobby", "carol", "dave"] {
        ctx.seed(name, "mechanic", &[]).await;
    }

    let (status, body) = ctx.as_admin("GET", "/v1/users?q=BOB", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = ctx.as_admin("GET", "/v1/users?page=2&pageSize=2", None).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 2);
    assert_eq!(body["page_size"], 2);
    let names: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["bobby", "carol"]);

    let (_, body) = ctx.as_admin("GET", "/v1/users?limit=10&offset=4", None).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = ctx.as_admin("GET", "/v1/users?q=nobody", None).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_get_update_and_not_found() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;

    let (status, body) = ctx.as_admin("GET", &format!("/v1/users/{}", bob.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "bob");

    let (status, body) = ctx.as_admin("GET", "/v1/users/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = ctx
        .as_admin(
            "PUT",
            &format!("/v1/users/{}", bob.id),
            Some(json!({ "display_name": "Robert", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, body) = ctx.as_admin("PUT", &format!("/v1/users/{}", bob.id), Some(json!({}))).await;
    assert_eq!(body["updated"], 0);

    let (status, _) = ctx
        .as_admin("PUT", "/v1/users/9999", Some(json!({ "display_name": "Ghost" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, trail) = ctx.as_admin("GET", "/v1/audit?q=update_user", None).await;
    assert_eq!(trail["total"], 1);
    assert_eq!(trail["items"][0]["detail"], "changed: display_name");
}

#[tokio::test]
async fn test_last_admin_is_protected() {
    let ctx = TestContext::new().await;
    let id = ctx.admin.id;

    let (status, body) = ctx
        .as_admin("PUT", &format!("/v1/users/{}", id), Some(json!({ "role": "clerk" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "must keep at least one active administrator");

    // a second admin makes the demotion legal
    ctx.seed("erin", "Administrator", &[]).await;
    let (status, body) = ctx
        .as_admin("PUT", &format!("/v1/users/{}", id), Some(json!({ "role": "clerk" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);
}

#[tokio::test]
async fn test_status_changes() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;
    let uri = format!("/v1/users/{}/status", bob.id);

    let (status, body) = ctx.as_admin("PATCH", &uri, Some(json!({ "active": "0" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);
    assert!(!ctx.accounts.get(bob.id).await.unwrap().active);

    let (status, _) = ctx.as_admin("PATCH", &uri, Some(json!({ "active": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctx.accounts.get(bob.id).await.unwrap().active);

    let (status, _) = ctx.as_admin("PATCH", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .as_admin(
            "PATCH",
            &format!("/v1/users/{}/status", ctx.admin.id),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "you cannot deactivate your own account");

    let (_, trail) = ctx.as_admin("GET", "/v1/audit?q=update_status", None).await;
    assert_eq!(trail["total"], 2);
    assert_eq!(trail["items"][0]["detail"], "active=true");
    assert_eq!(trail["items"][1]["detail"], "active=false");
}

#[tokio::test]
async fn test_actor_headers_do_not_override_session() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/v1/users/{}", bob.id))
        .header("authorization", format!("Bearer {}", ctx.admin_token))
        .header("x-actor", "mallory")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, trail) = ctx.as_admin("GET", "/v1/audit?q=delete_user", None).await;
    assert_eq!(trail["items"][0]["actor"], "alice");
    assert_eq!(trail["items"][0]["affected_user"], "bob");
}

#[tokio::test]
async fn test_reset_password_then_login() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;
    let uri = format!("/v1/users/{}/reset-password", bob.id);

    let (status, body) = ctx.as_admin("POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let generated = body["password"].as_str().unwrap().to_string();
    assert!(generated.len() >= 12);

    let (status, body) = ctx
        .as_admin("POST", &uri, Some(json!({ "password": "Garage2024" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["password"], "Garage2024!");

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "username": "bob", "password": "Garage2024!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["force_password_change"], true);

    let (status, _) = ctx
        .as_admin("POST", &uri, Some(json!({ "password": "short" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_permissions_replace() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &["audit:write"]).await;
    let uri = format!("/v1/users/{}/permissions", bob.id);

    let (status, _) = ctx
        .as_admin("PUT", &uri, Some(json!({ "permissions": "audit:read" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .as_admin(
            "PUT",
            &uri,
            Some(json!({ "permissions": ["users.admin", " audit:read ", "audit.read", ""] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permissions"], json!(["audit:read", "users:admin"]));

    let stored = ctx.accounts.get(bob.id).await.unwrap();
    assert_eq!(stored.permission_list(), vec!["audit:read", "users:admin"]);

    let (_, trail) = ctx.as_admin("GET", "/v1/audit?q=permissions", None).await;
    assert_eq!(trail["items"][0]["detail"], "audit:read, users:admin");
}

#[tokio::test]
async fn test_delete_guards() {
    let ctx = TestContext::new().await;
    let admin = ctx.seed("admin", "administrator", &[]).await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;

    let (status, body) = ctx.as_admin("DELETE", &format!("/v1/users/{}", admin.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "the admin account cannot be deleted");

    let (status, _) = ctx
        .as_admin("DELETE", &format!("/v1/users/{}", ctx.admin.id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx.as_admin("DELETE", &format!("/v1/users/{}", bob.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);

    let (status, _) = ctx.as_admin("GET", &format!("/v1/users/{}", bob.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issued_token_follows_account_changes() {
    let ctx = TestContext::new().await;
    let carol = ctx.seed("carol", "administrator", &[]).await;
    let dave = ctx.seed("dave", "administrator", &[]).await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;
    let carol_token = common::token_for(&carol);
    let dave_token = common::token_for(&dave);

    // deactivated: the old token no longer authenticates
    let (status, _) = ctx
        .as_admin(
            "PATCH",
            &format!("/v1/users/{}/status", carol.id),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx
        .send("DELETE", &format!("/v1/users/{}", bob.id), Some(&carol_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ctx.accounts.get(bob.id).await.is_ok());

    // demoted: the token still works but carries no admin rights
    let (status, _) = ctx
        .as_admin(
            "PUT",
            &format!("/v1/users/{}", dave.id),
            Some(json!({ "role": "mechanic" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx
        .send("DELETE", &format!("/v1/users/{}", bob.id), Some(&dave_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = ctx
        .send("GET", "/v1/auth/verify", Some(&dave_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "mechanic");

    // deleted: the token is rejected
    let (status, _) = ctx.as_admin("DELETE", &format!("/v1/users/{}", dave.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx
        .send("GET", "/v1/auth/verify", Some(&dave_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_last_access() {
    let ctx = TestContext::new().await;
    let bob = ctx.seed("bob", "mechanic", &[]).await;

    let (status, _) = ctx
        .as_admin("POST", &format!("/v1/users/{}/last-access", bob.id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.accounts.get(bob.id).await.unwrap().last_access_at.is_some());

    let (status, _) = ctx.as_admin("POST", "/v1/users/9999/last-access", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
