//! Common test utilities for HTTP tests
//!
//! Builds the full router over a fresh `MemoryStore`, seeds an active
//! administrator, and mints session tokens for seeded users.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use workshop_api::app::{build_router, AppState};
use workshop_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, StoreBackend};
use workshop_shared::accounts::{AccountService, NewAccount};
use workshop_shared::auth::identity::ActingIdentity;
use workshop_shared::auth::jwt::{create_token, Claims};
use workshop_shared::models::user::User;
use workshop_shared::store::MemoryStore;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Password that satisfies the strength policy
pub const STRONG_PASSWORD: &str = "Abcdef1!";

/// Test context containing the router and the store behind it
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub accounts: AccountService,
    pub app: Router,
    pub config: Config,

    /// Active administrator `alice`
    pub admin: User,
    pub admin_token: String,
}

impl TestContext {
    pub async fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), store.clone(), config.clone());
        let accounts = state.accounts.clone();
        let app = build_router(state);

        let admin = accounts
            .create(&ActingIdentity::system(), account("alice", "administrator", &[]))
            .await
            .expect("failed to seed administrator");
        let admin_token = token_for(&admin);

        Self {
            store,
            accounts,
            app,
            config,
            admin,
            admin_token,
        }
    }

    /// Creates an account as `system`
    pub async fn seed(&self, username: &str, role: &str, permissions: &[&str]) -> User {
        self.accounts
            .create(&ActingIdentity::system(), account(username, role, permissions))
            .await
            .unwrap_or_else(|e| panic!("failed to seed {}: {}", username, e))
    }

    /// Sends a request and returns the status with the parsed JSON body
    ///
    /// An empty body parses as `Value::Null`.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    /// Sends a request as the seeded administrator
    pub async fn as_admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.admin_token), body).await
    }
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        store: StoreBackend::Memory,
        database: DatabaseConfig {
            url: None,
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            ttl_hours: 1,
        },
        bootstrap_admin_password: None,
    }
}

pub fn account(username: &str, role: &str, permissions: &[&str]) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        display_name: format!("{} display", username),
        email: format!("{}@x.com", username.to_lowercase()),
        role: role.to_string(),
        password: STRONG_PASSWORD.to_string(),
        permissions: Some(permissions.iter().map(|p| p.to_string()).collect()),
        ..Default::default()
    }
}

/// Session token carrying the user's current role and permissions
pub fn token_for(user: &User) -> String {
    let claims = Claims::new(user.id, user.username.clone(), user.role.clone(), user.permission_list());
    create_token(&claims, TEST_SECRET).expect("token creation should succeed")
}
