/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use workshop_api::{app::AppState, config::Config};
/// use workshop_shared::store::MemoryStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = Arc::new(MemoryStore::new());
/// let state = AppState::new(store.clone(), store, config);
/// let app = workshop_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, session::Session};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};
use uuid::Uuid;
use workshop_shared::accounts::AccountService;
use workshop_shared::error::AccountError;
use workshop_shared::auth::jwt;
use workshop_shared::store::{AuditStore, UserStore};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Account lifecycle and audit operations
    pub accounts: AccountService,

    /// Direct store handle for the health check
    pub users: Arc<dyn UserStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, audit: Arc<dyn AuditStore>, config: Config) -> Self {
        Self {
            accounts: AccountService::new(users.clone(), audit),
            users,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                         # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /login             # public
///     │   └── GET  /verify
///     ├── /users/                     # users:admin
///     │   ├── GET    /
///     │   ├── POST   /
///     │   ├── GET    /:id
///     │   ├── PUT    /:id
///     │   ├── DELETE /:id
///     │   ├── PATCH  /:id/status
///     │   ├── POST   /:id/reset-password
///     │   ├── PUT    /:id/permissions
///     │   └── POST   /:id/last-access
///     └── /audit/
///         ├── GET  /                  # audit:read or users:admin
///         └── POST /                  # audit:write
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer, one span per request)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (everything under `/v1` except login)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let session_routes = Router::new()
        .route("/auth/verify", get(routes::auth::verify))
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/users/:id/status",
            patch(routes::users::set_status),
        )
        .route(
            "/users/:id/reset-password",
            post(routes::users::reset_password),
        )
        .route(
            "/users/:id/permissions",
            put(routes::users::update_permissions),
        )
        .route(
            "/users/:id/last-access",
            post(routes::users::mark_last_access),
        )
        .route(
            "/audit",
            get(routes::audit::list_entries).post(routes::audit::record_entry),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .merge(session_routes);

    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    tracing::info_span!(
                        "request",
                        request_id = %Uuid::new_v4(),
                        method = %req.method(),
                        uri = %req.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Extracts and validates the Bearer token, reloads the account it names,
/// then injects the [`Session`] into request extensions. A token for a
/// deleted or deactivated account is rejected; role and permissions come
/// from the store, not the token.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token.trim(), state.jwt_secret())?;

    let user = state
        .users
        .find_user(claims.sub)
        .await
        .map_err(AccountError::from)?
        .filter(|user| user.active)
        .ok_or_else(|| {
            warn!(user_id = claims.sub, "token for missing or inactive account");
            ApiError::Unauthorized("Account is not active".to_string())
        })?;

    req.extensions_mut().insert(Session::for_user(&user, &claims));

    Ok(next.run(req).await)
}
