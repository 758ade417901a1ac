/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with every route and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamboard_api::{app::AppState, config::Config};
/// use teamboard_shared::repository::memory::MemoryRepository;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryRepository::new()), config);
/// let app = teamboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use teamboard_shared::auth::{actor::Actor, jwt};
use teamboard_shared::repository::RepositoryState;
use teamboard_shared::services::{projects::ProjectService, tasks::TaskService, users::UserService};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, Level};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: Arc<Config>,
    pub keys: jwt::TokenKeys,
    pub projects: ProjectService,
    pub tasks: TaskService,
    pub users: UserService,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: Config) -> Self {
        Self {
            projects: ProjectService::new(repo.clone()),
            tasks: TaskService::new(repo.clone()),
            users: UserService::new(repo.clone()),
            keys: jwt::TokenKeys::from_secret(&config.jwt.secret),
            config: Arc::new(config),
            repo,
        }
    }

    /// Signs a token for `user_id` at session `token_version`
    pub fn issue_token(&self, user_id: i64, token_version: i32) -> Result<String, ApiError> {
        let claims = jwt::Claims::new(user_id, token_version, self.config.token_ttl());
        Ok(self.keys.sign(&claims)?)
    }

    /// Resolves a bearer token into the current actor
    async fn authenticate(&self, token: &str) -> Result<Actor, ApiError> {
        let claims = self.keys.verify(token)?;
        let user = self.users.session_user(claims.user_id()?, claims.ver).await?;
        Ok(Actor::from_user(&user))
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// └── /api/
///     ├── POST /login, POST /register (optional auth)
///     ├── POST /logout, GET /me
///     ├── /projects        list, create, show, update, delete,
///     │                    /:id/collaborators, POST /:id/tasks
///     ├── /tasks           list, create, show, update, delete
///     └── /users           list, create, /stats, show, update, delete,
///                          /:id/role, /:id/toggle-status, /:id/projects
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new().route("/login", post(routes::auth::login));

    // Anyone may register; an admin token unlocks admin accounts
    let register_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .layer(from_fn_with_state(state.clone(), optional_auth_layer));

    let protected_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/projects/:id/collaborators",
            get(routes::projects::project_collaborators),
        )
        .route("/projects/:id/tasks", post(routes::tasks::create_project_task))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/users/stats", get(routes::users::user_stats))
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/users/:id/role",
            put(routes::users::update_role).patch(routes::users::update_role),
        )
        .route("/users/:id/toggle-status", put(routes::users::toggle_status))
        .route(
            "/users/:id/projects",
            get(routes::users::user_projects).put(routes::users::assign_projects),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(register_routes)
        .merge(protected_routes);

    // Configure CORS based on environment
    let cors = if state.config.allows_any_origin() {
        // Development mode: permissive CORS
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

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Extracts the bearer token from the `Authorization` header
fn bearer_token(req: &Request) -> Result<Option<&str>, ApiError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Malformed authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, loads the user it names and injects the
/// resulting [`Actor`] into request extensions. Tokens from an older session
/// or for an inactive user are refused.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)?
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let actor = state.authenticate(token).await?;
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Like [`jwt_auth_layer`], but a missing or unusable token is not an error
async fn optional_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&req).ok().flatten().map(str::to_string);

    if let Some(token) = token {
        match state.authenticate(&token).await {
            Ok(actor) => {
                req.extensions_mut().insert(actor);
            }
            Err(e) => debug!("Ignoring unusable token on public route: {}", e),
        }
    }

    next.run(req).await
}
