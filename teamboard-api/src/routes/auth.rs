/// Authentication endpoints
///
/// - `POST /api/login` - exchange credentials for a token
/// - `POST /api/register` - create an account (an admin token may request `role: "admin"`)
/// - `POST /api/logout` - revoke every token of the caller
/// - `GET /api/me` - the caller's account
///
/// Tokens carry the user's session version. Logging in or out bumps it, so
/// only the most recently issued token stays valid.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::ApiJson,
    routes::{not_blank, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use teamboard_shared::auth::actor::Actor;
use teamboard_shared::models::user::{Role, User};
use teamboard_shared::services::users::Registration;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Password confirmation does not match"))]
    pub password_confirmation: String,

    /// Requested role; granted as admin only to an authenticated admin
    #[serde(default)]
    pub role: Option<Role>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token plus the account it belongs to
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub user: User,

    /// True when admin was requested but the account was created as collaborator
    pub role_downgraded: bool,
}

/// Register a new user
///
/// ```text
/// POST /api/register
/// {
///   "name": "Ana",
///   "email": "ana@example.com",
///   "password": "********",
///   "password_confirmation": "********",
///   "role": "collaborator"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: admin requested without admin rights under the `reject` policy
/// - `422 Unprocessable Entity`: validation failed or email already taken
pub async fn register(
    State(state): State<AppState>,
    acting: Option<Extension<Actor>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;

    let acting = acting.map(|Extension(actor)| actor);
    let (user, decision) = state
        .users
        .register(
            acting.as_ref(),
            Registration {
                name: req.name,
                email: req.email,
                password: req.password,
                role: req.role,
            },
            state.config.auth.role_request_policy,
        )
        .await?;

    let token = state.issue_token(user.id, user.token_version)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token,
            user,
            role_downgraded: decision.downgraded,
        }),
    ))
}

/// Login endpoint
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Account deactivated
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let user = state.users.login(&req.email, &req.password).await?;
    let token = state.issue_token(user.id, user.token_version)?;

    Ok(Json(SessionResponse { token, user }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<MessageResponse>> {
    state.users.logout(&actor).await?;

    Ok(Json(MessageResponse::new("Logged out")))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.me(&actor).await?))
}
