/// User administration endpoints (admin only)
///
/// - `GET /api/users?role=&active=&search=` - list
/// - `POST /api/users` - create
/// - `GET /api/users/stats` - counters
/// - `GET /api/users/:id` - user with their projects
/// - `PUT /api/users/:id` - edit name, email or password
/// - `DELETE /api/users/:id` - delete
/// - `PUT|PATCH /api/users/:id/role` - change role
/// - `PUT /api/users/:id/toggle-status` - activate or deactivate
/// - `GET|PUT /api/users/:id/projects` - read or replace project memberships
///
/// Nobody may change their own role, deactivate or delete themselves, and
/// the last active admin always stays an active admin.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    routes::{not_blank, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::auth::actor::Actor;
use teamboard_shared::models::membership::id_set;
use teamboard_shared::models::project::ProjectRef;
use teamboard_shared::models::user::{Role, User, UserDetail, UserFilter, UserListing, UserStats};
use teamboard_shared::services::users::{NewAccount, ProfileUpdate};
use validator::Validate;

/// Admin create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
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

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub role: Role,

    #[serde(default)]
    pub active: Option<bool>,
}

/// Profile edit; role and status have their own endpoints
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct AssignProjectsRequest {
    #[serde(default)]
    pub project_ids: Vec<i64>,
}

/// A message together with the affected user
#[derive(Debug, Serialize)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserProjectsResponse {
    pub projects: Vec<ProjectRef>,
}

#[derive(Debug, Serialize)]
pub struct AssignProjectsResponse {
    pub message: String,
    pub assigned_count: usize,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Json<Vec<UserListing>>> {
    Ok(Json(state.users.list(&actor, &filter).await?))
}

pub async fn user_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.users.stats(&actor).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserDetail>> {
    Ok(Json(state.users.get(&actor, id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserMessageResponse>)> {
    req.validate()?;

    let user = state
        .users
        .create(
            &actor,
            NewAccount {
                name: req.name,
                email: req.email,
                password: req.password,
                role: req.role,
                active: req.active.unwrap_or(true),
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserMessageResponse {
            message: "User created".to_string(),
            user,
        }),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let update = ProfileUpdate {
        name: req.name,
        email: req.email,
        password: req.password,
    };

    Ok(Json(state.users.update(&actor, id, update).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.users.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// Change a user's role
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an admin
/// - `422 Unprocessable Entity`: own role, or demoting the last active admin
pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> ApiResult<Json<UserMessageResponse>> {
    let user = state.users.update_role(&actor, id, req.role).await?;

    Ok(Json(UserMessageResponse {
        message: "Role updated".to_string(),
        user,
    }))
}

pub async fn toggle_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserMessageResponse>> {
    let user = state.users.toggle_active(&actor, id).await?;

    let message = if user.active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(Json(UserMessageResponse {
        message: message.to_string(),
        user,
    }))
}

pub async fn user_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserProjectsResponse>> {
    let projects = state.users.projects(&actor, id).await?;
    Ok(Json(UserProjectsResponse { projects }))
}

pub async fn assign_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<AssignProjectsRequest>,
) -> ApiResult<Json<AssignProjectsResponse>> {
    let assigned_count = state
        .users
        .assign_projects(&actor, id, id_set(req.project_ids))
        .await?;

    Ok(Json(AssignProjectsResponse {
        message: "Projects assigned".to_string(),
        assigned_count,
    }))
}
