/// Project endpoints
///
/// Reading is open to any authenticated user, limited to the projects they
/// collaborate on unless they are an admin. Writing is admin-only.
///
/// - `GET /api/projects?search=` - list
/// - `POST /api/projects` - create
/// - `GET /api/projects/:id` - detail with collaborators and visible tasks
/// - `PUT /api/projects/:id` - partial update
/// - `DELETE /api/projects/:id` - delete with all tasks
/// - `GET /api/projects/:id/collaborators` - collaborator list

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    routes::{double_option, not_blank, MessageResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use teamboard_shared::auth::actor::Actor;
use teamboard_shared::models::membership::id_set;
use teamboard_shared::models::project::{
    NewProject, Project, ProjectChanges, ProjectDetail, ProjectStatus, ProjectSummary,
};
use teamboard_shared::models::user::Member;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    pub search: Option<String>,
}

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub status: Option<ProjectStatus>,

    /// User ids that will collaborate on the project
    #[serde(default, alias = "user_ids")]
    pub collaborators: Vec<i64>,
}

/// Partial update; `null` clears a nullable field, absence leaves it alone
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,

    pub status: Option<ProjectStatus>,

    /// Replaces the collaborator set when present
    #[serde(default, alias = "user_ids")]
    pub collaborators: Option<Vec<i64>>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<ProjectListQuery>,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    Ok(Json(state.projects.list(&actor, query.search).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProjectDetail>> {
    Ok(Json(state.projects.get(&actor, id).await?))
}

pub async fn project_collaborators(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(state.projects.collaborators(&actor, id).await?))
}

/// Create a project
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an admin
/// - `422 Unprocessable Entity`: bad dates, unknown collaborator ids
pub async fn create_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.validate()?;

    let data = NewProject {
        name: req.name.trim().to_string(),
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status.unwrap_or_default(),
    };

    let project = state
        .projects
        .create(&actor, data, id_set(req.collaborators))
        .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    req.validate()?;

    let changes = ProjectChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status,
    };
    let collaborators = req.collaborators.map(id_set);

    Ok(Json(
        state.projects.update(&actor, id, changes, collaborators).await?,
    ))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.projects.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("Project deleted")))
}
