/// Task endpoints
///
/// - `GET /api/tasks?project_id=` - tasks visible to the caller
/// - `POST /api/tasks` - create, with `project_id` in the body
/// - `POST /api/projects/:id/tasks` - create inside a project
/// - `GET /api/tasks/:id` - detail
/// - `PUT /api/tasks/:id` - update; assignees without admin rights may only
///   change `state` and `description`, other fields are ignored
/// - `DELETE /api/tasks/:id` - delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
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
use teamboard_shared::models::task::{NewTask, TaskChanges, TaskPriority, TaskState, TaskView};
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub project_id: Option<i64>,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Owning project; taken from the path on the nested route
    #[serde(default)]
    pub project_id: Option<i64>,

    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Option<TaskPriority>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub state: Option<TaskState>,

    #[validate(length(min = 1, message = "At least one user must be assigned"))]
    pub assigned_users: Vec<i64>,
}

/// Partial update; `null` clears a nullable field, absence leaves it alone
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,

    pub state: Option<TaskState>,

    /// Replaces the assignee set when present (admins only)
    #[validate(length(min = 1, message = "At least one user must be assigned"))]
    pub assigned_users: Option<Vec<i64>>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<Vec<TaskView>>> {
    Ok(Json(state.tasks.list(&actor, query.project_id).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskView>> {
    Ok(Json(state.tasks.get(&actor, id).await?))
}

/// Create a task from a body that names its project
pub async fn create_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let project_id = req
        .project_id
        .ok_or_else(|| ApiError::field("project_id", "The project is required"))?;

    create(state, actor, project_id, req).await
}

/// Create a task inside the project named by the path
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an admin
/// - `404 Not Found`: project does not exist
/// - `422 Unprocessable Entity`: an assignee is not a project collaborator
pub async fn create_project_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(project_id): Path<i64>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    create(state, actor, project_id, req).await
}

async fn create(
    state: AppState,
    actor: Actor,
    project_id: i64,
    req: CreateTaskRequest,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    req.validate()?;

    let data = NewTask {
        title: req.title.trim().to_string(),
        description: req.description,
        priority: req.priority.unwrap_or_default(),
        due_date: req.due_date,
        state: req.state.unwrap_or_default(),
    };

    let view = state
        .tasks
        .create(&actor, project_id, data, id_set(req.assigned_users))
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    req.validate()?;

    let changes = TaskChanges {
        title: req.title.map(|t| t.trim().to_string()),
        description: req.description,
        priority: req.priority,
        due_date: req.due_date,
        state: req.state,
    };
    let assignees = req.assigned_users.map(id_set);

    Ok(Json(state.tasks.update(&actor, id, changes, assignees).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.tasks.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("Task deleted")))
}
