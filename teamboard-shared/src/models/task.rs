/// Task model and related query types
///
/// Every task belongs to exactly one project and has a set of assignees that
/// must be collaborators of that project at the moment they are assigned.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_priority AS ENUM ('high', 'medium', 'low');
/// CREATE TYPE task_state AS ENUM ('pending', 'in_progress', 'done');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     project_id BIGINT NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date DATE,
///     state task_state NOT NULL DEFAULT 'pending',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE task_user (
///     task_id BIGINT NOT NULL REFERENCES tasks (id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```
/// use teamboard_shared::models::task::{TaskChanges, TaskPriority, TaskState};
///
/// let changes = TaskChanges {
///     state: Some(TaskState::Done),
///     priority: Some(TaskPriority::High),
///     ..Default::default()
/// };
///
/// // Assignees without admin rights may only touch state and description
/// let limited = changes.restricted_to_assignee();
/// assert_eq!(limited.state, Some(TaskState::Done));
/// assert!(limited.priority.is_none());
/// ```

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Member;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
pub enum TaskPriority {
    #[serde(alias = "Alta", alias = "high")]
    High,

    #[serde(alias = "Media", alias = "medium")]
    Medium,

    #[serde(alias = "Baja", alias = "low")]
    Low,
}

impl TaskPriority {
    /// Converts priority to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Task progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_state", rename_all = "snake_case")]
pub enum TaskState {
    #[serde(alias = "Pendiente", alias = "pending")]
    Pending,

    #[serde(alias = "En progreso", alias = "in_progress")]
    InProgress,

    #[serde(alias = "Hecha", alias = "done")]
    Done,
}

impl TaskState {
    /// Converts state to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::InProgress => "in_progress",
            TaskState::Done => "done",
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Pending
    }
}

/// Task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub state: TaskState,
}

/// Partial task update
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub state: Option<TaskState>,
}

impl TaskChanges {
    /// Drops every field a non-admin assignee is not allowed to edit
    pub fn restricted_to_assignee(self) -> Self {
        Self {
            description: self.description,
            state: self.state,
            ..Default::default()
        }
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == TaskChanges::default()
    }

    /// Applies the set fields to a task
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(state) = self.state {
            task.state = state;
        }
    }
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub project_id: Option<i64>,

    /// Restrict to tasks assigned to this user
    pub assignee: Option<i64>,
}

/// Task with its assignees
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,

    pub assignees: Vec<Member>,
}

/// Locked state handed to task update checks
///
/// Built inside the same transaction as the write, so membership facts
/// cannot change between the check and the update.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task: Task,

    /// Current assignee ids
    pub assignees: BTreeSet<i64>,

    /// Collaborator ids of the owning project
    pub collaborators: BTreeSet<i64>,
}
