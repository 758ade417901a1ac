/// Project model and related query types
///
/// A project owns its tasks and a set of collaborators (users). Only admins
/// create, edit or delete projects; collaborators may read the projects they
/// belong to.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('active', 'paused', 'finished');
///
/// CREATE TABLE projects (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     start_date DATE,
///     end_date DATE,
///     status project_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT projects_dates_check CHECK (
///         start_date IS NULL OR end_date IS NULL OR end_date >= start_date
///     )
/// );
///
/// CREATE TABLE project_user (
///     project_id BIGINT NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::TaskView;
use crate::models::user::Member;

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "lowercase")]
pub enum ProjectStatus {
    #[serde(alias = "Activo", alias = "active")]
    Active,

    #[serde(alias = "Pausado", alias = "paused")]
    Paused,

    #[serde(alias = "Terminado", alias = "finished")]
    Finished,
}

impl ProjectStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Finished => "finished",
        }
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

/// Project row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// End date must not precede the start date when both are set
    pub fn has_valid_dates(&self) -> bool {
        dates_are_ordered(self.start_date, self.end_date)
    }
}

/// Returns false only when both dates are set and `end < start`
pub fn dates_are_ordered(start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => end >= start,
        _ => true,
    }
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
}

/// Partial project update
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<ProjectStatus>,
}

impl ProjectChanges {
    /// Applies the set fields to a project
    pub fn apply(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(start_date) = self.start_date {
            project.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            project.end_date = end_date;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
    }
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    /// Substring matched against the project name
    pub search: Option<String>,

    /// Restrict to projects this user collaborates on
    pub member: Option<i64>,
}

impl ProjectQuery {
    /// Lowercased, trimmed search term if one was given
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Listing row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub project: Project,

    pub collaborators_count: i64,
}

/// Single project with its members and the tasks visible to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,

    pub collaborators_count: i64,
    pub collaborators: Vec<Member>,
    pub tasks: Vec<TaskView>,
}

/// Minimal projection used in user detail views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRef {
    pub id: i64,
    pub name: String,
    pub status: ProjectStatus,
}

impl From<&Project> for ProjectRef {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            status: project.status,
        }
    }
}
