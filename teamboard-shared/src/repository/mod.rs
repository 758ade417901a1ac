/// Persistence contract
///
/// Services talk to storage only through [`Repository`]. Two implementations
/// exist:
///
/// - [`postgres::PgRepository`]: PostgreSQL via sqlx, one transaction per
///   mutating call
/// - [`memory::MemoryRepository`]: in-process maps behind a `tokio` lock,
///   used by tests and local tooling
///
/// # Guards
///
/// Some rules depend on state that can change between a read and a write
/// (how many admins remain, who collaborates on a project, who is assigned to
/// a task). For those, the service passes a guard closure. The repository
/// loads and locks the relevant rows, calls the guard with what it found, and
/// only writes if the guard returns `Ok`. Guards run inside the same
/// transaction or critical section as the write.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamboard_shared::repository::{memory::MemoryRepository, RepositoryState};
///
/// let repo: RepositoryState = Arc::new(MemoryRepository::new());
/// ```

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceResult;
use crate::models::membership::MembershipDiff;
use crate::models::project::{NewProject, Project, ProjectChanges, ProjectQuery, ProjectRef, ProjectSummary};
use crate::models::task::{NewTask, TaskChanges, TaskContext, TaskQuery, TaskView};
use crate::models::user::{
    AdminCensus, Member, NewUser, User, UserChange, UserFilter, UserListing, UserStats,
};

pub mod memory;
pub mod postgres;

/// Check run against the locked target user and the current admin census
pub type UserGuard<'a> = dyn Fn(&User, AdminCensus) -> ServiceResult<()> + Send + Sync + 'a;

/// Check run against a project after changes have been merged in
pub type ProjectGuard<'a> = dyn Fn(&Project) -> ServiceResult<()> + Send + Sync + 'a;

/// Check run against the owning project's current collaborator ids
pub type CollaboratorGuard<'a> = dyn Fn(&BTreeSet<i64>) -> ServiceResult<()> + Send + Sync + 'a;

/// Check run against the locked task, its assignees and its project's collaborators
pub type TaskGuard<'a> = dyn Fn(&TaskContext) -> ServiceResult<()> + Send + Sync + 'a;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Verifies the backing store is reachable
    async fn ping(&self) -> ServiceResult<()>;

    // --- Users ---

    /// Inserts a user; a duplicate email fails with `Validation`
    async fn create_user(&self, data: NewUser) -> ServiceResult<User>;
    async fn find_user(&self, id: i64) -> ServiceResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>>;

    /// Newest first, each row with its project count
    async fn list_users(&self, filter: &UserFilter) -> ServiceResult<Vec<UserListing>>;

    /// Counters; `recent_users` counts users created at or after `since`
    async fn user_stats(&self, since: DateTime<Utc>) -> ServiceResult<UserStats>;
    async fn admin_census(&self) -> ServiceResult<AdminCensus>;

    /// Applies `change` to user `id` after `guard` accepts the locked row
    async fn update_user(&self, id: i64, change: UserChange, guard: &UserGuard<'_>) -> ServiceResult<User>;

    /// Detaches all memberships and deletes user `id` after `guard` accepts it
    async fn delete_user(&self, id: i64, guard: &UserGuard<'_>) -> ServiceResult<()>;

    /// Increments the token version, revoking previously issued tokens
    async fn bump_token_version(&self, id: i64) -> ServiceResult<User>;

    // --- Membership ---

    async fn is_collaborator(&self, project_id: i64, user_id: i64) -> ServiceResult<bool>;
    async fn project_collaborators(&self, project_id: i64) -> ServiceResult<Vec<Member>>;
    async fn user_projects(&self, user_id: i64) -> ServiceResult<Vec<ProjectRef>>;

    /// Replaces the set of projects user `user_id` collaborates on
    ///
    /// Unknown project ids fail with `Validation` and nothing is written.
    async fn sync_user_projects(
        &self,
        user_id: i64,
        project_ids: &BTreeSet<i64>,
    ) -> ServiceResult<MembershipDiff>;

    // --- Projects ---

    /// Newest first, each row with its collaborator count
    async fn list_projects(&self, query: &ProjectQuery) -> ServiceResult<Vec<ProjectSummary>>;
    async fn find_project(&self, id: i64) -> ServiceResult<Option<Project>>;

    /// Creates the project and its collaborator set in one unit
    async fn create_project(
        &self,
        data: NewProject,
        collaborators: &BTreeSet<i64>,
    ) -> ServiceResult<Project>;

    /// Applies `changes` and, when given, replaces the collaborator set
    async fn update_project(
        &self,
        id: i64,
        changes: ProjectChanges,
        collaborators: Option<&BTreeSet<i64>>,
        guard: &ProjectGuard<'_>,
    ) -> ServiceResult<Project>;

    /// Deletes the project, its tasks and every membership row that hangs off them
    async fn delete_project(&self, id: i64) -> ServiceResult<()>;

    // --- Tasks ---

    /// Newest first, each task with its assignees
    async fn list_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<TaskView>>;
    async fn find_task(&self, id: i64) -> ServiceResult<Option<TaskView>>;

    /// Creates a task in `project_id` assigned to exactly `assignees`
    async fn create_task(
        &self,
        project_id: i64,
        data: NewTask,
        assignees: &BTreeSet<i64>,
        guard: &CollaboratorGuard<'_>,
    ) -> ServiceResult<TaskView>;

    /// Applies `changes` and, when given, replaces the assignee set
    async fn update_task(
        &self,
        id: i64,
        changes: TaskChanges,
        assignees: Option<&BTreeSet<i64>>,
        guard: &TaskGuard<'_>,
    ) -> ServiceResult<TaskView>;

    async fn delete_task(&self, id: i64) -> ServiceResult<()>;
}

/// Shared handle stored in application state
pub type RepositoryState = Arc<dyn Repository>;
