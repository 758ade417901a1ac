/// Project operations
///
/// Admins see and manage every project. Collaborators see the projects they
/// belong to, and inside those only the tasks assigned to them.

use std::collections::BTreeSet;

use tracing::info;

use crate::auth::actor::Actor;
use crate::auth::authorization::{require_admin, require_project_access};
use crate::error::{ServiceError, ServiceResult};
use crate::models::project::{
    dates_are_ordered, NewProject, Project, ProjectChanges, ProjectDetail, ProjectQuery,
    ProjectSummary,
};
use crate::models::task::TaskQuery;
use crate::models::user::Member;
use crate::repository::RepositoryState;

const DATE_ORDER_MESSAGE: &str = "The end date must be a date after or equal to the start date";

#[derive(Clone)]
pub struct ProjectService {
    repo: RepositoryState,
}

impl ProjectService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Projects visible to `actor`, newest first, optionally filtered by name
    pub async fn list(&self, actor: &Actor, search: Option<String>) -> ServiceResult<Vec<ProjectSummary>> {
        let query = ProjectQuery {
            search,
            member: (!actor.is_admin()).then_some(actor.id),
        };

        self.repo.list_projects(&query).await
    }

    /// One project with its collaborators and the tasks `actor` may see
    pub async fn get(&self, actor: &Actor, id: i64) -> ServiceResult<ProjectDetail> {
        let project = self.load_visible(actor, id).await?;

        let collaborators = self.repo.project_collaborators(id).await?;
        let tasks = self
            .repo
            .list_tasks(&TaskQuery {
                project_id: Some(id),
                assignee: (!actor.is_admin()).then_some(actor.id),
            })
            .await?;

        Ok(ProjectDetail {
            project,
            collaborators_count: collaborators.len() as i64,
            collaborators,
            tasks,
        })
    }

    /// Collaborator list, under the same access rule as [`ProjectService::get`]
    pub async fn collaborators(&self, actor: &Actor, id: i64) -> ServiceResult<Vec<Member>> {
        self.load_visible(actor, id).await?;
        self.repo.project_collaborators(id).await
    }

    /// Creates a project whose collaborators are exactly `collaborators`
    pub async fn create(
        &self,
        actor: &Actor,
        data: NewProject,
        collaborators: BTreeSet<i64>,
    ) -> ServiceResult<Project> {
        require_admin(actor)?;

        if !dates_are_ordered(data.start_date, data.end_date) {
            return Err(ServiceError::validation(DATE_ORDER_MESSAGE));
        }

        let project = self.repo.create_project(data, &collaborators).await?;

        info!(
            project_id = project.id,
            actor_id = actor.id,
            collaborators = collaborators.len(),
            "Project created"
        );
        Ok(project)
    }

    /// Partial update; a collaborator list, when given, replaces the current one
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        changes: ProjectChanges,
        collaborators: Option<BTreeSet<i64>>,
    ) -> ServiceResult<Project> {
        require_admin(actor)?;

        let project = self
            .repo
            .update_project(id, changes, collaborators.as_ref(), &|merged: &Project| {
                if merged.has_valid_dates() {
                    Ok(())
                } else {
                    Err(ServiceError::validation(DATE_ORDER_MESSAGE))
                }
            })
            .await?;

        info!(project_id = id, actor_id = actor.id, "Project updated");
        Ok(project)
    }

    /// Deletes the project together with its tasks and memberships
    pub async fn delete(&self, actor: &Actor, id: i64) -> ServiceResult<()> {
        require_admin(actor)?;

        self.repo.delete_project(id).await?;

        info!(project_id = id, actor_id = actor.id, "Project deleted");
        Ok(())
    }

    /// 404 when missing, 403 when not visible to `actor`
    async fn load_visible(&self, actor: &Actor, id: i64) -> ServiceResult<Project> {
        let project = self
            .repo
            .find_project(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;

        let is_collaborator = if actor.is_admin() {
            false
        } else {
            self.repo.is_collaborator(id, actor.id).await?
        };
        require_project_access(actor, is_collaborator)?;

        Ok(project)
    }
}
