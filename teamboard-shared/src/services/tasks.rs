/// Task operations
///
/// Admins create, edit and delete tasks. A collaborator sees only the tasks
/// assigned to them and may change just their state and description.
/// Assignees must be collaborators of the task's project when assigned.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::auth::actor::Actor;
use crate::auth::authorization::{
    require_admin, require_assignees_within_collaborators, require_task_access, task_edit_scope,
    TaskEditScope,
};
use crate::error::{ServiceError, ServiceResult};
use crate::models::task::{NewTask, TaskChanges, TaskContext, TaskQuery, TaskView};
use crate::repository::RepositoryState;

#[derive(Clone)]
pub struct TaskService {
    repo: RepositoryState,
}

impl TaskService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Tasks visible to `actor`, newest first
    pub async fn list(&self, actor: &Actor, project_id: Option<i64>) -> ServiceResult<Vec<TaskView>> {
        let query = TaskQuery {
            project_id,
            assignee: (!actor.is_admin()).then_some(actor.id),
        };

        self.repo.list_tasks(&query).await
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> ServiceResult<TaskView> {
        let view = self
            .repo
            .find_task(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;

        let is_assignee = view.assignees.iter().any(|m| m.id == actor.id);
        require_task_access(actor, is_assignee)?;

        Ok(view)
    }

    /// Creates a task in `project_id` assigned to exactly `assignees`
    ///
    /// Every assignee must currently collaborate on the project; otherwise
    /// nothing is written.
    pub async fn create(
        &self,
        actor: &Actor,
        project_id: i64,
        data: NewTask,
        assignees: BTreeSet<i64>,
    ) -> ServiceResult<TaskView> {
        require_admin(actor)?;
        require_some_assignee(&assignees)?;

        let view = self
            .repo
            .create_task(project_id, data, &assignees, &|collaborators: &BTreeSet<i64>| {
                require_assignees_within_collaborators(&assignees, collaborators)
            })
            .await?;

        info!(
            task_id = view.task.id,
            project_id,
            actor_id = actor.id,
            assignees = assignees.len(),
            "Task created"
        );
        Ok(view)
    }

    /// Updates a task within the scope `actor` is allowed to edit
    ///
    /// Admins may change any field and replace the assignee set. Assignees
    /// without admin rights get their change reduced to state and
    /// description; the rest is dropped without error.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        changes: TaskChanges,
        assignees: Option<BTreeSet<i64>>,
    ) -> ServiceResult<TaskView> {
        let actor = *actor;

        let view = if actor.is_admin() {
            if let Some(ids) = &assignees {
                require_some_assignee(ids)?;
            }

            self.repo
                .update_task(id, changes, assignees.as_ref(), &|ctx: &TaskContext| match &assignees {
                    Some(ids) => require_assignees_within_collaborators(ids, &ctx.collaborators),
                    None => Ok(()),
                })
                .await?
        } else {
            let requested = changes.clone();
            let changes = changes.restricted_to_assignee();
            if requested != changes || assignees.is_some() {
                debug!(task_id = id, actor_id = actor.id, "Dropping fields outside assignee scope");
            }

            self.repo
                .update_task(id, changes, None, &move |ctx: &TaskContext| {
                    match task_edit_scope(&actor, ctx.assignees.contains(&actor.id)) {
                        TaskEditScope::Denied => {
                            Err(ServiceError::forbidden("You are not assigned to this task"))
                        }
                        TaskEditScope::Full | TaskEditScope::StateAndDescription => Ok(()),
                    }
                })
                .await?
        };

        info!(task_id = id, actor_id = actor.id, "Task updated");
        Ok(view)
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> ServiceResult<()> {
        require_admin(actor)?;

        self.repo.delete_task(id).await?;

        info!(task_id = id, actor_id = actor.id, "Task deleted");
        Ok(())
    }
}

fn require_some_assignee(assignees: &BTreeSet<i64>) -> ServiceResult<()> {
    if assignees.is_empty() {
        return Err(ServiceError::validation("At least one user must be assigned"));
    }
    Ok(())
}
