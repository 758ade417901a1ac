/// In-memory repository
///
/// All state sits behind a single `tokio::sync::RwLock`. Every mutating call
/// holds the write lock from its first read to its last write, which gives
/// the same all-or-nothing behaviour the PostgreSQL implementation gets from
/// transactions.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CollaboratorGuard, ProjectGuard, Repository, TaskGuard, UserGuard};
use crate::error::{ServiceError, ServiceResult};
use crate::models::membership::MembershipDiff;
use crate::models::project::{
    NewProject, Project, ProjectChanges, ProjectQuery, ProjectRef, ProjectSummary,
};
use crate::models::task::{NewTask, Task, TaskChanges, TaskContext, TaskQuery, TaskView};
use crate::models::user::{
    AdminCensus, Member, NewUser, Role, User, UserChange, UserFilter, UserListing, UserStats,
};

#[derive(Debug, Default)]
struct Store {
    users: BTreeMap<i64, User>,
    projects: BTreeMap<i64, Project>,
    tasks: BTreeMap<i64, Task>,

    /// project id -> collaborator user ids
    collaborators: BTreeMap<i64, BTreeSet<i64>>,

    /// task id -> assignee user ids
    assignees: BTreeMap<i64, BTreeSet<i64>>,

    next_user_id: i64,
    next_project_id: i64,
    next_task_id: i64,
}

impl Store {
    fn census(&self) -> AdminCensus {
        AdminCensus::of(self.users.values())
    }

    fn members(&self, ids: Option<&BTreeSet<i64>>) -> Vec<Member> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.users.get(id))
            .map(Member::from)
            .collect()
    }

    fn collaborators_of(&self, project_id: i64) -> BTreeSet<i64> {
        self.collaborators.get(&project_id).cloned().unwrap_or_default()
    }

    fn task_view(&self, task: &Task) -> TaskView {
        TaskView {
            task: task.clone(),
            assignees: self.members(self.assignees.get(&task.id)),
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn ensure_users_exist(&self, ids: &BTreeSet<i64>) -> ServiceResult<()> {
        match ids.iter().find(|id| !self.users.contains_key(*id)) {
            Some(id) => Err(ServiceError::validation(format!("User {} does not exist", id))),
            None => Ok(()),
        }
    }

    fn ensure_projects_exist(&self, ids: &BTreeSet<i64>) -> ServiceResult<()> {
        match ids.iter().find(|id| !self.projects.contains_key(*id)) {
            Some(id) => Err(ServiceError::validation(format!("Project {} does not exist", id))),
            None => Ok(()),
        }
    }

    fn projects_of(&self, user_id: i64) -> BTreeSet<i64> {
        self.collaborators
            .iter()
            .filter(|(_, members)| members.contains(&user_id))
            .map(|(project_id, _)| *project_id)
            .collect()
    }
}

/// Repository backed by process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> ServiceResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> ServiceResult<User> {
        let mut store = self.store.write().await;

        let email = data.email.trim().to_lowercase();
        if store.email_taken(&email, None) {
            return Err(ServiceError::validation("The email has already been taken"));
        }

        store.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: store.next_user_id,
            name: data.name,
            email,
            password_hash: data.password_hash,
            role: data.role,
            active: data.active,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };

        store.users.insert(user.id, user.clone());
        debug!(user_id = user.id, "User created");
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> ServiceResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let store = self.store.read().await;
        let email = email.trim();
        Ok(store
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> ServiceResult<Vec<UserListing>> {
        let store = self.store.read().await;

        let mut listings: Vec<UserListing> = store
            .users
            .values()
            .filter(|u| filter.matches(u))
            .map(|u| UserListing {
                user: u.clone(),
                projects_count: store.projects_of(u.id).len() as i64,
            })
            .collect();

        listings.sort_by(|a, b| {
            b.user
                .created_at
                .cmp(&a.user.created_at)
                .then(b.user.id.cmp(&a.user.id))
        });
        Ok(listings)
    }

    async fn user_stats(&self, since: DateTime<Utc>) -> ServiceResult<UserStats> {
        let store = self.store.read().await;
        let users = store.users.values();

        Ok(users.fold(UserStats::default(), |mut stats, u| {
            stats.total_users += 1;
            if u.active {
                stats.active_users += 1;
            }
            match u.role {
                Role::Admin => stats.admins += 1,
                Role::Collaborator => stats.collaborators += 1,
            }
            if u.created_at >= since {
                stats.recent_users += 1;
            }
            stats
        }))
    }

    async fn admin_census(&self) -> ServiceResult<AdminCensus> {
        Ok(self.store.read().await.census())
    }

    async fn update_user(&self, id: i64, change: UserChange, guard: &UserGuard<'_>) -> ServiceResult<User> {
        let mut store = self.store.write().await;

        let mut user = store
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        guard(&user, store.census())?;

        if let UserChange::Profile(profile) = &change {
            if let Some(email) = &profile.email {
                if store.email_taken(email.trim(), Some(id)) {
                    return Err(ServiceError::validation("The email has already been taken"));
                }
            }
        }

        change.apply(&mut user);
        user.updated_at = Utc::now();
        store.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: i64, guard: &UserGuard<'_>) -> ServiceResult<()> {
        let mut store = self.store.write().await;

        let user = store
            .users
            .get(&id)
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        guard(user, store.census())?;

        for members in store.collaborators.values_mut() {
            members.remove(&id);
        }
        for members in store.assignees.values_mut() {
            members.remove(&id);
        }
        store.users.remove(&id);
        Ok(())
    }

    async fn bump_token_version(&self, id: i64) -> ServiceResult<User> {
        let mut store = self.store.write().await;

        let user = store
            .users
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        user.token_version += 1;
        Ok(user.clone())
    }

    async fn is_collaborator(&self, project_id: i64, user_id: i64) -> ServiceResult<bool> {
        let store = self.store.read().await;
        Ok(store
            .collaborators
            .get(&project_id)
            .map(|m| m.contains(&user_id))
            .unwrap_or(false))
    }

    async fn project_collaborators(&self, project_id: i64) -> ServiceResult<Vec<Member>> {
        let store = self.store.read().await;
        Ok(store.members(store.collaborators.get(&project_id)))
    }

    async fn user_projects(&self, user_id: i64) -> ServiceResult<Vec<ProjectRef>> {
        let store = self.store.read().await;
        Ok(store
            .projects_of(user_id)
            .iter()
            .filter_map(|id| store.projects.get(id))
            .map(ProjectRef::from)
            .collect())
    }

    async fn sync_user_projects(
        &self,
        user_id: i64,
        project_ids: &BTreeSet<i64>,
    ) -> ServiceResult<MembershipDiff> {
        let mut store = self.store.write().await;

        if !store.users.contains_key(&user_id) {
            return Err(ServiceError::not_found("User not found"));
        }
        store.ensure_projects_exist(project_ids)?;

        let diff = MembershipDiff::between(&store.projects_of(user_id), project_ids);
        for project_id in &diff.to_add {
            store.collaborators.entry(*project_id).or_default().insert(user_id);
        }
        for project_id in &diff.to_remove {
            if let Some(members) = store.collaborators.get_mut(project_id) {
                members.remove(&user_id);
            }
        }
        Ok(diff)
    }

    async fn list_projects(&self, query: &ProjectQuery) -> ServiceResult<Vec<ProjectSummary>> {
        let store = self.store.read().await;
        let term = query.search_term();

        Ok(store
            .projects
            .values()
            .rev()
            .filter(|p| match &term {
                Some(term) => p.name.to_lowercase().contains(term),
                None => true,
            })
            .filter(|p| match query.member {
                Some(user_id) => store
                    .collaborators
                    .get(&p.id)
                    .map(|m| m.contains(&user_id))
                    .unwrap_or(false),
                None => true,
            })
            .map(|p| ProjectSummary {
                project: p.clone(),
                collaborators_count: store.collaborators.get(&p.id).map(|m| m.len()).unwrap_or(0)
                    as i64,
            })
            .collect())
    }

    async fn find_project(&self, id: i64) -> ServiceResult<Option<Project>> {
        Ok(self.store.read().await.projects.get(&id).cloned())
    }

    async fn create_project(
        &self,
        data: NewProject,
        collaborators: &BTreeSet<i64>,
    ) -> ServiceResult<Project> {
        let mut store = self.store.write().await;

        store.ensure_users_exist(collaborators)?;

        store.next_project_id += 1;
        let now = Utc::now();
        let project = Project {
            id: store.next_project_id,
            name: data.name,
            description: data.description,
            start_date: data.start_date,
            end_date: data.end_date,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        if !project.has_valid_dates() {
            return Err(ServiceError::validation(
                "The end date must be a date after or equal to the start date",
            ));
        }

        store.projects.insert(project.id, project.clone());
        store.collaborators.insert(project.id, collaborators.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        id: i64,
        changes: ProjectChanges,
        collaborators: Option<&BTreeSet<i64>>,
        guard: &ProjectGuard<'_>,
    ) -> ServiceResult<Project> {
        let mut store = self.store.write().await;

        let mut project = store
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;

        changes.apply(&mut project);
        guard(&project)?;
        if let Some(ids) = collaborators {
            store.ensure_users_exist(ids)?;
        }

        project.updated_at = Utc::now();
        store.projects.insert(id, project.clone());

        if let Some(ids) = collaborators {
            let members = store.collaborators.entry(id).or_default();
            MembershipDiff::between(members, ids).apply(members);
        }
        Ok(project)
    }

    async fn delete_project(&self, id: i64) -> ServiceResult<()> {
        let mut store = self.store.write().await;

        if store.projects.remove(&id).is_none() {
            return Err(ServiceError::not_found("Project not found"));
        }

        let task_ids: Vec<i64> = store
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            store.tasks.remove(&task_id);
            store.assignees.remove(&task_id);
        }
        store.collaborators.remove(&id);
        Ok(())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<TaskView>> {
        let store = self.store.read().await;

        Ok(store
            .tasks
            .values()
            .rev()
            .filter(|t| query.project_id.map(|p| t.project_id == p).unwrap_or(true))
            .filter(|t| match query.assignee {
                Some(user_id) => store
                    .assignees
                    .get(&t.id)
                    .map(|m| m.contains(&user_id))
                    .unwrap_or(false),
                None => true,
            })
            .map(|t| store.task_view(t))
            .collect())
    }

    async fn find_task(&self, id: i64) -> ServiceResult<Option<TaskView>> {
        let store = self.store.read().await;
        Ok(store.tasks.get(&id).map(|t| store.task_view(t)))
    }

    async fn create_task(
        &self,
        project_id: i64,
        data: NewTask,
        assignees: &BTreeSet<i64>,
        guard: &CollaboratorGuard<'_>,
    ) -> ServiceResult<TaskView> {
        let mut store = self.store.write().await;

        if !store.projects.contains_key(&project_id) {
            return Err(ServiceError::not_found("Project not found"));
        }
        guard(&store.collaborators_of(project_id))?;
        store.ensure_users_exist(assignees)?;

        store.next_task_id += 1;
        let now = Utc::now();
        let task = Task {
            id: store.next_task_id,
            project_id,
            title: data.title,
            description: data.description,
            priority: data.priority,
            due_date: data.due_date,
            state: data.state,
            created_at: now,
            updated_at: now,
        };

        store.tasks.insert(task.id, task.clone());
        store.assignees.insert(task.id, assignees.clone());
        Ok(store.task_view(&task))
    }

    async fn update_task(
        &self,
        id: i64,
        changes: TaskChanges,
        assignees: Option<&BTreeSet<i64>>,
        guard: &TaskGuard<'_>,
    ) -> ServiceResult<TaskView> {
        let mut store = self.store.write().await;

        let task = store
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;

        let context = TaskContext {
            assignees: store.assignees.get(&id).cloned().unwrap_or_default(),
            collaborators: store.collaborators_of(task.project_id),
            task,
        };
        guard(&context)?;
        if let Some(ids) = assignees {
            store.ensure_users_exist(ids)?;
        }

        let mut task = context.task;
        changes.apply(&mut task);
        task.updated_at = Utc::now();
        store.tasks.insert(id, task.clone());

        if let Some(ids) = assignees {
            let members = store.assignees.entry(id).or_default();
            MembershipDiff::between(members, ids).apply(members);
        }
        Ok(store.task_view(&task))
    }

    async fn delete_task(&self, id: i64) -> ServiceResult<()> {
        let mut store = self.store.write().await;

        if store.tasks.remove(&id).is_none() {
            return Err(ServiceError::not_found("Task not found"));
        }
        store.assignees.remove(&id);
        Ok(())
    }
}
