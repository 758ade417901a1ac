//! Shared fixture for service tests
//!
//! Everything runs against `MemoryRepository`, so no database is needed.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use teamboard_shared::auth::actor::Actor;
use teamboard_shared::models::project::{NewProject, Project, ProjectStatus};
use teamboard_shared::models::task::{NewTask, TaskPriority, TaskState, TaskView};
use teamboard_shared::models::user::{NewUser, Role, User};
use teamboard_shared::repository::memory::MemoryRepository;
use teamboard_shared::repository::RepositoryState;
use teamboard_shared::services::projects::ProjectService;
use teamboard_shared::services::tasks::TaskService;
use teamboard_shared::services::users::UserService;

/// Hash stored for accounts that never log in
pub const UNUSED_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$unused$unused";

pub struct Fixture {
    pub repo: RepositoryState,
    pub users: UserService,
    pub projects: ProjectService,
    pub tasks: TaskService,
    pub admin: Actor,
}

impl Fixture {
    /// Fresh store seeded with a single active admin
    pub async fn new() -> Self {
        let repo: RepositoryState = Arc::new(MemoryRepository::new());

        let admin = repo
            .create_user(NewUser {
                name: "Root Admin".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: UNUSED_HASH.to_string(),
                role: Role::Admin,
                active: true,
            })
            .await
            .expect("seed admin");

        Self {
            users: UserService::new(repo.clone()),
            projects: ProjectService::new(repo.clone()),
            tasks: TaskService::new(repo.clone()),
            admin: Actor::from_user(&admin),
            repo,
        }
    }

    pub async fn user(&self, name: &str, role: Role) -> User {
        self.repo
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: UNUSED_HASH.to_string(),
                role,
                active: true,
            })
            .await
            .expect("seed user")
    }

    pub async fn collaborator(&self, name: &str) -> Actor {
        Actor::from_user(&self.user(name, Role::Collaborator).await)
    }

    pub async fn second_admin(&self, name: &str) -> Actor {
        Actor::from_user(&self.user(name, Role::Admin).await)
    }

    pub async fn project(&self, name: &str, collaborators: &[i64]) -> Project {
        self.projects
            .create(&self.admin, new_project(name), ids(collaborators))
            .await
            .expect("seed project")
    }

    pub async fn task(&self, project_id: i64, title: &str, assignees: &[i64]) -> TaskView {
        self.tasks
            .create(&self.admin, project_id, new_task(title), ids(assignees))
            .await
            .expect("seed task")
    }
}

pub fn ids(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().collect()
}

pub fn new_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        description: None,
        start_date: None,
        end_date: None,
        status: ProjectStatus::Active,
    }
}

pub fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        priority: TaskPriority::Medium,
        due_date: None,
        state: TaskState::Pending,
    }
}
