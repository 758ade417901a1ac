/// PostgreSQL repository
///
/// Every mutating call runs in its own transaction. Rows that a guard reasons
/// about are locked with `SELECT ... FOR UPDATE` before the guard runs:
///
/// - user mutations lock all admin rows (in id order) and then the target row
/// - project mutations lock the project row
/// - task mutations lock the task row and the membership rows they read
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamboard_shared::db::{migrations::prepare, pool::PoolSettings};
/// use teamboard_shared::repository::{postgres::PgRepository, RepositoryState};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = prepare(&PoolSettings::new(std::env::var("DATABASE_URL")?)).await?;
///
/// let repo: RepositoryState = Arc::new(PgRepository::new(pool));
/// repo.ping().await?;
/// # Ok(())
/// # }
/// ```

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgExecutor, PgPool};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use super::{CollaboratorGuard, ProjectGuard, Repository, TaskGuard, UserGuard};
use crate::error::{ServiceError, ServiceResult};
use crate::models::membership::MembershipDiff;
use crate::models::project::{
    NewProject, Project, ProjectChanges, ProjectQuery, ProjectRef, ProjectSummary,
};
use crate::models::task::{NewTask, Task, TaskChanges, TaskContext, TaskQuery, TaskView};
use crate::models::user::{
    AdminCensus, Member, NewUser, User, UserChange, UserFilter, UserListing, UserStats,
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, active, token_version, created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, name, description, start_date, end_date, status, created_at, updated_at";

const TASK_COLUMNS: &str =
    "id, project_id, title, description, priority, due_date, state, created_at, updated_at";

/// Join tables holding membership rows
#[derive(Debug, Clone, Copy)]
enum JoinTable {
    /// `project_user`: project collaborators
    ProjectUser,

    /// `task_user`: task assignees
    TaskUser,
}

impl JoinTable {
    fn table(&self) -> &'static str {
        match self {
            JoinTable::ProjectUser => "project_user",
            JoinTable::TaskUser => "task_user",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            JoinTable::ProjectUser => "project_id",
            JoinTable::TaskUser => "task_id",
        }
    }
}

/// Assignee row joined with its task id
#[derive(sqlx::FromRow)]
struct AssigneeRow {
    task_id: i64,

    #[sqlx(flatten)]
    member: Member,
}

/// Repository backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escapes LIKE wildcards and wraps the term for a substring match
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Locks every admin row and counts them
async fn locked_census(conn: &mut PgConnection) -> Result<AdminCensus, sqlx::Error> {
    let admins: Vec<(i64, bool)> =
        sqlx::query_as("SELECT id, active FROM users WHERE role = 'admin' ORDER BY id FOR UPDATE")
            .fetch_all(&mut *conn)
            .await?;

    Ok(AdminCensus {
        active_admins: admins.iter().filter(|(_, active)| *active).count() as i64,
        total_admins: admins.len() as i64,
    })
}

async fn lock_user(conn: &mut PgConnection, id: i64) -> ServiceResult<User> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ServiceError::not_found("User not found"))
}

/// Current member ids of one owner, locking the rows against concurrent removal
async fn locked_members(
    conn: &mut PgConnection,
    table: JoinTable,
    owner_id: i64,
) -> Result<BTreeSet<i64>, sqlx::Error> {
    let ids: Vec<i64> = sqlx::query_scalar(&format!(
        "SELECT user_id FROM {} WHERE {} = $1 ORDER BY user_id FOR UPDATE",
        table.table(),
        table.owner_column()
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids.into_iter().collect())
}

/// Inserts and deletes membership rows of one owner
async fn apply_diff(
    conn: &mut PgConnection,
    table: JoinTable,
    owner_id: i64,
    diff: &MembershipDiff,
) -> Result<(), sqlx::Error> {
    if !diff.to_remove.is_empty() {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND user_id = ANY($2)",
            table.table(),
            table.owner_column()
        ))
        .bind(owner_id)
        .bind(diff.to_remove.iter().copied().collect::<Vec<i64>>())
        .execute(&mut *conn)
        .await?;
    }

    if !diff.to_add.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {} ({}, user_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
            table.table(),
            table.owner_column()
        ))
        .bind(owner_id)
        .bind(diff.to_add.iter().copied().collect::<Vec<i64>>())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Replaces the member set of one owner, returning what changed
async fn replace_members(
    conn: &mut PgConnection,
    table: JoinTable,
    owner_id: i64,
    desired: &BTreeSet<i64>,
) -> ServiceResult<MembershipDiff> {
    ensure_users_exist(conn, desired).await?;

    let current = locked_members(conn, table, owner_id).await?;
    let diff = MembershipDiff::between(&current, desired);
    apply_diff(conn, table, owner_id, &diff).await?;

    debug!(
        table = table.table(),
        owner_id,
        added = diff.to_add.len(),
        removed = diff.to_remove.len(),
        "Membership synced"
    );
    Ok(diff)
}

async fn ensure_users_exist(conn: &mut PgConnection, ids: &BTreeSet<i64>) -> ServiceResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1)")
        .bind(ids.iter().copied().collect::<Vec<i64>>())
        .fetch_all(&mut *conn)
        .await?;
    let found: BTreeSet<i64> = found.into_iter().collect();

    match ids.difference(&found).next() {
        Some(id) => Err(ServiceError::validation(format!("User {} does not exist", id))),
        None => Ok(()),
    }
}

/// Loads assignees for the given tasks and pairs them up
async fn with_assignees<'c, E>(executor: E, tasks: Vec<Task>) -> Result<Vec<TaskView>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let task_ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    let rows: Vec<AssigneeRow> = sqlx::query_as(
        r#"
        SELECT a.task_id, u.id, u.name, u.email, u.role
        FROM task_user a
        JOIN users u ON u.id = a.user_id
        WHERE a.task_id = ANY($1)
        ORDER BY u.id
        "#,
    )
    .bind(task_ids)
    .fetch_all(executor)
    .await?;

    let mut by_task: BTreeMap<i64, Vec<Member>> = BTreeMap::new();
    for row in rows {
        by_task.entry(row.task_id).or_default().push(row.member);
    }

    Ok(tasks
        .into_iter()
        .map(|task| TaskView {
            assignees: by_task.remove(&task.id).unwrap_or_default(),
            task,
        })
        .collect())
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> ServiceResult<()> {
        crate::db::pool::ping(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, active)
            VALUES ($1, LOWER(TRIM($2)), $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(data.name)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .bind(data.active)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id = user.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER(TRIM($1))",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self, filter: &UserFilter) -> ServiceResult<Vec<UserListing>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.role, u.active,
                   u.token_version, u.created_at, u.updated_at,
                   (SELECT COUNT(*) FROM project_user pu WHERE pu.user_id = u.id) AS projects_count
            FROM users u
            WHERE TRUE
            "#,
        );

        if let Some(role) = filter.role {
            builder.push(" AND u.role = ");
            builder.push_bind(role);
        }

        if let Some(active) = filter.active {
            builder.push(" AND u.active = ");
            builder.push_bind(active);
        }

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(term);
            builder.push(" AND (u.name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR u.email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY u.created_at DESC, u.id DESC");

        let users = builder
            .build_query_as::<UserListing>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn user_stats(&self, since: DateTime<Utc>) -> ServiceResult<UserStats> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                COUNT(*) AS total_users,
                COUNT(*) FILTER (WHERE active) AS active_users,
                COUNT(*) FILTER (WHERE role = 'admin') AS admins,
                COUNT(*) FILTER (WHERE role = 'collaborator') AS collaborators,
                COUNT(*) FILTER (WHERE created_at >= $1) AS recent_users
            FROM users
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn admin_census(&self) -> ServiceResult<AdminCensus> {
        let (active_admins, total_admins): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE active), COUNT(*) FROM users WHERE role = 'admin'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminCensus {
            active_admins,
            total_admins,
        })
    }

    async fn update_user(&self, id: i64, change: UserChange, guard: &UserGuard<'_>) -> ServiceResult<User> {
        let mut tx = self.pool.begin().await?;

        let census = locked_census(&mut tx).await?;
        let user = lock_user(&mut tx, id).await?;
        guard(&user, census)?;

        let updated = match change {
            UserChange::SetRole(role) => {
                sqlx::query_as::<_, User>(&format!(
                    "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                ))
                .bind(id)
                .bind(role)
                .fetch_one(&mut *tx)
                .await?
            }
            UserChange::ToggleActive => {
                sqlx::query_as::<_, User>(&format!(
                    "UPDATE users SET active = NOT active, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                ))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
            }
            UserChange::Profile(profile) => {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    UPDATE users
                    SET name = COALESCE($2, name),
                        email = COALESCE(LOWER(TRIM($3)), email),
                        password_hash = COALESCE($4, password_hash),
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ))
                .bind(id)
                .bind(profile.name)
                .bind(profile.email)
                .bind(profile.password_hash)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        debug!(user_id = id, "User updated");
        Ok(updated)
    }

    async fn delete_user(&self, id: i64, guard: &UserGuard<'_>) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let census = locked_census(&mut tx).await?;
        let user = lock_user(&mut tx, id).await?;
        guard(&user, census)?;

        sqlx::query("DELETE FROM task_user WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM project_user WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = id, "User deleted");
        Ok(())
    }

    async fn bump_token_version(&self, id: i64) -> ServiceResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET token_version = token_version + 1 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    async fn is_collaborator(&self, project_id: i64, user_id: i64) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM project_user WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn project_collaborators(&self, project_id: i64) -> ServiceResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT u.id, u.name, u.email, u.role
            FROM users u
            JOIN project_user pu ON pu.user_id = u.id
            WHERE pu.project_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn user_projects(&self, user_id: i64) -> ServiceResult<Vec<ProjectRef>> {
        let projects = sqlx::query_as::<_, ProjectRef>(
            r#"
            SELECT p.id, p.name, p.status
            FROM projects p
            JOIN project_user pu ON pu.project_id = p.id
            WHERE pu.user_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    async fn sync_user_projects(
        &self,
        user_id: i64,
        project_ids: &BTreeSet<i64>,
    ) -> ServiceResult<MembershipDiff> {
        let mut tx = self.pool.begin().await?;

        lock_user(&mut tx, user_id).await?;

        let wanted: Vec<i64> = project_ids.iter().copied().collect();
        let found: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM projects WHERE id = ANY($1) ORDER BY id FOR SHARE")
                .bind(&wanted)
                .fetch_all(&mut *tx)
                .await?;
        let found: BTreeSet<i64> = found.into_iter().collect();
        if let Some(missing) = project_ids.difference(&found).next() {
            return Err(ServiceError::validation(format!("Project {} does not exist", missing)));
        }

        let current: Vec<i64> =
            sqlx::query_scalar("SELECT project_id FROM project_user WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;
        let current: BTreeSet<i64> = current.into_iter().collect();

        let diff = MembershipDiff::between(&current, project_ids);

        if !diff.to_remove.is_empty() {
            sqlx::query("DELETE FROM project_user WHERE user_id = $1 AND project_id = ANY($2)")
                .bind(user_id)
                .bind(diff.to_remove.iter().copied().collect::<Vec<i64>>())
                .execute(&mut *tx)
                .await?;
        }
        if !diff.to_add.is_empty() {
            sqlx::query(
                "INSERT INTO project_user (project_id, user_id) SELECT UNNEST($1::BIGINT[]), $2 ON CONFLICT DO NOTHING",
            )
            .bind(diff.to_add.iter().copied().collect::<Vec<i64>>())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            user_id,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "User projects synced"
        );
        Ok(diff)
    }

    async fn list_projects(&self, query: &ProjectQuery) -> ServiceResult<Vec<ProjectSummary>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT p.id, p.name, p.description, p.start_date, p.end_date, p.status,
                   p.created_at, p.updated_at,
                   (SELECT COUNT(*) FROM project_user pu WHERE pu.project_id = p.id) AS collaborators_count
            FROM projects p
            WHERE TRUE
            "#,
        );

        if let Some(term) = query.search_term() {
            builder.push(" AND p.name ILIKE ");
            builder.push_bind(like_pattern(&term));
        }

        if let Some(user_id) = query.member {
            builder.push(
                " AND EXISTS (SELECT 1 FROM project_user m WHERE m.project_id = p.id AND m.user_id = ",
            );
            builder.push_bind(user_id);
            builder.push(")");
        }

        builder.push(" ORDER BY p.id DESC");

        let projects = builder
            .build_query_as::<ProjectSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok(projects)
    }

    async fn find_project(&self, id: i64) -> ServiceResult<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    async fn create_project(
        &self,
        data: NewProject,
        collaborators: &BTreeSet<i64>,
    ) -> ServiceResult<Project> {
        let mut tx = self.pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (name, description, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.status)
        .fetch_one(&mut *tx)
        .await?;

        replace_members(&mut tx, JoinTable::ProjectUser, project.id, collaborators).await?;

        tx.commit().await?;

        info!(project_id = project.id, collaborators = collaborators.len(), "Project created");
        Ok(project)
    }

    async fn update_project(
        &self,
        id: i64,
        changes: ProjectChanges,
        collaborators: Option<&BTreeSet<i64>>,
        guard: &ProjectGuard<'_>,
    ) -> ServiceResult<Project> {
        let mut tx = self.pool.begin().await?;

        let mut project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1 FOR UPDATE",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project not found"))?;

        changes.apply(&mut project);
        guard(&project)?;

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects
            SET name = $2, description = $3, start_date = $4, end_date = $5,
                status = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(project.name)
        .bind(project.description)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.status)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(ids) = collaborators {
            replace_members(&mut tx, JoinTable::ProjectUser, id, ids).await?;
        }

        tx.commit().await?;

        debug!(project_id = id, "Project updated");
        Ok(project)
    }

    async fn delete_project(&self, id: i64) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(ServiceError::not_found("Project not found"));
        }

        sqlx::query("DELETE FROM task_user WHERE task_id IN (SELECT id FROM tasks WHERE project_id = $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let tasks = sqlx::query("DELETE FROM tasks WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM project_user WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(project_id = id, tasks_deleted = tasks.rows_affected(), "Project deleted");
        Ok(())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> ServiceResult<Vec<TaskView>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT t.id, t.project_id, t.title, t.description, t.priority, t.due_date,
                   t.state, t.created_at, t.updated_at
            FROM tasks t
            WHERE TRUE
            "#,
        );

        if let Some(project_id) = query.project_id {
            builder.push(" AND t.project_id = ");
            builder.push_bind(project_id);
        }

        if let Some(user_id) = query.assignee {
            builder.push(" AND EXISTS (SELECT 1 FROM task_user a WHERE a.task_id = t.id AND a.user_id = ");
            builder.push_bind(user_id);
            builder.push(")");
        }

        builder.push(" ORDER BY t.id DESC");

        let tasks = builder.build_query_as::<Task>().fetch_all(&self.pool).await?;

        Ok(with_assignees(&self.pool, tasks).await?)
    }

    async fn find_task(&self, id: i64) -> ServiceResult<Option<TaskView>> {
        let task = sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match task {
            Some(task) => Ok(with_assignees(&self.pool, vec![task]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_task(
        &self,
        project_id: i64,
        data: NewTask,
        assignees: &BTreeSet<i64>,
        guard: &CollaboratorGuard<'_>,
    ) -> ServiceResult<TaskView> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(ServiceError::not_found("Project not found"));
        }

        let collaborators = locked_members(&mut tx, JoinTable::ProjectUser, project_id).await?;
        guard(&collaborators)?;

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (project_id, title, description, priority, due_date, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.priority)
        .bind(data.due_date)
        .bind(data.state)
        .fetch_one(&mut *tx)
        .await?;

        replace_members(&mut tx, JoinTable::TaskUser, task.id, assignees).await?;

        let task_id = task.id;
        let view = with_assignees(&mut *tx, vec![task])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;

        tx.commit().await?;

        info!(task_id, project_id, assignees = assignees.len(), "Task created");
        Ok(view)
    }

    async fn update_task(
        &self,
        id: i64,
        changes: TaskChanges,
        assignees: Option<&BTreeSet<i64>>,
        guard: &TaskGuard<'_>,
    ) -> ServiceResult<TaskView> {
        let mut tx = self.pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1 FOR UPDATE",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task not found"))?;

        let context = TaskContext {
            assignees: locked_members(&mut tx, JoinTable::TaskUser, id).await?,
            collaborators: locked_members(&mut tx, JoinTable::ProjectUser, task.project_id).await?,
            task,
        };
        guard(&context)?;

        let mut task = context.task;
        changes.apply(&mut task);

        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, priority = $4, due_date = $5,
                state = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(task.title)
        .bind(task.description)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.state)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(ids) = assignees {
            replace_members(&mut tx, JoinTable::TaskUser, id, ids).await?;
        }

        let view = with_assignees(&mut *tx, vec![task])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;

        tx.commit().await?;

        debug!(task_id = id, "Task updated");
        Ok(view)
    }

    async fn delete_task(&self, id: i64) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM task_user WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ServiceError::not_found("Task not found"));
        }

        tx.commit().await?;

        info!(task_id = id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("web"), "%web%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn test_join_table_columns() {
        assert_eq!(JoinTable::ProjectUser.table(), "project_user");
        assert_eq!(JoinTable::ProjectUser.owner_column(), "project_id");
        assert_eq!(JoinTable::TaskUser.table(), "task_user");
        assert_eq!(JoinTable::TaskUser.owner_column(), "task_id");
    }
}
