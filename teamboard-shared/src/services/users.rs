/// User accounts, sessions and project assignment
///
/// Registration is public. Everything else that touches another account is
/// admin-only, with two extra rules:
///
/// - nobody may change their own role, deactivate themselves or delete
///   themselves; these are refused as invalid input before the admin check,
///   so the answer is the same whatever the caller's role
/// - the last active admin can never be demoted, deactivated or deleted

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::auth::actor::Actor;
use crate::auth::authorization::{
    can_change_own_role, can_deactivate_self, can_delete_self, require_admin,
    require_admin_remains, resolve_requested_role, AdminAction, RoleDecision, RoleRequestPolicy,
};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ServiceError, ServiceResult};
use crate::models::project::ProjectRef;
use crate::models::user::{
    AdminCensus, NewUser, ProfileChanges, Role, User, UserChange, UserDetail, UserFilter,
    UserListing, UserStats,
};
use crate::repository::RepositoryState;

/// Window used for the `recent_users` counter
const RECENT_USERS_DAYS: i64 = 7;

/// Public sign-up input
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,

    /// Requested role; only an admin caller can obtain `Admin`
    pub role: Option<Role>,
}

/// Admin-created account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub active: bool,
}

/// Admin edit of name, email or password
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Account created at startup when no admin exists yet
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
}

impl UserService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Registers an account; see [`resolve_requested_role`] for the role rule
    pub async fn register(
        &self,
        acting: Option<&Actor>,
        data: Registration,
        policy: RoleRequestPolicy,
    ) -> ServiceResult<(User, RoleDecision)> {
        let decision = resolve_requested_role(acting, data.role, policy)?;

        let user = self
            .repo
            .create_user(NewUser {
                name: data.name.trim().to_string(),
                email: normalize_email(&data.email),
                password_hash: hash_password(&data.password)?,
                role: decision.role,
                active: true,
            })
            .await?;

        info!(
            user_id = user.id,
            role = user.role.as_str(),
            downgraded = decision.downgraded,
            "User registered"
        );
        Ok((user, decision))
    }

    /// Checks credentials and starts a new session
    ///
    /// Starting a session bumps the token version, so tokens from earlier
    /// logins stop working. The returned user carries the new version.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<User> {
        let invalid = || ServiceError::Unauthenticated("Invalid credentials".to_string());

        let user = self
            .repo
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(invalid());
        }

        if !user.active {
            return Err(ServiceError::forbidden("This account has been deactivated"));
        }

        let user = self.repo.bump_token_version(user.id).await?;
        info!(user_id = user.id, "User logged in");
        Ok(user)
    }

    /// Ends every session of `actor`
    pub async fn logout(&self, actor: &Actor) -> ServiceResult<()> {
        self.repo.bump_token_version(actor.id).await?;
        info!(user_id = actor.id, "User logged out");
        Ok(())
    }

    /// Resolves a token's subject into a current user
    ///
    /// Unknown and inactive users are refused, as are tokens issued before
    /// the user's latest login or logout.
    pub async fn session_user(&self, user_id: i64, token_version: i32) -> ServiceResult<User> {
        let user = self
            .repo
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("Unknown user".to_string()))?;

        if user.token_version != token_version {
            return Err(ServiceError::Unauthenticated("Token has been revoked".to_string()));
        }
        if !user.active {
            return Err(ServiceError::Unauthenticated(
                "This account has been deactivated".to_string(),
            ));
        }

        Ok(user)
    }

    /// The actor's own account
    pub async fn me(&self, actor: &Actor) -> ServiceResult<User> {
        self.repo
            .find_user(actor.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn list(&self, actor: &Actor, filter: &UserFilter) -> ServiceResult<Vec<UserListing>> {
        require_admin(actor)?;
        self.repo.list_users(filter).await
    }

    /// User with the projects they collaborate on
    pub async fn get(&self, actor: &Actor, id: i64) -> ServiceResult<UserDetail> {
        require_admin(actor)?;

        let user = self.find(id).await?;
        let projects = self.repo.user_projects(id).await?;

        Ok(UserDetail { user, projects })
    }

    pub async fn create(&self, actor: &Actor, data: NewAccount) -> ServiceResult<User> {
        require_admin(actor)?;

        let user = self
            .repo
            .create_user(NewUser {
                name: data.name.trim().to_string(),
                email: normalize_email(&data.email),
                password_hash: hash_password(&data.password)?,
                role: data.role,
                active: data.active,
            })
            .await?;

        info!(user_id = user.id, actor_id = actor.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Edits name, email or password
    pub async fn update(&self, actor: &Actor, id: i64, data: ProfileUpdate) -> ServiceResult<User> {
        require_admin(actor)?;

        let password_hash = match data.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        let change = UserChange::Profile(ProfileChanges {
            name: data.name.map(|n| n.trim().to_string()),
            email: data.email.as_deref().map(normalize_email),
            password_hash,
        });

        let user = self
            .repo
            .update_user(id, change, &|_: &User, _: AdminCensus| -> ServiceResult<()> { Ok(()) })
            .await?;

        info!(user_id = id, actor_id = actor.id, "User profile updated");
        Ok(user)
    }

    /// Flips the target's active flag
    pub async fn toggle_active(&self, actor: &Actor, target: i64) -> ServiceResult<User> {
        if !can_deactivate_self(actor, target) {
            return Err(ServiceError::validation("You cannot deactivate yourself"));
        }
        require_admin(actor)?;

        let user = self
            .repo
            .update_user(target, UserChange::ToggleActive, &|user: &User, census: AdminCensus| {
                if user.active {
                    require_admin_remains(user, census, AdminAction::Deactivate)
                } else {
                    Ok(())
                }
            })
            .await?;

        info!(user_id = target, actor_id = actor.id, active = user.active, "User status toggled");
        Ok(user)
    }

    pub async fn update_role(&self, actor: &Actor, target: i64, role: Role) -> ServiceResult<User> {
        if !can_change_own_role(actor, target) {
            return Err(ServiceError::validation("You cannot change your own role"));
        }
        require_admin(actor)?;

        let user = self
            .repo
            .update_user(target, UserChange::SetRole(role), &|user: &User, census: AdminCensus| {
                if role.is_admin() {
                    Ok(())
                } else {
                    require_admin_remains(user, census, AdminAction::Demote)
                }
            })
            .await?;

        info!(user_id = target, actor_id = actor.id, role = role.as_str(), "User role updated");
        Ok(user)
    }

    /// Deletes the target after detaching all of its memberships
    pub async fn delete(&self, actor: &Actor, target: i64) -> ServiceResult<()> {
        if !can_delete_self(actor, target) {
            return Err(ServiceError::validation("You cannot delete yourself"));
        }
        require_admin(actor)?;

        self.repo
            .delete_user(target, &|user: &User, census: AdminCensus| {
                require_admin_remains(user, census, AdminAction::Delete)
            })
            .await?;

        info!(user_id = target, actor_id = actor.id, "User deleted");
        Ok(())
    }

    pub async fn projects(&self, actor: &Actor, target: i64) -> ServiceResult<Vec<ProjectRef>> {
        require_admin(actor)?;

        self.find(target).await?;
        self.repo.user_projects(target).await
    }

    /// Replaces the target's project memberships; returns how many it now has
    pub async fn assign_projects(
        &self,
        actor: &Actor,
        target: i64,
        project_ids: BTreeSet<i64>,
    ) -> ServiceResult<usize> {
        require_admin(actor)?;

        let diff = self.repo.sync_user_projects(target, &project_ids).await?;

        info!(
            user_id = target,
            actor_id = actor.id,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            "User projects assigned"
        );
        Ok(project_ids.len())
    }

    pub async fn stats(&self, actor: &Actor) -> ServiceResult<UserStats> {
        require_admin(actor)?;
        self.repo
            .user_stats(Utc::now() - Duration::days(RECENT_USERS_DAYS))
            .await
    }

    /// Makes sure at least one admin exists, creating or promoting `seed`
    ///
    /// Returns the account that was created or promoted, or `None` when an
    /// admin already existed.
    pub async fn ensure_bootstrap_admin(&self, seed: &BootstrapAdmin) -> ServiceResult<Option<User>> {
        let census = self.repo.admin_census().await?;
        if census.total_admins > 0 {
            return Ok(None);
        }

        let user = match self.repo.find_user_by_email(&normalize_email(&seed.email)).await? {
            Some(existing) => {
                let allow = |_: &User, _: AdminCensus| -> ServiceResult<()> { Ok(()) };
                let mut user = self
                    .repo
                    .update_user(existing.id, UserChange::SetRole(Role::Admin), &allow)
                    .await?;
                if !user.active {
                    user = self
                        .repo
                        .update_user(existing.id, UserChange::ToggleActive, &allow)
                        .await?;
                }
                user
            }
            None => {
                self.repo
                    .create_user(NewUser {
                        name: seed.name.clone(),
                        email: normalize_email(&seed.email),
                        password_hash: hash_password(&seed.password)?,
                        role: Role::Admin,
                        active: true,
                    })
                    .await?
            }
        };

        info!(user_id = user.id, email = %user.email, "Bootstrap admin ready");
        Ok(Some(user))
    }

    async fn find(&self, id: i64) -> ServiceResult<User> {
        self.repo
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
