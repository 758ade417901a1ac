/// Access policy evaluation
///
/// Pure functions deciding, for a given actor and a few facts about the target
/// resource, whether an operation is allowed. They never touch storage; the
/// caller looks up membership facts (is the actor a collaborator of this
/// project, an assignee of this task) and passes them in.
///
/// # Rules
///
/// | Operation                         | Allowed for                          |
/// |-----------------------------------|--------------------------------------|
/// | view project                      | admin, project collaborator          |
/// | create / edit / delete project    | admin                                |
/// | view task                         | admin, task assignee                 |
/// | edit task (all fields)            | admin                                |
/// | edit task (state, description)    | task assignee                        |
/// | create / delete task              | admin                                |
/// | manage users                      | admin, never on oneself for role,    |
/// |                                   | active flag or deletion              |
///
/// On top of those, the last active admin can never be deleted, demoted or
/// deactivated.
///
/// # Example
///
/// ```
/// use teamboard_shared::auth::actor::Actor;
/// use teamboard_shared::auth::authorization::{can_view_project, task_edit_scope, TaskEditScope};
/// use teamboard_shared::models::user::Role;
///
/// let collaborator = Actor::new(2, Role::Collaborator);
///
/// assert!(can_view_project(&collaborator, true));
/// assert!(!can_view_project(&collaborator, false));
/// assert_eq!(task_edit_scope(&collaborator, true), TaskEditScope::StateAndDescription);
/// ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::actor::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::models::user::{AdminCensus, Role, User};

/// What an actor may change on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEditScope {
    /// Every field, including reassignment
    Full,

    /// Only `state` and `description`; other submitted fields are dropped
    StateAndDescription,

    /// Nothing
    Denied,
}

/// Operations guarded by the last-admin rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Delete,
    Demote,
    Deactivate,
}

/// How to treat a request for the admin role from someone who may not grant it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleRequestPolicy {
    /// Create the account as a collaborator and log a warning
    #[default]
    Downgrade,

    /// Refuse with `Forbidden`
    Reject,
}

impl std::str::FromStr for RoleRequestPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "downgrade" => Ok(RoleRequestPolicy::Downgrade),
            "reject" => Ok(RoleRequestPolicy::Reject),
            other => Err(format!("unknown role request policy '{}'", other)),
        }
    }
}

/// Outcome of resolving a requested role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDecision {
    /// Role the account will actually get
    pub role: Role,

    /// True when admin was requested but collaborator was granted
    pub downgraded: bool,
}

pub fn is_admin(actor: &Actor) -> bool {
    actor.is_admin()
}

pub fn can_view_project(actor: &Actor, is_collaborator: bool) -> bool {
    actor.is_admin() || is_collaborator
}

pub fn can_mutate_project(actor: &Actor) -> bool {
    actor.is_admin()
}

pub fn can_view_task(actor: &Actor, is_assignee: bool) -> bool {
    actor.is_admin() || is_assignee
}

pub fn task_edit_scope(actor: &Actor, is_assignee: bool) -> TaskEditScope {
    if actor.is_admin() {
        TaskEditScope::Full
    } else if is_assignee {
        TaskEditScope::StateAndDescription
    } else {
        TaskEditScope::Denied
    }
}

pub fn can_mutate_task_fully(actor: &Actor) -> bool {
    task_edit_scope(actor, false) == TaskEditScope::Full
}

/// Self role changes are never allowed, admins included
pub fn can_change_own_role(actor: &Actor, target_id: i64) -> bool {
    !actor.is(target_id)
}

pub fn can_delete_self(actor: &Actor, target_id: i64) -> bool {
    !actor.is(target_id)
}

pub fn can_deactivate_self(actor: &Actor, target_id: i64) -> bool {
    !actor.is(target_id)
}

/// Decides which role a newly registered account gets
///
/// Admin is granted only when `acting` is an authenticated admin. Anyone else
/// asking for admin gets collaborator under [`RoleRequestPolicy::Downgrade`],
/// or `Forbidden` under [`RoleRequestPolicy::Reject`].
pub fn resolve_requested_role(
    acting: Option<&Actor>,
    requested: Option<Role>,
    policy: RoleRequestPolicy,
) -> ServiceResult<RoleDecision> {
    match requested {
        Some(Role::Admin) if acting.map(Actor::is_admin).unwrap_or(false) => Ok(RoleDecision {
            role: Role::Admin,
            downgraded: false,
        }),
        Some(Role::Admin) => match policy {
            RoleRequestPolicy::Downgrade => {
                warn!(
                    acting_user = ?acting.map(|a| a.id),
                    "Admin role requested without admin rights; registering as collaborator"
                );
                Ok(RoleDecision {
                    role: Role::Collaborator,
                    downgraded: true,
                })
            }
            RoleRequestPolicy::Reject => Err(ServiceError::forbidden(
                "Only an admin can create admin accounts",
            )),
        },
        _ => Ok(RoleDecision {
            role: Role::Collaborator,
            downgraded: false,
        }),
    }
}

/// True if `action` on `target` would leave the system without an active admin
///
/// Deleting an admin also fails when it is the only admin row of any state,
/// so an inactive admin can always be reactivated later.
pub fn would_violate_last_admin_invariant(
    target: &User,
    census: AdminCensus,
    action: AdminAction,
) -> bool {
    if !target.is_admin() {
        return false;
    }

    let removes_last_active = target.active && census.active_admins <= 1;

    match action {
        AdminAction::Delete => removes_last_active || census.total_admins <= 1,
        AdminAction::Demote | AdminAction::Deactivate => removes_last_active,
    }
}

/// Subset test used for task assignment
pub fn assignees_within_collaborators(
    assignees: &BTreeSet<i64>,
    collaborators: &BTreeSet<i64>,
) -> bool {
    assignees.is_subset(collaborators)
}

pub fn require_admin(actor: &Actor) -> ServiceResult<()> {
    if !actor.is_admin() {
        return Err(ServiceError::forbidden("This action is reserved for admins"));
    }
    Ok(())
}

pub fn require_project_access(actor: &Actor, is_collaborator: bool) -> ServiceResult<()> {
    if !can_view_project(actor, is_collaborator) {
        return Err(ServiceError::forbidden("You do not have access to this project"));
    }
    Ok(())
}

pub fn require_task_access(actor: &Actor, is_assignee: bool) -> ServiceResult<()> {
    if !can_view_task(actor, is_assignee) {
        return Err(ServiceError::forbidden("You do not have access to this task"));
    }
    Ok(())
}

/// Fails with `Validation` when the last-admin rule would be broken
pub fn require_admin_remains(
    target: &User,
    census: AdminCensus,
    action: AdminAction,
) -> ServiceResult<()> {
    if would_violate_last_admin_invariant(target, census, action) {
        let msg = match action {
            AdminAction::Delete => "Cannot delete the last admin",
            AdminAction::Demote => "Cannot remove the admin role from the last admin",
            AdminAction::Deactivate => "Cannot deactivate the last admin",
        };
        return Err(ServiceError::validation(msg));
    }
    Ok(())
}

pub fn require_assignees_within_collaborators(
    assignees: &BTreeSet<i64>,
    collaborators: &BTreeSet<i64>,
) -> ServiceResult<()> {
    if !assignees_within_collaborators(assignees, collaborators) {
        return Err(ServiceError::validation(
            "One or more users are not project collaborators",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    fn collaborator() -> Actor {
        Actor::new(2, Role::Collaborator)
    }

    fn user(id: i64, role: Role, active: bool) -> User {
        User {
            id,
            name: "Someone".to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            role,
            active,
            token_version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn census(active_admins: i64, total_admins: i64) -> AdminCensus {
        AdminCensus {
            active_admins,
            total_admins,
        }
    }

    #[test]
    fn test_project_visibility() {
        assert!(can_view_project(&admin(), false));
        assert!(can_view_project(&collaborator(), true));
        assert!(!can_view_project(&collaborator(), false));
    }

    #[test]
    fn test_project_mutation_is_admin_only() {
        assert!(can_mutate_project(&admin()));
        assert!(!can_mutate_project(&collaborator()));
        assert!(require_admin(&collaborator()).is_err());
    }

    #[test]
    fn test_task_visibility_and_scope() {
        assert!(can_view_task(&admin(), false));
        assert!(can_view_task(&collaborator(), true));
        assert!(!can_view_task(&collaborator(), false));

        assert_eq!(task_edit_scope(&admin(), false), TaskEditScope::Full);
        assert_eq!(
            task_edit_scope(&collaborator(), true),
            TaskEditScope::StateAndDescription
        );
        assert_eq!(task_edit_scope(&collaborator(), false), TaskEditScope::Denied);

        assert!(can_mutate_task_fully(&admin()));
        assert!(!can_mutate_task_fully(&collaborator()));
    }

    #[test]
    fn test_self_actions_forbidden() {
        let actor = admin();
        assert!(!can_change_own_role(&actor, actor.id));
        assert!(!can_delete_self(&actor, actor.id));
        assert!(!can_deactivate_self(&actor, actor.id));

        assert!(can_change_own_role(&actor, 99));
        assert!(can_delete_self(&actor, 99));
        assert!(can_deactivate_self(&actor, 99));
    }

    #[test]
    fn test_resolve_requested_role() {
        let decision =
            resolve_requested_role(Some(&admin()), Some(Role::Admin), RoleRequestPolicy::Downgrade)
                .unwrap();
        assert_eq!(decision.role, Role::Admin);
        assert!(!decision.downgraded);

        let decision =
            resolve_requested_role(None, Some(Role::Admin), RoleRequestPolicy::Downgrade).unwrap();
        assert_eq!(decision.role, Role::Collaborator);
        assert!(decision.downgraded);

        let decision = resolve_requested_role(
            Some(&collaborator()),
            Some(Role::Admin),
            RoleRequestPolicy::Downgrade,
        )
        .unwrap();
        assert!(decision.downgraded);

        let err = resolve_requested_role(None, Some(Role::Admin), RoleRequestPolicy::Reject);
        assert!(matches!(err, Err(ServiceError::Forbidden(_))));

        let decision = resolve_requested_role(None, None, RoleRequestPolicy::Reject).unwrap();
        assert_eq!(decision.role, Role::Collaborator);
        assert!(!decision.downgraded);
    }

    #[test]
    fn test_last_admin_guard() {
        let sole = user(1, Role::Admin, true);

        assert!(would_violate_last_admin_invariant(&sole, census(1, 1), AdminAction::Delete));
        assert!(would_violate_last_admin_invariant(&sole, census(1, 1), AdminAction::Demote));
        assert!(would_violate_last_admin_invariant(&sole, census(1, 1), AdminAction::Deactivate));

        assert!(!would_violate_last_admin_invariant(&sole, census(2, 2), AdminAction::Delete));
        assert!(!would_violate_last_admin_invariant(&sole, census(2, 2), AdminAction::Demote));
    }

    #[test]
    fn test_last_admin_guard_ignores_collaborators() {
        let target = user(3, Role::Collaborator, true);
        assert!(!would_violate_last_admin_invariant(&target, census(1, 1), AdminAction::Delete));
    }

    #[test]
    fn test_last_admin_guard_inactive_admin() {
        // One active admin plus this inactive one: deleting it is fine
        let inactive = user(4, Role::Admin, false);
        assert!(!would_violate_last_admin_invariant(&inactive, census(1, 2), AdminAction::Delete));
        assert!(!would_violate_last_admin_invariant(&inactive, census(1, 2), AdminAction::Demote));

        // Only admin row of any state
        assert!(would_violate_last_admin_invariant(&inactive, census(0, 1), AdminAction::Delete));
    }

    #[test]
    fn test_assignee_subset() {
        let collaborators: BTreeSet<i64> = [1, 2, 3].into_iter().collect();
        let ok: BTreeSet<i64> = [1, 3].into_iter().collect();
        let bad: BTreeSet<i64> = [1, 4].into_iter().collect();

        assert!(assignees_within_collaborators(&ok, &collaborators));
        assert!(!assignees_within_collaborators(&bad, &collaborators));
        assert!(matches!(
            require_assignees_within_collaborators(&bad, &collaborators),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_role_request_policy_from_str() {
        assert_eq!("Reject".parse::<RoleRequestPolicy>(), Ok(RoleRequestPolicy::Reject));
        assert_eq!("downgrade".parse::<RoleRequestPolicy>(), Ok(RoleRequestPolicy::Downgrade));
        assert!("ignore".parse::<RoleRequestPolicy>().is_err());
    }
}
