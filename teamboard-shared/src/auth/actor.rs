/// The authenticated user on whose behalf an operation runs
///
/// Every policy check and service call takes the actor explicitly. The HTTP
/// layer builds it from the user row loaded for the request, so the role and
/// active flag are always current.
///
/// # Example
///
/// ```
/// use teamboard_shared::auth::actor::Actor;
/// use teamboard_shared::models::user::Role;
///
/// let actor = Actor::new(7, Role::Admin);
/// assert!(actor.is_admin());
/// assert!(actor.is(7));
/// ```

use serde::{Deserialize, Serialize};

use crate::models::user::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Authenticated user ID
    pub id: i64,

    /// Role at the time the request was authenticated
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    /// Builds the actor for a loaded user
    pub fn from_user(user: &User) -> Self {
        Self::new(user.id, user.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether the actor is the given user
    pub fn is(&self, user_id: i64) -> bool {
        self.id == user_id
    }
}
