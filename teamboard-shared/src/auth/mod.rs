/// Authentication and authorization
///
/// # Modules
///
/// - [`actor`]: the authenticated user passed to every service call
/// - [`authorization`]: pure access policy functions
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: HS256 access tokens with a revocable version claim
///
/// # Example
///
/// ```
/// use teamboard_shared::auth::actor::Actor;
/// use teamboard_shared::auth::authorization::can_mutate_project;
/// use teamboard_shared::models::user::Role;
///
/// assert!(can_mutate_project(&Actor::new(1, Role::Admin)));
/// assert!(!can_mutate_project(&Actor::new(2, Role::Collaborator)));
/// ```

pub mod actor;
pub mod authorization;
pub mod jwt;
pub mod password;
