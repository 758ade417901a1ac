/// User model and related query types
///
/// Users are either admins or collaborators. Admins manage everything;
/// collaborators only see the projects they belong to and the tasks they are
/// assigned to.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'collaborator');
///
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL,
///     password_hash TEXT NOT NULL,
///     role user_role NOT NULL DEFAULT 'collaborator',
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     token_version INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use teamboard_shared::models::user::Role;
///
/// let role: Role = serde_json::from_str("\"colaborador\"").unwrap();
/// assert_eq!(role, Role::Collaborator);
/// assert!(!role.is_admin());
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every resource
    Admin,

    /// Access limited to own projects and assigned tasks
    #[serde(alias = "colaborador")]
    Collaborator,
}

impl Role {
    /// Converts role to string for database storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Collaborator => "collaborator",
        }
    }

    /// The single admin predicate everything else goes through
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Collaborator
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
///
/// The password hash and the session epoch never leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,

    /// Argon2id hash in PHC format
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: Role,
    pub active: bool,

    /// Bumped on login and logout; tokens carrying an older value are rejected
    #[serde(skip_serializing, default)]
    pub token_version: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Shorthand for `self.role.is_admin()`
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Input for creating a user
///
/// The email is stored lowercase. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

/// Profile fields an admin may edit directly
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// A single mutation of a user row
///
/// Role and active flag changes go through dedicated variants so the
/// repository can run the last-admin check against the locked row.
#[derive(Debug, Clone)]
pub enum UserChange {
    /// Replace the role
    SetRole(Role),

    /// Flip the active flag
    ToggleActive,

    /// Edit name, email or password
    Profile(ProfileChanges),
}

impl UserChange {
    /// Applies the change to an in-memory copy of the user
    pub fn apply(&self, user: &mut User) {
        match self {
            UserChange::SetRole(role) => user.role = *role,
            UserChange::ToggleActive => user.active = !user.active,
            UserChange::Profile(changes) => {
                if let Some(name) = &changes.name {
                    user.name = name.clone();
                }
                if let Some(email) = &changes.email {
                    user.email = email.to_lowercase();
                }
                if let Some(hash) = &changes.password_hash {
                    user.password_hash = hash.clone();
                }
            }
        }
    }
}

/// Filters for the admin user listing
///
/// Built from query strings, so blank parameters mean "no filter" and
/// `active` accepts `1`/`0` as well as `true`/`false`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    #[serde(default, deserialize_with = "blank_or_role")]
    pub role: Option<Role>,

    #[serde(default, deserialize_with = "blank_or_flag")]
    pub active: Option<bool>,

    /// Substring matched against name and email
    #[serde(default, deserialize_with = "blank_or_string")]
    pub search: Option<String>,
}

fn blank_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn blank_or_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::IntoDeserializer;

    match blank_or_string(deserializer)? {
        Some(value) => {
            let value = value.trim().to_lowercase();
            Role::deserialize(value.as_str().into_deserializer()).map(Some)
        }
        None => Ok(None),
    }
}

fn blank_or_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match blank_or_string(deserializer)?.as_deref().map(str::trim) {
        None => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(other),
            &"one of 1, 0, true, false",
        )),
    }
}

impl UserFilter {
    /// Whether a user passes every set filter
    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(active) = self.active {
            if user.active != active {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                user.name.to_lowercase().contains(&term) || user.email.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// User row enriched with its project membership count
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserListing {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub user: User,

    pub projects_count: i64,
}

/// User with the projects they collaborate on
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,

    pub projects: Vec<crate::models::project::ProjectRef>,
}

/// Public projection used for collaborator and assignee lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for Member {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub admins: i64,
    pub collaborators: i64,

    /// Users created within the reporting window (last 7 days)
    pub recent_users: i64,
}

/// Snapshot of admin accounts used by the last-admin guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminCensus {
    /// Admins whose account is active
    pub active_admins: i64,

    /// Admins regardless of the active flag
    pub total_admins: i64,
}

impl AdminCensus {
    /// Counts admins among the given users
    pub fn of<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        users
            .into_iter()
            .filter(|u| u.is_admin())
            .fold(AdminCensus::default(), |mut census, u| {
                census.total_admins += 1;
                if u.active {
                    census.active_admins += 1;
                }
                census
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: Role, active: bool) -> User {
        User {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            password_hash: "$argon2id$hash".to_string(),
            role,
            active,
            token_version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Collaborator).unwrap(), "\"collaborator\"");

        let legacy: Role = serde_json::from_str("\"colaborador\"").unwrap();
        assert_eq!(legacy, Role::Collaborator);

        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let json = serde_json::to_value(user(1, Role::Admin, true)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("token_version").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn test_user_change_apply() {
        let mut u = user(1, Role::Collaborator, true);

        UserChange::ToggleActive.apply(&mut u);
        assert!(!u.active);

        UserChange::SetRole(Role::Admin).apply(&mut u);
        assert_eq!(u.role, Role::Admin);

        UserChange::Profile(ProfileChanges {
            email: Some("New@Example.com".to_string()),
            ..Default::default()
        })
        .apply(&mut u);
        assert_eq!(u.email, "new@example.com");
        assert_eq!(u.name, "User 1");
    }

    #[test]
    fn test_user_filter() {
        let admin = user(1, Role::Admin, true);
        let inactive = user(2, Role::Collaborator, false);

        let filter = UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(filter.matches(&admin));
        assert!(!filter.matches(&inactive));

        let filter = UserFilter {
            search: Some("USER2@".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&inactive));
        assert!(!filter.matches(&admin));
    }

    #[test]
    fn test_user_filter_from_query_values() {
        let filter: UserFilter =
            serde_json::from_str(r#"{"role":"","active":"1","search":"  "}"#).unwrap();
        assert_eq!(filter.role, None);
        assert_eq!(filter.active, Some(true));
        assert_eq!(filter.search, None);

        let filter: UserFilter =
            serde_json::from_str(r#"{"role":"Colaborador","active":"false"}"#).unwrap();
        assert_eq!(filter.role, Some(Role::Collaborator));
        assert_eq!(filter.active, Some(false));

        let filter: UserFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.role.is_none() && filter.active.is_none());

        assert!(serde_json::from_str::<UserFilter>(r#"{"active":"yes"}"#).is_err());
        assert!(serde_json::from_str::<UserFilter>(r#"{"role":"owner"}"#).is_err());
    }

    #[test]
    fn test_admin_census() {
        let users = vec![
            user(1, Role::Admin, true),
            user(2, Role::Admin, false),
            user(3, Role::Collaborator, true),
        ];

        let census = AdminCensus::of(&users);
        assert_eq!(census.total_admins, 2);
        assert_eq!(census.active_admins, 1);
    }
}
