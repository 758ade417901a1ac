/// Resource services
///
/// Each service takes the acting user explicitly, consults the access policy
/// in [`crate::auth::authorization`], and only then touches the repository.
/// Rules that depend on concurrently changing state are handed to the
/// repository as guards so they are checked inside the write.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamboard_shared::auth::actor::Actor;
/// use teamboard_shared::models::user::Role;
/// use teamboard_shared::repository::memory::MemoryRepository;
/// use teamboard_shared::services::projects::ProjectService;
///
/// # async fn example() -> Result<(), teamboard_shared::error::ServiceError> {
/// let projects = ProjectService::new(Arc::new(MemoryRepository::new()));
/// let collaborator = Actor::new(5, Role::Collaborator);
///
/// // Collaborators only ever see projects they belong to
/// assert!(projects.list(&collaborator, None).await?.is_empty());
/// # Ok(())
/// # }
/// ```

pub mod projects;
pub mod tasks;
pub mod users;
