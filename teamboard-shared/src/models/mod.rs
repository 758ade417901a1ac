/// Domain models for Teamboard
///
/// Plain data types shared by the services and the repositories.
///
/// # Models
///
/// - `user`: accounts, roles and user listings
/// - `project`: projects and their listing/detail projections
/// - `task`: tasks, priorities, states and assignee views
/// - `membership`: set diffs for collaborator and assignee syncs

pub mod membership;
pub mod project;
pub mod task;
pub mod user;
