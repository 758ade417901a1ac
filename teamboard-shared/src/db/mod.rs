/// Database plumbing
///
/// - `pool`: connection settings, connect and ping
/// - `migrations`: embedded schema and startup preparation
///
/// Queries live in [`crate::repository::postgres`].

pub mod migrations;
pub mod pool;
