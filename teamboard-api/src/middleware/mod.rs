/// HTTP middleware
///
/// - `security`: hardening headers added to every response

pub mod security;
