//! Common test utilities for HTTP tests
//!
//! Builds the full router over an in-memory repository, so no database is
//! needed. Users are seeded straight through the repository and tokens are
//! minted with the configured secret.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use teamboard_api::app::{build_router, AppState};
use teamboard_api::config::{
    ApiConfig, AuthConfig, Config, DatabaseConfig, JwtConfig, LogFormat, LoggingConfig,
};
use teamboard_shared::auth::authorization::RoleRequestPolicy;
use teamboard_shared::auth::jwt::{Claims, TokenKeys};
use teamboard_shared::auth::password::hash_password;
use teamboard_shared::models::user::{NewUser, Role, User};
use teamboard_shared::repository::memory::MemoryRepository;
use teamboard_shared::repository::RepositoryState;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn test_config(policy: RoleRequestPolicy) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            ttl_hours: 1,
        },
        auth: AuthConfig {
            role_request_policy: policy,
            bootstrap_admin: None,
        },
        logging: LoggingConfig {
            format: LogFormat::Pretty,
        },
    }
}

/// Test context: router, repository and a seeded admin
pub struct TestContext {
    pub app: Router,
    pub repo: RepositoryState,
    pub admin: User,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_policy(RoleRequestPolicy::Downgrade).await
    }

    pub async fn with_policy(policy: RoleRequestPolicy) -> Self {
        let repo: RepositoryState = Arc::new(MemoryRepository::new());
        let app = build_router(AppState::new(repo.clone(), test_config(policy)));

        let admin = seed(&repo, "Root Admin", "admin@example.com", Role::Admin).await;

        Self { app, repo, admin }
    }

    /// Inserts an active user whose password is [`TEST_PASSWORD`]
    pub async fn seed_user(&self, name: &str, email: &str, role: Role) -> User {
        seed(&self.repo, name, email, role).await
    }

    pub async fn collaborator(&self, name: &str) -> User {
        let email = format!("{}@example.com", name.to_lowercase());
        self.seed_user(name, &email, Role::Collaborator).await
    }

    /// Bearer token valid for the user's current session version
    pub async fn token_for(&self, user: &User) -> String {
        let current = self.repo.find_user(user.id).await.unwrap().unwrap();
        let claims = Claims::new(current.id, current.token_version, chrono::Duration::hours(1));
        TokenKeys::from_secret(TEST_SECRET).sign(&claims).unwrap()
    }

    /// Sends a request and returns the status with the parsed JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Runs a prebuilt request and decodes the JSON body, `Null` if there is none
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

async fn seed(repo: &RepositoryState, name: &str, email: &str, role: Role) -> User {
    repo.create_user(NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(TEST_PASSWORD).unwrap(),
        role,
        active: true,
    })
    .await
    .unwrap()
}
