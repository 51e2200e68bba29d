#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use officesync::create_app;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // keeps the database file alive for the test
    _dir: Option<TempDir>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: Some(dir) })
}

impl TestApp {
    /// Another router over the same database; `base` must outlive it.
    pub fn from_router(app: Router, base: &TestApp) -> TestApp {
        TestApp {
            app,
            pool: base.pool.clone(),
            _dir: None,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Result<TestResponse> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        self.send(req.body(Body::empty())?).await
    }

    /// Posts an urlencoded form, the way the page forms submit.
    pub async fn post_form(&self, uri: &str, token: Option<&str>, form: &str) -> Result<TestResponse> {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        self.send(req.body(Body::from(form.to_string()))?).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Result<TestResponse> {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(req).await
    }

    /// Registers `username` and returns `(token, user_id)`. No consents given yet.
    pub async fn register(&self, username: &str) -> Result<(String, Uuid)> {
        let resp = self
            .post_json(
                "/auth/register",
                json!({
                    "username": username,
                    "first_name": username,
                    "email": format!("{}@example.com", username),
                    "password": "password123"
                }),
            )
            .await?;
        if resp.status != StatusCode::CREATED {
            panic!("register failed: {} - {}", resp.status, resp.body);
        }
        let token = resp.body["token"].as_str().context("missing token")?.to_string();
        let user_id = resp.body["user"]["id"].as_str().context("missing user id")?.parse()?;
        Ok((token, user_id))
    }

    /// Registers `username` and gives all three consents.
    pub async fn member(&self, username: &str) -> Result<(String, Uuid)> {
        let (token, user_id) = self.register(username).await?;
        for kind in ["privacy", "terms", "copyright"] {
            let resp = self.post_form(&format!("/{}/accept", kind), Some(&token), "").await?;
            assert_eq!(resp.status, StatusCode::SEE_OTHER, "accepting {} failed: {}", kind, resp.body);
        }
        Ok((token, user_id))
    }

    /// Puts the user into a fresh role holding exactly `permissions`.
    pub async fn grant(&self, user_id: Uuid, role: &str, permissions: &[&str]) -> Result<Uuid> {
        let role_id = Uuid::new_v4();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO roles (id, name, color, created_at, updated_at) VALUES (?, ?, '#123456', ?, ?)")
            .bind(role_id.to_string())
            .bind(role)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        for permission in permissions {
            let inserted = sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions WHERE name = ?",
            )
            .bind(role_id.to_string())
            .bind(permission)
            .execute(&self.pool)
            .await?
            .rows_affected();
            assert_eq!(inserted, 1, "unknown permission {}", permission);
        }
        sqlx::query("UPDATE profiles SET role_id = ? WHERE user_id = ?")
            .bind(role_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(role_id)
    }

    pub async fn log_count(&self, category: &str) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM log_entries WHERE category = ?")
            .bind(category)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn announce(&self, title: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO announcements (id, title, body, author_id, created_at) VALUES (?, ?, '', NULL, ?)")
            .bind(id.to_string())
            .bind(title)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }
}
