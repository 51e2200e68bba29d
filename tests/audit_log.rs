mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{spawn_app, TestApp};

async fn auditor(app: &TestApp) -> Result<String> {
    let (token, user_id) = app.member("auditor").await?;
    app.grant(
        user_id,
        "Auditors",
        &["system.access", "system.logs.access", "system.roles.create", "system.config.app"],
    )
    .await?;
    Ok(token)
}

#[tokio::test]
async fn chain_verifies_after_a_mix_of_changes() -> Result<()> {
    let app = spawn_app().await?;
    let token = auditor(&app).await?;

    app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;
    app.post_form(
        "/app/rename/40000000-0000-4000-8000-000000000001",
        Some(&token),
        "app=Depot+Desk",
    )
    .await?;

    let resp = app.get("/logs/verify", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["valid"], true);
    // three consents, a role and the rename
    assert_eq!(resp.body["data"]["entries"], 5);

    let home = app.get("/", Some(&token)).await?;
    assert_eq!(home.body["app"]["app"], "Depot Desk");

    Ok(())
}

#[tokio::test]
async fn tampering_is_detected() -> Result<()> {
    let app = spawn_app().await?;
    let token = auditor(&app).await?;

    sqlx::query("UPDATE log_entries SET message = 'nothing happened' WHERE seq = 2")
        .execute(&app.pool)
        .await?;

    let report = officesync::audit::verify_chain(&app.pool).await?;
    assert!(!report.valid);
    assert_eq!(report.broken_at, Some(2));

    let resp = app.get("/logs/verify", Some(&token)).await?;
    assert_eq!(resp.body["data"]["valid"], false);
    assert_eq!(resp.body["data"]["broken_at"], 2);

    Ok(())
}

#[tokio::test]
async fn logs_are_listed_by_category_newest_first() -> Result<()> {
    let app = spawn_app().await?;
    let token = auditor(&app).await?;

    let resp = app.get("/logs", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["category"], "SYSTEM");
    let entries = resp.body["data"]["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 3);
    assert!(entries[0]["seq"].as_i64() > entries[1]["seq"].as_i64());
    assert_eq!(entries[0]["action"], "READ");
    assert_eq!(entries[0]["actor_name"], "auditor");

    app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;
    let resp = app.get("/logs/administration", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    let entries = resp.body["data"]["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["target"]["kind"], "role");

    assert_eq!(app.get("/logs/system", Some(&token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/logs/billing", Some(&token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/logs/cloud", Some(&token)).await?.status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn request_context_is_recorded() -> Result<()> {
    let app = spawn_app().await?;
    let token = auditor(&app).await?;

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/roles/create")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("authorization", format!("Bearer {}", token))
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header("user-agent", "integration-test")
        .body(axum::body::Body::from("name=Ops&color=%23112233"))?;
    let resp = app.send(req).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let (ip, agent): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT ip, user_agent FROM log_entries WHERE category = 'ADMINISTRATION'",
    )
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(agent.as_deref(), Some("integration-test"));

    Ok(())
}

#[tokio::test]
async fn recorders_on_separate_pools_keep_one_chain() -> Result<()> {
    use officesync::audit::{verify_chain, AuditRecorder, LogAction, LogCategory, NewLogEntry};
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::SqlitePool;

    // Two pools over one file behave like the server and the CLI.
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("audit.db"))
        .create_if_missing(true);
    let server_pool = SqlitePool::connect_with(opts.clone()).await?;
    sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?
        .run(&server_pool)
        .await?;
    let cli_pool = SqlitePool::connect_with(opts).await?;

    let server = AuditRecorder::new(server_pool.clone());
    let cli = AuditRecorder::new(cli_pool);

    let write = |recorder: AuditRecorder, name: &'static str| async move {
        let entries = (0..15).map(|i| {
            NewLogEntry::system(LogAction::Update, LogCategory::Administration, format!("{} {}", name, i))
        });
        recorder.append_all(entries.collect::<Vec<_>>()).await
    };
    let (a, b) = tokio::join!(
        tokio::spawn(write(server, "server")),
        tokio::spawn(write(cli, "cli"))
    );
    assert_eq!(a? + b?, 30);

    let report = verify_chain(&server_pool).await?;
    assert!(report.valid, "chain broken at {:?}", report.broken_at);
    assert_eq!(report.entries, 30);

    Ok(())
}
