mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::spawn_app;

#[tokio::test]
async fn consents_are_collected_in_order_and_next_is_kept() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.register("ada").await?;

    let resp = app.get("/messages", Some(&token)).await?;
    assert_eq!(resp.location(), "/privacy?next=/messages");

    let resp = app.get("/privacy?next=/messages", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["accepted"], false);
    assert_eq!(resp.body["data"]["action"], "/privacy/accept?next=/messages");

    let resp = app.post_form("/privacy/accept?next=/messages", Some(&token), "").await?;
    assert_eq!(resp.location(), "/terms?next=/messages");

    let resp = app.post_form("/terms/accept?next=/messages", Some(&token), "").await?;
    assert_eq!(resp.location(), "/copyright?next=/messages");

    let resp = app.post_form("/copyright/accept?next=/messages", Some(&token), "").await?;
    assert_eq!(resp.location(), "/messages");

    let resp = app.get("/messages", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn accepting_twice_logs_once() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.member("ada").await?;
    assert_eq!(app.log_count("SYSTEM").await?, 3);

    let resp = app.post_form("/terms/accept", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/");
    assert_eq!(app.log_count("SYSTEM").await?, 3);

    Ok(())
}

#[tokio::test]
async fn offsite_next_is_ignored() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.register("ada").await?;

    app.post_form("/privacy/accept", Some(&token), "").await?;
    app.post_form("/terms/accept", Some(&token), "").await?;
    let resp = app
        .post_form("/copyright/accept?next=//evil.example", Some(&token), "")
        .await?;
    assert_eq!(resp.location(), "/");

    Ok(())
}

#[tokio::test]
async fn consent_accept_requires_login() -> Result<()> {
    let app = spawn_app().await?;

    let resp = app.post_form("/privacy/accept", None, "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/login");

    Ok(())
}

#[tokio::test]
async fn next_with_line_break_or_tab_falls_back_home() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.register("ada").await?;

    app.post_form("/privacy/accept", Some(&token), "").await?;
    app.post_form("/terms/accept", Some(&token), "").await?;

    let resp = app.post_form("/copyright/accept?next=/%0Aevil", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/");

    let resp = app
        .post_form("/copyright/accept?next=/%09/evil.example", Some(&token), "")
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/");

    let resp = app.get("/privacy?next=/%09/evil.example", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["action"], "/privacy/accept");

    Ok(())
}
