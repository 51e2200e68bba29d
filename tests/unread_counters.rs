mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::spawn_app;

#[tokio::test]
async fn badge_is_unread_announcements_plus_unread_messages() -> Result<()> {
    let app = spawn_app().await?;
    let (ada, _) = app.member("ada").await?;
    let (bob, _) = app.member("bob").await?;

    let first = app.announce("Office closed Friday").await?;
    app.announce("New parking rules").await?;

    for subject in ["hello", "lunch?"] {
        let form = format!("receiver=ada&subject={}&body=hi", subject.replace('?', "%3F"));
        let resp = app.post_form("/messages/send", Some(&bob), &form).await?;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        assert_eq!(resp.location(), "/messages");
    }

    let home = app.get("/", Some(&ada)).await?;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.body["unread"]["announcements"], 2);
    assert_eq!(home.body["unread"]["messages"], 2);
    assert_eq!(home.body["unread"]["total"], 4);

    // the sender's own badge only counts announcements
    let home = app.get("/", Some(&bob)).await?;
    assert_eq!(home.body["unread"]["total"], 2);

    app.post_form(&format!("/announcements/{}/read", first), Some(&ada), "").await?;
    // marking twice changes nothing
    app.post_form(&format!("/announcements/{}/read", first), Some(&ada), "").await?;

    let inbox = app.get("/messages", Some(&ada)).await?;
    let unread = inbox.body["data"]["unread"].as_array().cloned().unwrap_or_default();
    assert_eq!(unread.len(), 2);
    let message_id = unread[0]["id"].as_str().unwrap_or_default().to_string();

    // only the receiver can mark a message read
    let resp = app.post_form(&format!("/messages/{}/read", message_id), Some(&bob), "").await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.post_form(&format!("/messages/{}/read", message_id), Some(&ada), "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let inbox = app.get("/messages", Some(&ada)).await?;
    assert_eq!(inbox.body["unread"]["announcements"], 1);
    assert_eq!(inbox.body["unread"]["messages"], 1);
    assert_eq!(inbox.body["unread"]["total"], 2);
    assert_eq!(inbox.body["data"]["read"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn messages_need_a_known_receiver() -> Result<()> {
    let app = spawn_app().await?;
    let (ada, _) = app.member("ada").await?;

    let resp = app.post_form("/messages/send", Some(&ada), "receiver=nobody&subject=hi&body=").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"].get("receiver").is_some());
    assert_eq!(app.log_count("COMMUNICATION").await?, 0);

    Ok(())
}

#[tokio::test]
async fn sent_message_is_logged_as_communication() -> Result<()> {
    let app = spawn_app().await?;
    let (ada, _) = app.member("ada").await?;
    app.member("bob").await?;

    app.post_form("/messages/send", Some(&ada), "receiver=%40bob&subject=Report&body=attached").await?;

    let (action, target): (String, Option<String>) = sqlx::query_as(
        "SELECT action, target_kind FROM log_entries WHERE category = 'COMMUNICATION'",
    )
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(action, "CREATE");
    assert_eq!(target.as_deref(), Some("message"));

    Ok(())
}
