mod common;

use anyhow::Result;
use axum::http::StatusCode;
use uuid::Uuid;

use common::{spawn_app, TestApp};

async fn issue_salary(app: &TestApp, user_id: Uuid, period: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO salaries (id, user_id, period, gross_cents, net_cents, confirmed, created_at) VALUES (?, ?, ?, 400000, 260000, 0, ?)",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(period)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&app.pool)
    .await?;
    Ok(id)
}

#[tokio::test]
async fn unconfirmed_salaries_badge_follows_confirmation() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("ada").await?;
    let january = issue_salary(&app, user_id, "2025-01").await?;
    issue_salary(&app, user_id, "2025-02").await?;

    for page in ["/profile", "/salary", "/personal", "/personal/work"] {
        let resp = app.get(page, Some(&token)).await?;
        assert_eq!(resp.status, StatusCode::OK, "{}", page);
        assert_eq!(resp.body["data"]["unconfirmed_salaries"], 2, "{}", page);
    }

    let resp = app.get("/salary", Some(&token)).await?;
    assert_eq!(resp.body["data"]["salaries"][0]["period"], "2025-02");

    let form = format!("salary_id={}", january);
    let resp = app.post_form("/salary/confirm", Some(&token), &form).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/salary");

    let resp = app.get("/salary", Some(&token)).await?;
    assert_eq!(resp.body["data"]["unconfirmed_salaries"], 1);
    assert_eq!(resp.body["data"]["salaries"][1]["confirmed"], true);
    let confirmed_at = resp.body["data"]["salaries"][1]["confirmed_at"].clone();
    assert!(confirmed_at.is_string());

    // a second confirmation changes nothing
    app.post_form("/salary/confirm", Some(&token), &form).await?;
    let resp = app.get("/salary", Some(&token)).await?;
    assert_eq!(resp.body["data"]["unconfirmed_salaries"], 1);
    assert_eq!(resp.body["data"]["salaries"][1]["confirmed_at"], confirmed_at);

    Ok(())
}

#[tokio::test]
async fn salaries_are_private_to_their_owner() -> Result<()> {
    let app = spawn_app().await?;
    let (_, ada_id) = app.member("ada").await?;
    let (bob_token, _) = app.member("bob").await?;
    let payslip = issue_salary(&app, ada_id, "2025-03").await?;

    let resp = app.get("/salary", Some(&bob_token)).await?;
    assert_eq!(resp.body["data"]["salaries"], serde_json::json!([]));

    let resp = app
        .post_form("/salary/confirm", Some(&bob_token), &format!("salary_id={}", payslip))
        .await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let confirmed: bool = sqlx::query_scalar("SELECT confirmed FROM salaries WHERE id = ?")
        .bind(payslip.to_string())
        .fetch_one(&app.pool)
        .await?;
    assert!(!confirmed);

    let resp = app.post_form("/salary/confirm", Some(&bob_token), "salary_id=nope").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.body["error"], "validation");

    Ok(())
}

#[tokio::test]
async fn account_settings_update_identity_and_picture() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("ada").await?;

    let resp = app.get("/account", Some(&token)).await?;
    assert_eq!(resp.body["data"]["user"]["username"], "ada");
    assert!(resp.body["data"]["picture"].is_null());
    assert_eq!(resp.body["data"]["pictures"].as_array().map(Vec::len), Some(12));

    let resp = app
        .post_form(
            "/account/update",
            Some(&token),
            "username=ada.l&first_name=Ada&last_name=Lovelace&email=ADA%40Engine.org&picture=avatar-05",
        )
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/");

    let (username, email, last_name): (String, String, String) =
        sqlx::query_as("SELECT username, email, last_name FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_one(&app.pool)
            .await?;
    assert_eq!(username, "ada.l");
    assert_eq!(email, "ada@engine.org");
    assert_eq!(last_name, "Lovelace");

    let resp = app.get("/profile", Some(&token)).await?;
    assert_eq!(resp.body["data"]["profile"]["picture"], "avatar-05");
    assert_eq!(resp.body["viewer"]["username"], "ada.l");

    // an empty picture clears it, keeping the same username is fine
    let resp = app
        .post_form("/account/update", Some(&token), "username=ada.l&email=ada%40engine.org&picture=")
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let resp = app.get("/account", Some(&token)).await?;
    assert!(resp.body["data"]["picture"].is_null());

    Ok(())
}

#[tokio::test]
async fn account_settings_reject_taken_identity_and_unknown_picture() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.member("ada").await?;
    app.member("bob").await?;

    let resp = app
        .post_form(
            "/account/update",
            Some(&token),
            "username=bob&email=bob%40example.com&picture=selfie.png",
        )
        .await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &resp.body["fields"];
    assert!(fields["username"].is_array());
    assert!(fields["email"].is_array());
    assert!(fields["picture"].is_array());

    let resp = app.post_form("/account/update", Some(&token), "first_name=Ada").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"]["username"].is_array());

    let username: String = sqlx::query_scalar("SELECT username FROM users WHERE email = 'ada@example.com'")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(username, "ada");

    Ok(())
}

#[tokio::test]
async fn profile_accepts_every_social_handle() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.member("ada").await?;

    let resp = app
        .post_form(
            "/profile/update",
            Some(&token),
            "steam_username=ada_plays&tiktok_username=+ada+&threads_username=&xbox_username=Ada360",
        )
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let profile = app.get("/profile", Some(&token)).await?.body["data"]["profile"].clone();
    assert_eq!(profile["steam_username"], "ada_plays");
    assert_eq!(profile["tiktok_username"], "ada");
    assert_eq!(profile["xbox_username"], "Ada360");
    assert!(profile["threads_username"].is_null());

    Ok(())
}

#[tokio::test]
async fn record_sections_are_member_pages() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.member("ada").await?;

    let overview = app.get("/personal", Some(&token)).await?;
    assert_eq!(overview.body["data"]["sections"].as_array().map(Vec::len), Some(8));
    assert_eq!(overview.body["data"]["sections"][0]["href"], "/personal/meta");

    let resp = app.get("/personal/reprimand", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["section"], "reprimand");
    assert_eq!(resp.body["data"]["user"]["username"], "ada");

    let resp = app.get("/personal/salary", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let anonymous = app.get("/personal/meta", None).await?;
    assert_eq!(anonymous.status, StatusCode::SEE_OTHER);
    assert_eq!(anonymous.location(), "/login?next=/personal/meta");

    Ok(())
}
