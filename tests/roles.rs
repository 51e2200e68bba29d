mod common;

use anyhow::Result;
use axum::http::StatusCode;
use uuid::Uuid;

use common::{spawn_app, TestApp};

const ADMIN: &[&str] = &[
    "system.access",
    "system.roles.create",
    "system.roles.rename",
    "system.roles.delete",
    "system.roles.perm",
];

async fn admin(app: &TestApp) -> Result<String> {
    let (token, user_id) = app.member("root").await?;
    app.grant(user_id, "Admins", ADMIN).await?;
    Ok(token)
}

async fn role_of(app: &TestApp, user_id: Uuid) -> Result<String> {
    Ok(sqlx::query_scalar(
        "SELECT r.name FROM profiles p INNER JOIN roles r ON r.id = p.role_id WHERE p.user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_one(&app.pool)
    .await?)
}

#[tokio::test]
async fn standard_member_is_denied_role_creation() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.member("ada").await?;

    let resp = app.get("/roles/create", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/denied");

    Ok(())
}

#[tokio::test]
async fn creating_a_role_writes_one_create_entry() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("ada").await?;
    app.grant(user_id, "Creators", &["system.access", "system.roles.create"]).await?;

    let resp = app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/roles/Ops");

    let color: String = sqlx::query_scalar("SELECT color FROM roles WHERE name = 'Ops'")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(color, "#112233");

    let entries: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT action, category, target_kind FROM log_entries WHERE category = 'ADMINISTRATION'",
    )
    .fetch_all(&app.pool)
    .await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "CREATE");
    assert_eq!(entries[0].1, "ADMINISTRATION");
    assert_eq!(entries[0].2.as_deref(), Some("role"));

    Ok(())
}

#[tokio::test]
async fn role_names_must_be_unique_and_valid() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;

    let resp = app.post_form("/roles/create", Some(&token), "name=standard&color=%23112233").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"].get("name").is_some(), "{}", resp.body);

    let resp = app.post_form("/roles/create", Some(&token), "name=Field+Team&color=blue").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"].get("name").is_some());
    assert!(resp.body["fields"].get("color").is_some());

    assert_eq!(app.log_count("ADMINISTRATION").await?, 0);
    Ok(())
}

#[tokio::test]
async fn rename_and_recolor_log_one_entry_each() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;
    app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;
    let base = app.log_count("ADMINISTRATION").await?;

    // unchanged submission
    let resp = app.post_form("/roles/Ops/manage/update", Some(&token), "name=Ops&color=%23112233").await?;
    assert_eq!(resp.location(), "/roles/Ops");
    assert_eq!(app.log_count("ADMINISTRATION").await?, base);

    let resp = app
        .post_form("/roles/Ops/manage/update", Some(&token), "name=Dispatch&color=%23445566")
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/roles/Dispatch");
    assert_eq!(app.log_count("ADMINISTRATION").await?, base + 2);

    let resp = app.get("/roles/Dispatch", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["role"]["color"], "#445566");
    assert_eq!(app.get("/roles/Ops", Some(&token)).await?.status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn standard_role_keeps_its_name_and_existence() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;

    let resp = app
        .post_form("/roles/Standard/manage/update", Some(&token), "name=Basic&color=%23000000")
        .await?;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app.post_form("/roles/Standard/manage/delete", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post_form("/roles/Standard/manage/update", Some(&token), "name=Standard&color=%23abcdef")
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(app.log_count("ADMINISTRATION").await?, 1);

    Ok(())
}

#[tokio::test]
async fn roles_with_members_cannot_be_deleted() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;

    let resp = app.post_form("/roles/Admins/manage/delete", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    app.post_form("/roles/create", Some(&token), "name=Empty&color=%23112233").await?;
    let page = app.get("/roles/Empty/manage/delete", Some(&token)).await?;
    assert_eq!(page.body["data"]["deletable"], true);

    let resp = app.post_form("/roles/Empty/manage/delete", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/roles");

    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM log_entries WHERE category = 'ADMINISTRATION' ORDER BY seq",
    )
    .fetch_all(&app.pool)
    .await?;
    assert_eq!(actions, vec!["CREATE", "DELETE"]);

    Ok(())
}

#[tokio::test]
async fn permission_set_is_replaced() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;
    app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;

    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM permissions WHERE name IN ('disposition.access', 'disposition.vehicle.create') ORDER BY name",
    )
    .fetch_all(&app.pool)
    .await?;
    let form = format!("selected_permissions={}&selected_permissions={}", ids[0], ids[1]);

    let resp = app.post_form("/roles/Ops/manage/permissions", Some(&token), &form).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/roles/Ops/manage");
    assert_eq!(app.log_count("ADMINISTRATION").await?, 2);

    // same set again is a no-op
    app.post_form("/roles/Ops/manage/permissions", Some(&token), &form).await?;
    assert_eq!(app.log_count("ADMINISTRATION").await?, 2);

    let page = app.get("/roles/Ops", Some(&token)).await?;
    assert_eq!(page.body["data"]["granted"].as_array().map(Vec::len), Some(2));

    let bogus = format!("selected_permissions={}", Uuid::new_v4());
    let resp = app.post_form("/roles/Ops/manage/permissions", Some(&token), &bogus).await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.post_form("/roles/Ops/manage/permissions", Some(&token), "").await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let granted: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM role_permissions rp INNER JOIN roles r ON r.id = rp.role_id WHERE r.name = 'Ops'",
    )
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(granted, 0);

    Ok(())
}

#[tokio::test]
async fn users_removed_from_a_role_fall_back_to_standard() -> Result<()> {
    let app = spawn_app().await?;
    let token = admin(&app).await?;
    let (_, ada) = app.member("ada").await?;
    let (_, bob) = app.member("bob").await?;
    app.post_form("/roles/create", Some(&token), "name=Ops&color=%23112233").await?;

    let form = format!("selected_users={}&selected_users={}", ada, bob);
    let resp = app.post_form("/roles/Ops/users/add", Some(&token), &form).await?;
    assert_eq!(resp.location(), "/roles/Ops");
    assert_eq!(role_of(&app, ada).await?, "Ops");
    assert_eq!(role_of(&app, bob).await?, "Ops");

    let form = format!("selected_users={}", ada);
    app.post_form("/roles/Ops/users/add", Some(&token), &form).await?;
    assert_eq!(role_of(&app, ada).await?, "Ops");
    assert_eq!(role_of(&app, bob).await?, "Standard");

    // create + two membership changes
    assert_eq!(app.log_count("ADMINISTRATION").await?, 3);

    let form = format!("selected_users={}", Uuid::new_v4());
    let resp = app.post_form("/roles/Ops/users/add", Some(&token), &form).await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}

#[tokio::test]
async fn management_page_reports_abilities() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("ada").await?;
    app.grant(user_id, "Viewers", &["system.access", "system.roles.perm"]).await?;

    let resp = app.get("/roles/Standard/manage", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["can_rename"], false);
    assert_eq!(resp.body["data"]["can_delete"], false);
    assert_eq!(resp.body["data"]["can_edit_permissions"], true);
    assert_eq!(resp.body["data"]["role"]["name"], "Standard");

    Ok(())
}

#[tokio::test]
async fn missing_form_field_is_a_field_error() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("ada").await?;
    app.grant(user_id, "Creators", &["system.access", "system.roles.create"]).await?;

    let resp = app.post_form("/roles/create", Some(&token), "name=Ops").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.body["error"], "validation");
    assert_eq!(resp.body["fields"]["color"][0], "this field is required");

    let created: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM roles WHERE name = 'Ops'")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(created, 0);
    assert_eq!(app.log_count("ADMINISTRATION").await?, 0);

    Ok(())
}
