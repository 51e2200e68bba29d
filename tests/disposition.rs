mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{spawn_app, TestApp};

const DISPATCHER: &[&str] = &[
    "disposition.access",
    "disposition.location.create",
    "disposition.location.update",
    "disposition.location.delete",
    "disposition.vehicle.create",
    "disposition.vehicle.update",
    "disposition.vehicle.delete",
];

async fn dispatcher(app: &TestApp) -> Result<String> {
    let (token, user_id) = app.member("dispatch").await?;
    app.grant(user_id, "Dispatch", DISPATCHER).await?;
    Ok(token)
}

async fn actions(app: &TestApp) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar("SELECT action FROM log_entries WHERE category = 'DISPOSITION' ORDER BY seq")
        .fetch_all(&app.pool)
        .await?)
}

#[tokio::test]
async fn station_lifecycle_is_audited() -> Result<()> {
    let app = spawn_app().await?;
    let token = dispatcher(&app).await?;

    let resp = app
        .post_form("/stations/create", Some(&token), "name=North+Depot&capacity=12&contact_mail=")
        .await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let location = resp.location().to_string();
    assert!(location.starts_with("/stations/"));

    let page = app.get(&location, Some(&token)).await?;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["data"]["station"]["name"], "North Depot");
    assert_eq!(page.body["data"]["station"]["capacity"], 12);
    assert_eq!(page.body["data"]["can"]["update"], true);

    // same values again: nothing to log
    app.post_form(&format!("{}/update", location), Some(&token), "name=North+Depot&capacity=12")
        .await?;
    app.post_form(&format!("{}/update", location), Some(&token), "name=North+Depot&capacity=20")
        .await?;
    app.post_form(&format!("{}/delete", location), Some(&token), "").await?;

    assert_eq!(actions(&app).await?, vec!["CREATE", "UPDATE", "DELETE"]);
    assert_eq!(app.get(&location, Some(&token)).await?.status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn station_form_is_validated() -> Result<()> {
    let app = spawn_app().await?;
    let token = dispatcher(&app).await?;

    let resp = app
        .post_form("/stations/create", Some(&token), "name=&capacity=many&contact_mail=nope")
        .await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    for field in ["name", "capacity", "contact_mail"] {
        assert!(resp.body["fields"].get(field).is_some(), "missing error for {}", field);
    }
    assert!(actions(&app).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn vehicles_have_unique_plates_and_real_stations() -> Result<()> {
    let app = spawn_app().await?;
    let token = dispatcher(&app).await?;

    let station = app.post_form("/stations/create", Some(&token), "name=Depot").await?;
    let station_id = station.location().trim_start_matches("/stations/").to_string();

    let form = format!("license_plate=b-ab+123&name=Van+1&year_of_manufacture=2019&station_id={}", station_id);
    let resp = app.post_form("/vehicles/create", Some(&token), &form).await?;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let vehicle = app.get(resp.location(), Some(&token)).await?;
    assert_eq!(vehicle.body["data"]["vehicle"]["license_plate"], "B-AB 123");
    assert_eq!(vehicle.body["data"]["station"]["name"], "Depot");

    let resp = app.post_form("/vehicles/create", Some(&token), "license_plate=B-AB+123&name=Van+2").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"].get("license_plate").is_some());

    let form = format!("license_plate=X1&name=Van+3&station_id={}", uuid::Uuid::new_v4());
    let resp = app.post_form("/vehicles/create", Some(&token), &form).await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["fields"].get("station_id").is_some());

    let resp = app.post_form("/vehicles/create", Some(&token), "license_plate=X2&name=Old&year_of_manufacture=1850").await?;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);

    let station = app.get(&format!("/stations/{}", station_id), Some(&token)).await?;
    assert_eq!(station.body["data"]["vehicles"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn vehicle_update_is_logged_as_update() -> Result<()> {
    let app = spawn_app().await?;
    let token = dispatcher(&app).await?;

    let resp = app.post_form("/vehicles/create", Some(&token), "license_plate=K-1&name=Truck").await?;
    let location = resp.location().to_string();

    app.post_form(&format!("{}/update", location), Some(&token), "license_plate=K-1&name=Truck").await?;
    app.post_form(&format!("{}/update", location), Some(&token), "license_plate=K-1&name=Big+Truck").await?;

    assert_eq!(actions(&app).await?, vec!["CREATE", "UPDATE"]);
    Ok(())
}

#[tokio::test]
async fn browsing_without_write_permissions() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id) = app.member("viewer").await?;
    app.grant(user_id, "Readers", &["disposition.access"]).await?;

    let resp = app.get("/stations", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"]["can"]["create"], false);

    let resp = app.get("/tours", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.post_form("/stations/create", Some(&token), "name=Depot").await?;
    assert_eq!(resp.location(), "/denied");
    let stations: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM stations").fetch_one(&app.pool).await?;
    assert_eq!(stations, 0);

    Ok(())
}
