//! Tours, stations (locations) and vehicles.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, MethodRouter};
use axum::{Extension, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{see_other, SeeOther};
use crate::app::AppState;
use crate::audit::{LogAction, LogCategory, NewLogEntry, RequestContext};
use crate::authz::gate::guard;
use crate::authz::{policy, AccessPolicy, Principal};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::extract::Form;
use crate::models::disposition::{Station, StationDetails, StationForm, Tour, Vehicle, VehicleDetails, VehicleForm};
use crate::page::{render, Page};
use crate::utils::utc_now;

pub fn routes(state: &AppState) -> Router<AppState> {
    let browse = Router::new()
        .route("/tours", get(list_tours))
        .route("/stations", get(list_stations))
        .route("/stations/:id", get(station_detail))
        .route("/vehicles", get(list_vehicles))
        .route("/vehicles/:id", get(vehicle_detail));

    let route = |policy: AccessPolicy, path: &str, handler: MethodRouter<AppState>| {
        guard(state, policy, Router::new().route(path, handler))
    };

    Router::new()
        .merge(guard(state, policy::DISPOSITION, browse))
        .merge(route(policy::LOCATION_CREATE, "/stations/create", post(create_station)))
        .merge(route(policy::LOCATION_UPDATE, "/stations/:id/update", post(update_station)))
        .merge(route(policy::LOCATION_DELETE, "/stations/:id/delete", post(delete_station)))
        .merge(route(policy::VEHICLE_CREATE, "/vehicles/create", post(create_vehicle)))
        .merge(route(policy::VEHICLE_UPDATE, "/vehicles/:id/update", post(update_vehicle)))
        .merge(route(policy::VEHICLE_DELETE, "/vehicles/:id/delete", post(delete_vehicle)))
}

fn entry(principal: &Principal, action: LogAction, message: String, headers: &HeaderMap) -> NewLogEntry {
    NewLogEntry::new(principal, action, LogCategory::Disposition, message)
        .with_context(RequestContext::from_headers(headers))
}

/// Which write actions the viewer may use on a list or detail page.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct Abilities {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

// =============================================================================
// TOURS
// =============================================================================

#[utoipa::path(
    get,
    path = "/tours",
    tag = "Disposition",
    responses((status = 200, description = "Tours"), (status = 303, description = "Redirect to login, consent or denied")),
    security(("bearerAuth" = []))
)]
pub async fn list_tours(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<Vec<Tour>>>> {
    let rows = sqlx::query("SELECT id, name, description, vehicle_id, created_at FROM tours ORDER BY lower(name)")
        .fetch_all(&state.pool)
        .await?;
    let tours = rows.iter().map(row_parsers::tour_from_row).collect::<AppResult<Vec<_>>>()?;

    render(&state.pool, Some(&principal), tours).await
}

// =============================================================================
// STATIONS
// =============================================================================

const STATION_COLUMNS: &str =
    "id, name, contact_mail, contact_phone, capacity, country, state, location, street, created_at, updated_at";

async fn station_by_id(pool: &SqlitePool, id: Uuid) -> AppResult<Station> {
    let row = sqlx::query(&format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("station not found"))?;

    row_parsers::station_from_row(&row)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationList {
    pub stations: Vec<Station>,
    pub can: Abilities,
}

#[utoipa::path(
    get,
    path = "/stations",
    tag = "Disposition",
    responses((status = 200, description = "Stations"), (status = 303, description = "Redirect to login, consent or denied")),
    security(("bearerAuth" = []))
)]
pub async fn list_stations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<StationList>>> {
    let rows = sqlx::query(&format!("SELECT {STATION_COLUMNS} FROM stations ORDER BY lower(name)"))
        .fetch_all(&state.pool)
        .await?;
    let stations = rows.iter().map(row_parsers::station_from_row).collect::<AppResult<Vec<_>>>()?;

    let can = Abilities {
        create: policy::LOCATION_CREATE.granted_to(&principal),
        ..Abilities::default()
    };

    render(&state.pool, Some(&principal), StationList { stations, can }).await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationPage {
    pub station: Station,
    pub vehicles: Vec<Vehicle>,
    pub can: Abilities,
}

#[utoipa::path(
    get,
    path = "/stations/{id}",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Station id")),
    responses((status = 200, description = "Station with its vehicles"), (status = 404, description = "Unknown station")),
    security(("bearerAuth" = []))
)]
pub async fn station_detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page<StationPage>>> {
    let station = station_by_id(&state.pool, id).await?;

    let rows = sqlx::query(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE station_id = ? ORDER BY license_plate"
    ))
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;
    let vehicles = rows.iter().map(row_parsers::vehicle_from_row).collect::<AppResult<Vec<_>>>()?;

    let can = Abilities {
        create: false,
        update: policy::LOCATION_UPDATE.granted_to(&principal),
        delete: policy::LOCATION_DELETE.granted_to(&principal),
    };

    render(&state.pool, Some(&principal), StationPage { station, vehicles, can }).await
}

#[utoipa::path(
    post,
    path = "/stations/create",
    tag = "Disposition",
    request_body(content = StationForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Created; redirect to the station"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn create_station(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Form(form): Form<StationForm>,
) -> AppResult<SeeOther> {
    let details = form.validate()?;
    let now = utc_now();
    let station = Station {
        id: Uuid::new_v4(),
        details,
        created_at: now,
        updated_at: now,
    };

    bind_station(
        sqlx::query(
            "INSERT INTO stations (name, contact_mail, contact_phone, capacity, country, state, location, street, id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        ),
        &station.details,
    )
    .bind(station.id.to_string())
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Create,
            format!("{} created the location {}.", principal.handle(), station.details.name),
            &headers,
        )
        .about(&station)])
        .await;

    see_other(format!("/stations/{}", station.id))
}

fn bind_station<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    d: &'q StationDetails,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&d.name)
        .bind(&d.contact_mail)
        .bind(&d.contact_phone)
        .bind(d.capacity)
        .bind(&d.country)
        .bind(&d.state)
        .bind(&d.location)
        .bind(&d.street)
}

#[utoipa::path(
    post,
    path = "/stations/{id}/update",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Station id")),
    request_body(content = StationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirect to the station"),
        (status = 404, description = "Unknown station"),
        (status = 422, description = "Field errors")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_station(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Form(form): Form<StationForm>,
) -> AppResult<SeeOther> {
    let station = station_by_id(&state.pool, id).await?;
    let details = form.validate()?;
    let done = format!("/stations/{}", id);

    if details == station.details {
        return see_other(done);
    }

    bind_station(
        sqlx::query(
            "UPDATE stations SET name = ?, contact_mail = ?, contact_phone = ?, capacity = ?, country = ?, state = ?, \
             location = ?, street = ?, updated_at = ? WHERE id = ?",
        ),
        &details,
    )
    .bind(utc_now().to_rfc3339())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Update,
            format!("{} changed the location {}.", principal.handle(), details.name),
            &headers,
        )
        .about(&station)])
        .await;

    see_other(done)
}

#[utoipa::path(
    post,
    path = "/stations/{id}/delete",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Station id")),
    responses((status = 303, description = "Deleted; redirect to /stations"), (status = 404, description = "Unknown station")),
    security(("bearerAuth" = []))
)]
pub async fn delete_station(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<SeeOther> {
    let station = station_by_id(&state.pool, id).await?;

    sqlx::query("DELETE FROM stations WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Delete,
            format!("{} deleted the location '{}'.", principal.handle(), station.details.name),
            &headers,
        )
        .about(&station)])
        .await;

    see_other("/stations")
}

// =============================================================================
// VEHICLES
// =============================================================================

const VEHICLE_COLUMNS: &str = "id, license_plate, name, vehicle_type, model, manufacturer, year_of_manufacture, vin, \
                               capacity, fuel_type, condition, station_id, created_at, updated_at";

async fn vehicle_by_id(pool: &SqlitePool, id: Uuid) -> AppResult<Vehicle> {
    let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("vehicle not found"))?;

    row_parsers::vehicle_from_row(&row)
}

/// Plate uniqueness and station existence, checked against storage.
async fn check_vehicle(pool: &SqlitePool, details: &VehicleDetails, except: Option<Uuid>) -> AppResult<()> {
    let plate_taken: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM vehicles WHERE license_plate = ? AND id != ?")
        .bind(&details.license_plate)
        .bind(except.map(|id| id.to_string()).unwrap_or_default())
        .fetch_one(pool)
        .await?;
    if plate_taken > 0 {
        return Err(AppError::field("license_plate", "a vehicle with this license plate already exists"));
    }

    if let Some(station_id) = details.station_id {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM stations WHERE id = ?")
            .bind(station_id.to_string())
            .fetch_one(pool)
            .await?;
        if exists == 0 {
            return Err(AppError::field("station_id", "select a valid station"));
        }
    }

    Ok(())
}

fn bind_vehicle<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    d: &'q VehicleDetails,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&d.license_plate)
        .bind(&d.name)
        .bind(&d.vehicle_type)
        .bind(&d.model)
        .bind(&d.manufacturer)
        .bind(d.year_of_manufacture)
        .bind(&d.vin)
        .bind(d.capacity)
        .bind(&d.fuel_type)
        .bind(&d.condition)
        .bind(d.station_id.map(|id| id.to_string()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleList {
    pub vehicles: Vec<Vehicle>,
    pub can: Abilities,
}

#[utoipa::path(
    get,
    path = "/vehicles",
    tag = "Disposition",
    responses((status = 200, description = "Vehicles"), (status = 303, description = "Redirect to login, consent or denied")),
    security(("bearerAuth" = []))
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Page<VehicleList>>> {
    let rows = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY license_plate"))
        .fetch_all(&state.pool)
        .await?;
    let vehicles = rows.iter().map(row_parsers::vehicle_from_row).collect::<AppResult<Vec<_>>>()?;

    let can = Abilities {
        create: policy::VEHICLE_CREATE.granted_to(&principal),
        ..Abilities::default()
    };

    render(&state.pool, Some(&principal), VehicleList { vehicles, can }).await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehiclePage {
    pub vehicle: Vehicle,
    pub station: Option<Station>,
    pub can: Abilities,
}

#[utoipa::path(
    get,
    path = "/vehicles/{id}",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Vehicle id")),
    responses((status = 200, description = "Vehicle with its station"), (status = 404, description = "Unknown vehicle")),
    security(("bearerAuth" = []))
)]
pub async fn vehicle_detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Page<VehiclePage>>> {
    let vehicle = vehicle_by_id(&state.pool, id).await?;
    let station = match vehicle.details.station_id {
        Some(station_id) => Some(station_by_id(&state.pool, station_id).await?),
        None => None,
    };

    let can = Abilities {
        create: false,
        update: policy::VEHICLE_UPDATE.granted_to(&principal),
        delete: policy::VEHICLE_DELETE.granted_to(&principal),
    };

    render(&state.pool, Some(&principal), VehiclePage { vehicle, station, can }).await
}

#[utoipa::path(
    post,
    path = "/vehicles/create",
    tag = "Disposition",
    request_body(content = VehicleForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Created; redirect to the vehicle"), (status = 422, description = "Field errors")),
    security(("bearerAuth" = []))
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Form(form): Form<VehicleForm>,
) -> AppResult<SeeOther> {
    let details = form.validate()?;
    check_vehicle(&state.pool, &details, None).await?;

    let now = utc_now();
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        details,
        created_at: now,
        updated_at: now,
    };

    bind_vehicle(
        sqlx::query(
            "INSERT INTO vehicles (license_plate, name, vehicle_type, model, manufacturer, year_of_manufacture, vin, \
             capacity, fuel_type, condition, station_id, id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        ),
        &vehicle.details,
    )
    .bind(vehicle.id.to_string())
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Create,
            format!("{} created the vehicle {}.", principal.handle(), vehicle.details.license_plate),
            &headers,
        )
        .about(&vehicle)])
        .await;

    see_other(format!("/vehicles/{}", vehicle.id))
}

#[utoipa::path(
    post,
    path = "/vehicles/{id}/update",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Vehicle id")),
    request_body(content = VehicleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirect to the vehicle"),
        (status = 404, description = "Unknown vehicle"),
        (status = 422, description = "Field errors")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Form(form): Form<VehicleForm>,
) -> AppResult<SeeOther> {
    let vehicle = vehicle_by_id(&state.pool, id).await?;
    let details = form.validate()?;
    let done = format!("/vehicles/{}", id);

    if details == vehicle.details {
        return see_other(done);
    }
    check_vehicle(&state.pool, &details, Some(id)).await?;

    bind_vehicle(
        sqlx::query(
            "UPDATE vehicles SET license_plate = ?, name = ?, vehicle_type = ?, model = ?, manufacturer = ?, \
             year_of_manufacture = ?, vin = ?, capacity = ?, fuel_type = ?, condition = ?, station_id = ?, \
             updated_at = ? WHERE id = ?",
        ),
        &details,
    )
    .bind(utc_now().to_rfc3339())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Update,
            format!("{} changed the vehicle {}.", principal.handle(), details.license_plate),
            &headers,
        )
        .about(&vehicle)])
        .await;

    see_other(done)
}

#[utoipa::path(
    post,
    path = "/vehicles/{id}/delete",
    tag = "Disposition",
    params(("id" = Uuid, Path, description = "Vehicle id")),
    responses((status = 303, description = "Deleted; redirect to /vehicles"), (status = 404, description = "Unknown vehicle")),
    security(("bearerAuth" = []))
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<SeeOther> {
    let vehicle = vehicle_by_id(&state.pool, id).await?;

    sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    state
        .audit
        .append_all([entry(
            &principal,
            LogAction::Delete,
            format!("{} deleted the vehicle '{}'.", principal.handle(), vehicle.details.license_plate),
            &headers,
        )
        .about(&vehicle)])
        .await;

    see_other("/vehicles")
}
