use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogTarget, Loggable};
use crate::errors::{AppResult, Validator};
use crate::utils::non_empty;

// =============================================================================
// STATION
// =============================================================================

/// Editable part of a station. Two stations with equal details are equal for
/// update purposes: saving the same values is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StationDetails {
    pub name: String,
    pub contact_mail: Option<String>,
    pub contact_phone: Option<String>,
    pub capacity: Option<i64>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub location: Option<String>,
    pub street: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Station {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: StationDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Station {
    fn log_target(&self) -> LogTarget {
        LogTarget::Station(self.id)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StationForm {
    pub name: String,
    pub contact_mail: Option<String>,
    pub contact_phone: Option<String>,
    /// Whole number; empty means unknown.
    pub capacity: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub location: Option<String>,
    pub street: Option<String>,
}

impl StationForm {
    pub fn validate(self) -> AppResult<StationDetails> {
        let name = self.name.trim().to_string();
        let capacity = non_empty(self.capacity);
        let parsed_capacity = capacity.as_deref().map(str::parse::<i64>);
        let contact_mail = non_empty(self.contact_mail);

        let mut v = Validator::new();
        v.check(!name.is_empty(), "name", "this field is required")
            .check(name.chars().count() <= 128, "name", "at most 128 characters")
            .check(
                contact_mail.as_deref().map_or(true, |m| m.contains('@')),
                "contact_mail",
                "enter a valid email address",
            )
            .check(
                parsed_capacity.as_ref().map_or(true, |c| matches!(c, Ok(n) if *n >= 0)),
                "capacity",
                "enter a whole number",
            );
        v.finish()?;

        Ok(StationDetails {
            name,
            contact_mail,
            contact_phone: non_empty(self.contact_phone),
            capacity: parsed_capacity.and_then(Result::ok),
            country: non_empty(self.country),
            state: non_empty(self.state),
            location: non_empty(self.location),
            street: non_empty(self.street),
        })
    }
}

// =============================================================================
// VEHICLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VehicleDetails {
    pub license_plate: String,
    pub name: String,
    pub vehicle_type: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year_of_manufacture: Option<i64>,
    pub vin: Option<String>,
    pub capacity: Option<i64>,
    pub fuel_type: Option<String>,
    pub condition: Option<String>,
    pub station_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Vehicle {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: VehicleDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Vehicle {
    fn log_target(&self) -> LogTarget {
        LogTarget::Vehicle(self.id)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VehicleForm {
    pub license_plate: String,
    pub name: String,
    pub vehicle_type: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub year_of_manufacture: Option<String>,
    pub vin: Option<String>,
    pub capacity: Option<String>,
    pub fuel_type: Option<String>,
    pub condition: Option<String>,
    /// Station the vehicle is based at; empty for none.
    pub station_id: Option<String>,
}

impl VehicleForm {
    pub fn validate(self) -> AppResult<VehicleDetails> {
        let license_plate = self.license_plate.trim().to_uppercase();
        let name = self.name.trim().to_string();
        let year = non_empty(self.year_of_manufacture).map(|y| y.parse::<i64>());
        let capacity = non_empty(self.capacity).map(|c| c.parse::<i64>());
        let station_id = non_empty(self.station_id).map(|s| Uuid::parse_str(&s));

        let mut v = Validator::new();
        v.check(!license_plate.is_empty(), "license_plate", "this field is required")
            .check(license_plate.len() <= 16, "license_plate", "at most 16 characters")
            .check(!name.is_empty(), "name", "this field is required")
            .check(
                matches!(year, None | Some(Ok(1900..=2100))),
                "year_of_manufacture",
                "enter a year between 1900 and 2100",
            )
            .check(
                capacity.as_ref().map_or(true, |c| matches!(c, Ok(n) if *n >= 0)),
                "capacity",
                "enter a whole number",
            )
            .check(
                matches!(station_id, None | Some(Ok(_))),
                "station_id",
                "select a valid station",
            );
        v.finish()?;

        Ok(VehicleDetails {
            license_plate,
            name,
            vehicle_type: non_empty(self.vehicle_type),
            model: non_empty(self.model),
            manufacturer: non_empty(self.manufacturer),
            year_of_manufacture: year.and_then(Result::ok),
            vin: non_empty(self.vin),
            capacity: capacity.and_then(Result::ok),
            fuel_type: non_empty(self.fuel_type),
            condition: non_empty(self.condition),
            station_id: station_id.and_then(Result::ok),
        })
    }
}

// =============================================================================
// TOUR
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
