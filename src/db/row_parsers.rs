//! Row -> model conversions for runtime-checked queries.
//!
//! Ids are stored as TEXT and timestamps either as RFC3339 (written by the
//! application) or in SQLite's `CURRENT_TIMESTAMP` format, so both are
//! accepted here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};
use uuid::Uuid;

use crate::audit::{LogTarget, RequestContext};
use crate::authz::{Consent, RoleRef};
use crate::errors::AppError;
use crate::models::communication::{Announcement, Message};
use crate::models::disposition::{Station, StationDetails, Tour, Vehicle, VehicleDetails};
use crate::models::log::LogEntry;
use crate::models::office::OfficeSettings;
use crate::models::personal::{Note, Salary};
use crate::models::role::{Permission, Role};
use crate::models::user::{DbUser, Profile, SocialHandles, UserListing};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format, optional fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_uuid(s: String) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid {s:?}: {e}")))
}

pub fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_uuid(s)?)),
        _ => Ok(None),
    }
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

fn uuid_col(row: &SqliteRow, name: &str) -> Result<Uuid, AppError> {
    parse_uuid(col(row, name)?)
}

fn opt_uuid_col(row: &SqliteRow, name: &str) -> Result<Option<Uuid>, AppError> {
    parse_opt_uuid(col(row, name)?)
}

fn datetime_col(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = col(row, name)?;
    parse_datetime(&raw)
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    Ok(DbUser {
        id: uuid_col(row, "id")?,
        username: col(row, "username")?,
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        created_at: datetime_col(row, "created_at")?,
    })
}

/// Expects `id, username, first_name, last_name, role_id, role_name`.
pub fn user_listing_from_row(row: &SqliteRow) -> Result<UserListing, AppError> {
    Ok(UserListing {
        id: uuid_col(row, "id")?,
        username: col(row, "username")?,
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        role: RoleRef {
            id: uuid_col(row, "role_id")?,
            name: col(row, "role_name")?,
        },
    })
}

/// Expects the profile columns plus `role_name`.
pub fn profile_from_row(row: &SqliteRow) -> Result<Profile, AppError> {
    Ok(Profile {
        user_id: uuid_col(row, "user_id")?,
        role: RoleRef {
            id: uuid_col(row, "role_id")?,
            name: col(row, "role_name")?,
        },
        consent: Consent {
            privacy: col(row, "privacy")?,
            terms: col(row, "terms")?,
            copyright: col(row, "copyright")?,
        },
        biography: col(row, "biography")?,
        picture: col(row, "picture")?,
        social: SocialHandles {
            discord_username: col(row, "discord_username")?,
            epicgames_username: col(row, "epicgames_username")?,
            facebook_username: col(row, "facebook_username")?,
            instagram_username: col(row, "instagram_username")?,
            linkedin_username: col(row, "linkedin_username")?,
            pinterest_username: col(row, "pinterest_username")?,
            playstation_username: col(row, "playstation_username")?,
            reddit_username: col(row, "reddit_username")?,
            snapchat_username: col(row, "snapchat_username")?,
            steam_username: col(row, "steam_username")?,
            threads_username: col(row, "threads_username")?,
            tiktok_username: col(row, "tiktok_username")?,
            twitter_username: col(row, "twitter_username")?,
            xbox_username: col(row, "xbox_username")?,
            xing_username: col(row, "xing_username")?,
            youtube_username: col(row, "youtube_username")?,
        },
    })
}

pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    Ok(Role {
        id: uuid_col(row, "id")?,
        name: col(row, "name")?,
        color: col(row, "color")?,
        created_at: datetime_col(row, "created_at")?,
        updated_at: datetime_col(row, "updated_at")?,
    })
}

pub fn permission_from_row(row: &SqliteRow) -> Result<Permission, AppError> {
    Ok(Permission {
        id: uuid_col(row, "id")?,
        name: col(row, "name")?,
        description: col(row, "description")?,
    })
}

pub fn log_entry_from_row(row: &SqliteRow) -> Result<LogEntry, AppError> {
    let action: String = col(row, "action")?;
    let category: String = col(row, "category")?;
    let target_kind: Option<String> = col(row, "target_kind")?;
    let target_id = opt_uuid_col(row, "target_id")?;

    let target = match (target_kind, target_id) {
        (Some(kind), Some(id)) => LogTarget::from_parts(&kind, id),
        _ => None,
    };

    Ok(LogEntry {
        seq: col(row, "seq")?,
        id: uuid_col(row, "id")?,
        actor_id: opt_uuid_col(row, "actor_id")?,
        actor_name: col(row, "actor_name")?,
        action: action.parse()?,
        category: category.parse()?,
        message: col(row, "message")?,
        target,
        context: RequestContext {
            ip: col(row, "ip")?,
            user_agent: col(row, "user_agent")?,
        },
        created_at: datetime_col(row, "created_at")?,
    })
}

pub fn office_settings_from_row(row: &SqliteRow) -> Result<OfficeSettings, AppError> {
    Ok(OfficeSettings {
        id: uuid_col(row, "id")?,
        app: col(row, "app")?,
        logo: col(row, "logo")?,
        updated_at: datetime_col(row, "updated_at")?,
    })
}

pub fn station_from_row(row: &SqliteRow) -> Result<Station, AppError> {
    Ok(Station {
        id: uuid_col(row, "id")?,
        details: StationDetails {
            name: col(row, "name")?,
            contact_mail: col(row, "contact_mail")?,
            contact_phone: col(row, "contact_phone")?,
            capacity: col(row, "capacity")?,
            country: col(row, "country")?,
            state: col(row, "state")?,
            location: col(row, "location")?,
            street: col(row, "street")?,
        },
        created_at: datetime_col(row, "created_at")?,
        updated_at: datetime_col(row, "updated_at")?,
    })
}

pub fn vehicle_from_row(row: &SqliteRow) -> Result<Vehicle, AppError> {
    Ok(Vehicle {
        id: uuid_col(row, "id")?,
        details: VehicleDetails {
            license_plate: col(row, "license_plate")?,
            name: col(row, "name")?,
            vehicle_type: col(row, "vehicle_type")?,
            model: col(row, "model")?,
            manufacturer: col(row, "manufacturer")?,
            year_of_manufacture: col(row, "year_of_manufacture")?,
            vin: col(row, "vin")?,
            capacity: col(row, "capacity")?,
            fuel_type: col(row, "fuel_type")?,
            condition: col(row, "condition")?,
            station_id: opt_uuid_col(row, "station_id")?,
        },
        created_at: datetime_col(row, "created_at")?,
        updated_at: datetime_col(row, "updated_at")?,
    })
}

pub fn tour_from_row(row: &SqliteRow) -> Result<Tour, AppError> {
    Ok(Tour {
        id: uuid_col(row, "id")?,
        name: col(row, "name")?,
        description: col(row, "description")?,
        vehicle_id: opt_uuid_col(row, "vehicle_id")?,
        created_at: datetime_col(row, "created_at")?,
    })
}

pub fn note_from_row(row: &SqliteRow) -> Result<Note, AppError> {
    Ok(Note {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        title: col(row, "title")?,
        content: col(row, "content")?,
        color: col(row, "color")?,
        created_at: datetime_col(row, "created_at")?,
        updated_at: datetime_col(row, "updated_at")?,
    })
}

pub fn salary_from_row(row: &SqliteRow) -> Result<Salary, AppError> {
    let confirmed_at: Option<String> = col(row, "confirmed_at")?;
    Ok(Salary {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        period: col(row, "period")?,
        gross_cents: col(row, "gross_cents")?,
        net_cents: col(row, "net_cents")?,
        confirmed: col(row, "confirmed")?,
        confirmed_at: confirmed_at.as_deref().map(parse_datetime).transpose()?,
        created_at: datetime_col(row, "created_at")?,
    })
}

/// Expects the announcement columns plus a boolean `read` for the viewer.
pub fn announcement_from_row(row: &SqliteRow) -> Result<Announcement, AppError> {
    Ok(Announcement {
        id: uuid_col(row, "id")?,
        title: col(row, "title")?,
        body: col(row, "body")?,
        author_id: opt_uuid_col(row, "author_id")?,
        created_at: datetime_col(row, "created_at")?,
        read: col(row, "read")?,
    })
}

/// Expects the message columns plus `sender_name`.
pub fn message_from_row(row: &SqliteRow) -> Result<Message, AppError> {
    Ok(Message {
        id: uuid_col(row, "id")?,
        sender_id: uuid_col(row, "sender_id")?,
        sender_name: col(row, "sender_name")?,
        receiver_id: uuid_col(row, "receiver_id")?,
        subject: col(row, "subject")?,
        body: col(row, "body")?,
        receiver_read: col(row, "receiver_read")?,
        created_at: datetime_col(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_accepts_rfc3339_and_sqlite_formats() {
        let a = parse_datetime("2025-01-02T03:04:05Z").unwrap();
        let b = parse_datetime("2025-01-02 03:04:05").unwrap();
        let c = parse_datetime("2025-01-02T03:04:05.123456Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.timestamp(), c.timestamp());
        assert_eq!(parse_datetime("2025-01-02").unwrap().format("%H:%M").to_string(), "00:00");
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn empty_optional_uuid_is_none() {
        assert_eq!(parse_opt_uuid(Some(String::new())).unwrap(), None);
        assert_eq!(parse_opt_uuid(None).unwrap(), None);
        assert!(parse_uuid("nope".to_string()).is_err());
    }
}
