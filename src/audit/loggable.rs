use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity a log entry points at. Stored as `(target_kind, target_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LogTarget {
    Role(Uuid),
    User(Uuid),
    OfficeSettings(Uuid),
    Station(Uuid),
    Vehicle(Uuid),
    Message(Uuid),
    Salary(Uuid),
}

impl LogTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            LogTarget::Role(_) => "role",
            LogTarget::User(_) => "user",
            LogTarget::OfficeSettings(_) => "office_settings",
            LogTarget::Station(_) => "station",
            LogTarget::Vehicle(_) => "vehicle",
            LogTarget::Message(_) => "message",
            LogTarget::Salary(_) => "salary",
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            LogTarget::Role(id)
            | LogTarget::User(id)
            | LogTarget::OfficeSettings(id)
            | LogTarget::Station(id)
            | LogTarget::Vehicle(id)
            | LogTarget::Message(id)
            | LogTarget::Salary(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "role" => Some(LogTarget::Role(id)),
            "user" => Some(LogTarget::User(id)),
            "office_settings" => Some(LogTarget::OfficeSettings(id)),
            "station" => Some(LogTarget::Station(id)),
            "vehicle" => Some(LogTarget::Vehicle(id)),
            "message" => Some(LogTarget::Message(id)),
            "salary" => Some(LogTarget::Salary(id)),
            _ => None,
        }
    }
}

/// Implemented by models that audit entries can reference.
pub trait Loggable {
    fn log_target(&self) -> LogTarget;
}

impl Loggable for LogTarget {
    fn log_target(&self) -> LogTarget {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_round_trip_for_every_kind() {
        let id = Uuid::new_v4();
        for target in [
            LogTarget::Role(id),
            LogTarget::User(id),
            LogTarget::OfficeSettings(id),
            LogTarget::Station(id),
            LogTarget::Vehicle(id),
            LogTarget::Message(id),
            LogTarget::Salary(id),
        ] {
            assert_eq!(LogTarget::from_parts(target.kind(), target.id()), Some(target));
        }
        assert_eq!(LogTarget::from_parts("tour", id), None);
    }

    #[test]
    fn serializes_as_tagged_pair() {
        let id = Uuid::nil();
        let json = serde_json::to_value(LogTarget::Station(id)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "station", "id": id.to_string()}));
    }
}
