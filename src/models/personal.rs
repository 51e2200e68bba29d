use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NoteForm {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub color: Option<String>,
}

/// One payslip. Amounts are in cents.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Salary {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `YYYY-MM`
    #[schema(example = "2025-01")]
    pub period: String,
    pub gross_cents: i64,
    pub net_cents: i64,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmSalaryForm {
    pub salary_id: Uuid,
}

/// Sections of the personal record reachable under `/personal/{section}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordSection {
    Meta,
    Address,
    Health,
    Criminal,
    Work,
    Absence,
    Performance,
    Reprimand,
}

impl RecordSection {
    pub const ALL: [RecordSection; 8] = [
        RecordSection::Meta,
        RecordSection::Address,
        RecordSection::Health,
        RecordSection::Criminal,
        RecordSection::Work,
        RecordSection::Absence,
        RecordSection::Performance,
        RecordSection::Reprimand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSection::Meta => "meta",
            RecordSection::Address => "address",
            RecordSection::Health => "health",
            RecordSection::Criminal => "criminal",
            RecordSection::Work => "work",
            RecordSection::Absence => "absence",
            RecordSection::Performance => "performance",
            RecordSection::Reprimand => "reprimand",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RecordSection::Meta => "Personal details",
            RecordSection::Address => "Address",
            RecordSection::Health => "Health",
            RecordSection::Criminal => "Criminal record",
            RecordSection::Work => "Employment",
            RecordSection::Absence => "Absences",
            RecordSection::Performance => "Performance",
            RecordSection::Reprimand => "Reprimands",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_parse_by_path_name() {
        for section in RecordSection::ALL {
            assert_eq!(RecordSection::parse(section.as_str()), Some(section));
        }
        assert_eq!(RecordSection::parse("salary"), None);
        assert_eq!(RecordSection::parse("Meta"), None);
    }
}
