use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{LogTarget, Loggable};
use crate::authz::{Consent, RoleRef};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Loggable for User {
    fn log_target(&self) -> LogTarget {
        LogTarget::User(self.id)
    }
}

#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            username: value.username,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

/// Directory row: a user with the role they currently hold.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListing {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: RoleRef,
}

/// The "advanced" part of a user: consents, role and public profile fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    pub user_id: Uuid,
    pub role: RoleRef,
    pub consent: Consent,
    pub biography: Option<String>,
    /// One of [`PROFILE_PICTURES`], or none.
    pub picture: Option<String>,
    #[serde(flatten)]
    pub social: SocialHandles,
}

/// Avatar keys a user can pick for their account.
pub const PROFILE_PICTURES: [&str; 12] = [
    "avatar-01", "avatar-02", "avatar-03", "avatar-04", "avatar-05", "avatar-06", "avatar-07", "avatar-08",
    "avatar-09", "avatar-10", "avatar-11", "avatar-12",
];

/// Handles on external networks, one `<network>_username` column each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SocialHandles {
    pub discord_username: Option<String>,
    pub epicgames_username: Option<String>,
    pub facebook_username: Option<String>,
    pub instagram_username: Option<String>,
    pub linkedin_username: Option<String>,
    pub pinterest_username: Option<String>,
    pub playstation_username: Option<String>,
    pub reddit_username: Option<String>,
    pub snapchat_username: Option<String>,
    pub steam_username: Option<String>,
    pub threads_username: Option<String>,
    pub tiktok_username: Option<String>,
    pub twitter_username: Option<String>,
    pub xbox_username: Option<String>,
    pub xing_username: Option<String>,
    pub youtube_username: Option<String>,
}

impl SocialHandles {
    pub const COLUMNS: [&'static str; 16] = [
        "discord_username",
        "epicgames_username",
        "facebook_username",
        "instagram_username",
        "linkedin_username",
        "pinterest_username",
        "playstation_username",
        "reddit_username",
        "snapchat_username",
        "steam_username",
        "threads_username",
        "tiktok_username",
        "twitter_username",
        "xbox_username",
        "xing_username",
        "youtube_username",
    ];

    /// Values in [`Self::COLUMNS`] order.
    pub fn values(&self) -> [&Option<String>; 16] {
        [
            &self.discord_username,
            &self.epicgames_username,
            &self.facebook_username,
            &self.instagram_username,
            &self.linkedin_username,
            &self.pinterest_username,
            &self.playstation_username,
            &self.reddit_username,
            &self.snapchat_username,
            &self.steam_username,
            &self.threads_username,
            &self.tiktok_username,
            &self.twitter_username,
            &self.xbox_username,
            &self.xing_username,
            &self.youtube_username,
        ]
    }

    /// Trims every handle; blank ones become `None`.
    pub fn normalized(self) -> Self {
        let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            discord_username: clean(self.discord_username),
            epicgames_username: clean(self.epicgames_username),
            facebook_username: clean(self.facebook_username),
            instagram_username: clean(self.instagram_username),
            linkedin_username: clean(self.linkedin_username),
            pinterest_username: clean(self.pinterest_username),
            playstation_username: clean(self.playstation_username),
            reddit_username: clean(self.reddit_username),
            snapchat_username: clean(self.snapchat_username),
            steam_username: clean(self.steam_username),
            threads_username: clean(self.threads_username),
            tiktok_username: clean(self.tiktok_username),
            twitter_username: clean(self.twitter_username),
            xbox_username: clean(self.xbox_username),
            xing_username: clean(self.xing_username),
            youtube_username: clean(self.youtube_username),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProfileForm {
    pub biography: Option<String>,
    #[serde(flatten)]
    pub social: SocialHandles,
}

/// Account settings: the identity fields plus the avatar choice.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccountForm {
    #[schema(example = "ada")]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    /// Empty clears the picture.
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "Ada")]
    #[serde(default)]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    #[serde(default)]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_trimmed_and_blanks_dropped() {
        let handles = SocialHandles {
            steam_username: Some("  gaben ".into()),
            xing_username: Some("   ".into()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(handles.steam_username.as_deref(), Some("gaben"));
        assert_eq!(handles.xing_username, None);
    }

    #[test]
    fn columns_line_up_with_values() {
        let handles = SocialHandles {
            tiktok_username: Some("ada".into()),
            ..Default::default()
        };
        let set: Vec<&str> = SocialHandles::COLUMNS
            .iter()
            .zip(handles.values())
            .filter(|(_, value)| value.is_some())
            .map(|(column, _)| *column)
            .collect();
        assert_eq!(set, vec!["tiktok_username"]);
    }

    #[test]
    fn profile_serializes_handles_inline() {
        let profile = Profile {
            user_id: Uuid::nil(),
            role: RoleRef {
                id: Uuid::nil(),
                name: "Standard".into(),
            },
            consent: Consent::default(),
            biography: None,
            picture: Some("avatar-03".into()),
            social: SocialHandles {
                reddit_username: Some("ada".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(profile).unwrap();
        assert_eq!(json["reddit_username"], "ada");
        assert!(json["youtube_username"].is_null());
        assert_eq!(json["picture"], "avatar-03");
    }
}
