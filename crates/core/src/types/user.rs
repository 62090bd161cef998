//! User profile returned by the auth service.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Profile of the logged-in user.
///
/// Cached alongside the session token so the account name can be shown
/// before any network round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl UserProfile {
    /// Name to greet the user with, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_roundtrip_keeps_id_key() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"_id":"u1","name":"Jane","email":"jane@kreg.market"}"#)
                .unwrap();
        assert_eq!(profile.id, Some(UserId::new("u1")));
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains(r#""_id":"u1""#));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let profile = UserProfile {
            id: None,
            name: String::new(),
            email: "jane@kreg.market".to_string(),
        };
        assert_eq!(profile.display_name(), "jane@kreg.market");
    }
}
