//! User data model
//!
//! Users exist as link targets for `reported_by` and comment attribution.
//! There is no authentication and no public user API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default role for a registered reporter
pub const DEFAULT_ROLE: &str = "citizen";

/// A registered reporter or staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier (usr-xxxxxxxx)
    pub id: String,

    /// Login-style handle, unique per deployment
    pub username: String,

    /// Contact address, when given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Free-text role, `citizen` unless set otherwise
    #[serde(default = "default_role")]
    pub role: String,

    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

impl User {
    pub fn new(id: String, username: String) -> Self {
        Self {
            id,
            username,
            email: None,
            role: default_role(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults_to_citizen() {
        let u = User::new("usr-abc12345".into(), "asha".into());
        assert_eq!(u.role, "citizen");

        let json = r#"{
            "id": "usr-abc12345",
            "username": "asha",
            "createdAt": "2025-01-01T00:00:00Z"
        }"#;
        let parsed: User = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.role, "citizen");
    }
}
