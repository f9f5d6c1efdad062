//! Comment data model
//!
//! Comments hang off an issue and are append-only: there is no edit or
//! delete operation, only creation and chronological listing. Internal
//! comments are staff notes the public frontend would hide; the flag is
//! stored here and interpretation is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment attached to an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Unique identifier (cmt-xxxxxxxx)
    pub id: String,

    /// Owning issue id
    pub issue_id: String,

    /// Commenting user, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Comment body
    pub content: String,

    /// Staff-only note, hidden from citizen views
    #[serde(default)]
    pub is_internal: bool,

    /// When the comment was posted
    pub created_at: DateTime<Utc>,
}

/// Input for posting a comment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_internal: bool,
}

impl NewComment {
    pub fn validate(&self) -> crate::Result<()> {
        if self.content.trim().is_empty() {
            return Err(crate::Error::Validation(
                "content must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Comment {
    pub fn new(id: String, issue_id: String, input: NewComment) -> Self {
        Self {
            id,
            issue_id,
            user_id: input.user_id,
            content: input.content,
            is_internal: input.is_internal,
            created_at: Utc::now(),
        }
    }
}
