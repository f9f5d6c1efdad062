//! Issue data model for civiq
//!
//! An Issue is a citizen-reported civic problem. Category, priority and
//! status are closed vocabularies; the wire field names follow the JSON
//! contract of the public API (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Roads,
    Sanitation,
    Electricity,
    Water,
    Traffic,
    Environment,
    #[default]
    Other,
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "roads" => Ok(Category::Roads),
            "sanitation" => Ok(Category::Sanitation),
            "electricity" => Ok(Category::Electricity),
            "water" => Ok(Category::Water),
            "traffic" => Ok(Category::Traffic),
            "environment" => Ok(Category::Environment),
            "other" => Ok(Category::Other),
            _ => Err(crate::Error::InvalidCategory(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Roads => write!(f, "roads"),
            Category::Sanitation => write!(f, "sanitation"),
            Category::Electricity => write!(f, "electricity"),
            Category::Water => write!(f, "water"),
            Category::Traffic => write!(f, "traffic"),
            Category::Environment => write!(f, "environment"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// Issue priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(crate::Error::InvalidPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Administrative status of an issue
///
/// Set to `New` at creation and moved by staff from there. There is no
/// soft-delete state; deletion removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    New,
    InProgress,
    Resolved,
    Closed,
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Status::New),
            "in_progress" | "in-progress" | "inprogress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            "closed" => Ok(Status::Closed),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::New => write!(f, "new"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Resolved => write!(f, "resolved"),
            Status::Closed => write!(f, "closed"),
        }
    }
}

/// Geographic point attached to a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A citizen-reported civic issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique identifier (civ-xxxxxxxx), immutable
    pub id: String,

    /// Short summary of the problem
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Reporter-chosen category
    #[serde(default)]
    pub category: Category,

    /// Reporter-chosen priority
    #[serde(default)]
    pub priority: Priority,

    /// Administrative status, starts at `new`
    #[serde(default)]
    pub status: Status,

    /// Administrative region
    pub state: String,

    /// Sub-region of the state
    pub district: String,

    /// Free-text location description
    pub location: String,

    /// Optional lat/lng pair from the reporter's device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    /// Locator of the stored photo, if one was uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Reporting user, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,

    /// Department the issue was assigned to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    /// AI-suggested category; written only by the classification path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_category: Option<Category>,

    /// AI confidence score, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<u8>,

    /// When the issue was reported
    pub created_at: DateTime<Utc>,

    /// When the issue was last mutated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an issue
///
/// Category and priority arrive as strings and are validated against the
/// vocabularies before anything is written. Status and AI fields cannot be
/// set at creation.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub state: String,
    pub district: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub image_url: Option<String>,
}

impl NewIssue {
    /// Validate required text fields and vocabulary values.
    ///
    /// Returns the parsed category and priority on success.
    pub fn validate(&self) -> crate::Result<(Category, Priority)> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("state", &self.state)?;
        require_text("district", &self.district)?;
        require_text("location", &self.location)?;
        let category: Category = self.category.parse()?;
        let priority: Priority = self.priority.parse()?;
        Ok((category, priority))
    }
}

/// Partial update to an issue
///
/// Every field is optional; vocabulary fields are re-validated against the
/// same vocabularies as creation before anything is applied. Only the
/// classification path writes the AI fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssue {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl Issue {
    /// Build a freshly reported issue.
    ///
    /// Status is forced to `new` and both timestamps share one instant, so
    /// `created_at == updated_at` holds at creation.
    pub fn new(id: String, input: NewIssue, category: Category, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: input.title,
            description: input.description,
            category,
            priority,
            status: Status::New,
            state: input.state,
            district: input.district,
            location: input.location,
            coordinates: input.coordinates,
            image_url: input.image_url,
            reported_by: None,
            assigned_to: None,
            ai_category: None,
            ai_confidence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    ///
    /// All provided fields are validated before the first assignment, so a
    /// rejected update leaves the issue untouched. `updated_at` is always
    /// refreshed on success.
    pub fn apply_update(&mut self, updates: UpdateIssue) -> crate::Result<()> {
        let category = updates
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()?;
        let priority = updates
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?;
        let status = updates
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?;
        for (field, value) in [
            ("title", &updates.title),
            ("description", &updates.description),
            ("state", &updates.state),
            ("district", &updates.district),
            ("location", &updates.location),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }

        if let Some(category) = category {
            self.category = category;
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(title) = updates.title {
            self.title = title;
        }
        if let Some(description) = updates.description {
            self.description = description;
        }
        if let Some(state) = updates.state {
            self.state = state;
        }
        if let Some(district) = updates.district {
            self.district = district;
        }
        if let Some(location) = updates.location {
            self.location = location;
        }
        if let Some(coordinates) = updates.coordinates {
            self.coordinates = Some(coordinates);
        }
        if let Some(image_url) = updates.image_url {
            self.image_url = Some(image_url);
        }
        if let Some(assigned_to) = updates.assigned_to {
            self.assigned_to = Some(assigned_to);
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {} - {}",
            self.id, self.priority, self.category, self.status, self.title
        )
    }
}

fn require_text(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::Validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_round_trip() {
        for s in [
            "roads", "sanitation", "electricity", "water", "traffic", "environment", "other",
        ] {
            let c: Category = s.parse().unwrap();
            assert_eq!(c.to_string(), s);
        }
        assert!("garbage".parse::<Category>().is_err());
        assert!("urgent".parse::<Priority>().is_err());
        assert!("done".parse::<Status>().is_err());
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
    }

    #[test]
    fn test_missing_vocab_fields_deserialize_to_defaults() {
        // A hand-edited record without status/category/priority still lands
        // in known buckets.
        let json = r#"{
            "id": "civ-abc12345",
            "title": "Pothole",
            "description": "Deep pothole near the bus stop",
            "state": "karnataka",
            "district": "Bengaluru Urban",
            "location": "MG Road",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.status, Status::New);
        assert_eq!(issue.category, Category::Other);
        assert_eq!(issue.priority, Priority::Low);
        assert!(issue.ai_category.is_none());
    }

    #[test]
    fn test_apply_update_rejects_bad_vocab_without_mutation() {
        let input = NewIssue {
            title: "Streetlight out".into(),
            description: "Dark stretch on 5th cross".into(),
            category: "electricity".into(),
            priority: "high".into(),
            state: "karnataka".into(),
            district: "Bengaluru Urban".into(),
            location: "5th cross, Indiranagar".into(),
            ..Default::default()
        };
        let (category, priority) = input.validate().unwrap();
        let mut issue = Issue::new("civ-test0001".into(), input, category, priority);
        let before = issue.clone();

        let updates = UpdateIssue {
            title: Some("New title".into()),
            status: Some("finished".into()),
            ..Default::default()
        };
        assert!(matches!(
            issue.apply_update(updates),
            Err(crate::Error::InvalidStatus(_))
        ));
        assert_eq!(issue, before);
    }

    #[test]
    fn test_apply_update_merges_and_refreshes_timestamp() {
        let input = NewIssue {
            title: "Overflowing bin".into(),
            description: "Garbage not collected for a week".into(),
            category: "sanitation".into(),
            priority: "medium".into(),
            state: "kerala".into(),
            district: "Ernakulam".into(),
            location: "Market road".into(),
            ..Default::default()
        };
        let (category, priority) = input.validate().unwrap();
        let mut issue = Issue::new("civ-test0002".into(), input, category, priority);
        let created = issue.created_at;

        issue
            .apply_update(UpdateIssue {
                status: Some("in_progress".into()),
                assigned_to: Some("Sanitation Dept".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(issue.status, Status::InProgress);
        assert_eq!(issue.assigned_to.as_deref(), Some("Sanitation Dept"));
        assert_eq!(issue.title, "Overflowing bin");
        assert_eq!(issue.created_at, created);
        assert!(issue.updated_at >= created);
    }
}
