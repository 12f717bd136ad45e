//! Todo record and the request bodies that create or change one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::http::response::ApiError;

pub const VALID_PRIORITIES: [&str; 3] = ["low", "medium", "high"];
pub const VALID_STATUSES: [&str; 3] = ["pending", "in_progress", "completed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort weight; higher sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "in_progress" => Ok(Status::InProgress),
            "completed" => Ok(Status::Completed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new record.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Validated full update. Absent fields are left alone;
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TodoUpdate {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoBody {
    pub text: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

impl CreateTodoBody {
    pub fn validate(self) -> Result<NewTodo, ApiError> {
        let text = self
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::bad_request("Text is required"))?
            .to_string();

        let priority = match self.priority.as_deref() {
            None => Priority::default(),
            Some(p) => parse_priority(p)?,
        };

        let due_date = self.due_date.as_deref().map(parse_due_date).transpose()?;

        Ok(NewTodo {
            text,
            priority,
            due_date,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoBody {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<String>>,
}

impl UpdateTodoBody {
    pub fn validate(self) -> Result<TodoUpdate, ApiError> {
        let text = match self.text {
            Some(text) if text.trim().is_empty() => {
                return Err(ApiError::bad_request("Text is required")
                    .with_message("Text must be a non-empty string"));
            }
            Some(text) => Some(text.trim().to_string()),
            None => None,
        };

        Ok(TodoUpdate {
            text,
            completed: self.completed,
            priority: self.priority.as_deref().map(parse_priority).transpose()?,
            status: self.status.as_deref().map(parse_status).transpose()?,
            due_date: match self.due_date {
                None => None,
                Some(None) => Some(None),
                Some(Some(raw)) => Some(Some(parse_due_date(&raw)?)),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PatchTodoBody {
    pub completed: Option<bool>,
    pub status: Option<String>,
}

impl PatchTodoBody {
    /// Empty status strings count as absent.
    pub fn validate(self) -> Result<(Option<bool>, Option<Status>), ApiError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(parse_status)
            .transpose()?;
        Ok((self.completed, status))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

pub fn parse_priority(raw: &str) -> Result<Priority, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("Invalid priority value")
            .with_message("Priority must be one of: low, medium, high")
            .with_field("validPriorities", serde_json::json!(VALID_PRIORITIES))
    })
}

pub fn parse_status(raw: &str) -> Result<Status, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("Invalid status value")
            .with_message("Status must be one of: pending, in_progress, completed")
            .with_field("validStatuses", serde_json::json!(VALID_STATUSES))
    })
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            ApiError::bad_request("Invalid dueDate")
                .with_message("dueDate must be an ISO 8601 date or timestamp")
        })
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_trims_and_defaults() {
        let body: CreateTodoBody = serde_json::from_str(r#"{"text":"  buy milk  "}"#).unwrap();
        let todo = body.validate().unwrap();
        assert_eq!(todo.text, "buy milk");
        assert_eq!(todo.priority, Priority::Medium);
        assert!(todo.due_date.is_none());
    }

    #[test]
    fn blank_text_is_rejected() {
        for raw in [r#"{}"#, r#"{"text":""}"#, r#"{"text":"   "}"#] {
            let body: CreateTodoBody = serde_json::from_str(raw).unwrap();
            let err = body.validate().unwrap_err();
            assert!(matches!(err, ApiError::BadRequest { ref error, .. } if error == "Text is required"));
        }
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let body: CreateTodoBody =
            serde_json::from_str(r#"{"text":"x","priority":"urgent"}"#).unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn due_date_accepts_date_only() {
        let dt = parse_due_date("2025-11-10").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-11-10T00:00:00+00:00");
        assert!(parse_due_date("2025-11-10T23:59:59.000Z").is_ok());
        assert!(parse_due_date("next tuesday").is_err());
    }

    #[test]
    fn update_distinguishes_null_from_missing() {
        let body: UpdateTodoBody = serde_json::from_str(r#"{"dueDate":null}"#).unwrap();
        assert_eq!(body.validate().unwrap().due_date, Some(None));

        let body: UpdateTodoBody = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        let update = body.validate().unwrap();
        assert_eq!(update.due_date, None);
        assert_eq!(update.completed, Some(true));
    }

    #[test]
    fn serializes_camel_case_with_null_due_date() {
        let now = Utc::now();
        let todo = Todo {
            id: "a".into(),
            text: "t".into(),
            completed: false,
            priority: Priority::High,
            status: Status::InProgress,
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["priority"], "high");
        assert!(value["dueDate"].is_null());
        assert!(value["createdAt"].is_string());
    }
}
