use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubmissionKind {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

/// A submission joined with its kind, submitter and (possibly absent) result.
///
/// `kind_slug` is the subtype discriminator: it selects the form schema that
/// describes the keys stored in `details`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Submission {
    pub id: i32,
    pub kind_id: i32,
    pub kind_name: String,
    pub kind_slug: String,
    pub submitter_id: i32,
    pub submitter_username: String,
    pub submitter_email: String,
    pub title: String,
    pub details: serde_json::Value,
    pub submitted: DateTime<Utc>,
    pub cancelled: bool,
    pub result_status: Option<String>,
}

impl Submission {
    pub fn number(&self) -> String {
        format!("{:03}", self.id)
    }

    /// Status of the result record, `Undecided` if none exists yet.
    pub fn status(&self) -> ResultStatus {
        self.result_status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    /// Context exposed as `submission` to result notification bodies.
    pub fn notification_email_context(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind_name,
            "title": self.title,
            "number": self.number(),
            "status": self.status().as_str(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Accepted,
    Rejected,
    #[default]
    Undecided,
    Standby,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 4] = [
        ResultStatus::Accepted,
        ResultStatus::Rejected,
        ResultStatus::Undecided,
        ResultStatus::Standby,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Undecided => "undecided",
            Self::Standby => "standby",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown result status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ResultStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The named decision operations. Each one sets its status unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    Accept,
    Reject,
    Undecide,
    Standby,
}

impl ResultAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "undecide" => Some(Self::Undecide),
            "standby" => Some(Self::Standby),
            _ => None,
        }
    }

    pub fn target(self) -> ResultStatus {
        match self {
            Self::Accept => ResultStatus::Accepted,
            Self::Reject => ResultStatus::Rejected,
            Self::Undecide => ResultStatus::Undecided,
            Self::Standby => ResultStatus::Standby,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubmissionResult {
    pub id: i32,
    pub submission_id: i32,
    pub status: String,
}

impl SubmissionResult {
    pub fn status(&self) -> ResultStatus {
        self.status.parse().unwrap_or_default()
    }

    pub fn accepted(&self) -> bool {
        self.status() == ResultStatus::Accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOrigin {
    AutoAssignedInitial,
    OptIn,
    AutoAssignedLater,
}

impl AssignmentOrigin {
    pub fn code(self) -> i32 {
        match self {
            Self::AutoAssignedInitial => 0,
            Self::OptIn => 1,
            Self::AutoAssignedLater => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::AutoAssignedInitial),
            1 => Some(Self::OptIn),
            2 => Some(Self::AutoAssignedLater),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AutoAssignedInitial => "auto-assigned, initial",
            Self::OptIn => "opted-in",
            Self::AutoAssignedLater => "auto-assigned, later",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewAssignment {
    pub id: i32,
    pub submission_id: i32,
    pub user_id: i32,
    pub origin: i32,
    pub assigned_at: DateTime<Utc>,
    pub opted_out: bool,
}

impl ReviewAssignment {
    pub fn origin(&self) -> Option<AssignmentOrigin> {
        AssignmentOrigin::from_code(self.origin)
    }
}

/// An assignment row with the title of its submission, for reviewer pages.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentListing {
    pub id: i32,
    pub submission_id: i32,
    pub submission_title: String,
    pub kind_name: String,
    pub origin: i32,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: i32,
    pub submission_id: i32,
    pub user_id: i32,
    pub username: String,
    pub comment: String,
    pub comment_html: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i32,
    pub submission_id: i32,
    pub commenter_id: i32,
    pub username: String,
    pub text: String,
    pub text_html: String,
    pub public: bool,
    pub commented_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubmissionMessage {
    pub id: i32,
    pub submission_id: i32,
    pub user_id: i32,
    pub username: String,
    pub message: String,
    pub message_html: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationTemplate {
    pub id: i32,
    pub label: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResultNotification {
    pub id: i32,
    pub submission_id: i32,
    pub template_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SupportingDocument {
    pub id: i32,
    pub submission_id: i32,
    pub uploaded_by: i32,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
    pub description: String,
}

impl SupportingDocument {
    pub fn file_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or(&self.file_path)
    }

    pub fn download_url(&self) -> String {
        format!("/document/{}/{}", self.id, self.file_name().to_lowercase())
    }
}
