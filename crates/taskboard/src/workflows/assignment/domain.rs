use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 255;

/// Identifier wrapper for posted tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

/// Identifier of an authenticated user, issued by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role claim attached to the authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

/// The acting identity for a workflow call. Business logic never reads session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub const fn student(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Student,
        }
    }

    pub const fn teacher(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Teacher,
        }
    }
}

/// Level of study a task is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeOfStudy {
    Professional,
    Undergraduate,
    Graduate,
}

impl TypeOfStudy {
    pub const ALL: [TypeOfStudy; 3] = [
        TypeOfStudy::Professional,
        TypeOfStudy::Undergraduate,
        TypeOfStudy::Graduate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TypeOfStudy::Professional => "PROFESSIONAL",
            TypeOfStudy::Undergraduate => "UNDERGRADUATE",
            TypeOfStudy::Graduate => "GRADUATE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw.trim())
    }
}

/// Lifecycle of an application. ACCEPTED and REJECTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Events a teacher can apply to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEvent {
    Accept,
    Reject,
}

impl ApplicationEvent {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationEvent::Accept => "accept",
            ApplicationEvent::Reject => "reject",
        }
    }
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when an event is applied to an application in a state that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {event} an application that is {from}")]
pub struct InvalidTransition {
    pub from: ApplicationStatus,
    pub event: ApplicationEvent,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    /// Only PENDING -> ACCEPTED and PENDING -> REJECTED are legal.
    pub const fn transition(self, event: ApplicationEvent) -> Result<Self, InvalidTransition> {
        match (self, event) {
            (ApplicationStatus::Pending, ApplicationEvent::Accept) => {
                Ok(ApplicationStatus::Accepted)
            }
            (ApplicationStatus::Pending, ApplicationEvent::Reject) => {
                Ok(ApplicationStatus::Rejected)
            }
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A unit of work posted by a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(rename = "titleEng")]
    pub title_eng: String,
    pub description: String,
    pub type_of_study: TypeOfStudy,
    pub owner_id: UserId,
    pub assignee_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Assigned tasks no longer accept applications.
    pub fn is_open(&self) -> bool {
        self.assignee_id.is_none()
    }
}

/// A student's request to be assigned a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unvalidated task creation payload as posted by the teacher form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "titleEng")]
    pub title_eng: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub type_of_study: Option<String>,
}

/// Validated fields ready to be persisted as a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub title_eng: String,
    pub description: String,
    pub type_of_study: TypeOfStudy,
    pub owner_id: UserId,
}

/// Per-field validation messages keyed by the form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl TaskDraft {
    /// Check the draft against the creation rules and bind it to its owner.
    pub fn validate(self, owner_id: UserId) -> Result<NewTask, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = required_text(&mut errors, "title", self.title, Some(MAX_TITLE_CHARS));
        let title_eng = required_text(
            &mut errors,
            "titleEng",
            self.title_eng,
            Some(MAX_TITLE_CHARS),
        );
        let description = required_text(&mut errors, "description", self.description, None);

        let type_of_study = match self.type_of_study.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("type_of_study", "The type of study field is required.");
                None
            }
            Some(raw) => {
                let parsed = TypeOfStudy::parse(raw);
                if parsed.is_none() {
                    errors.add(
                        "type_of_study",
                        "The type of study must be one of PROFESSIONAL, UNDERGRADUATE, GRADUATE.",
                    );
                }
                parsed
            }
        };

        match (title, title_eng, description, type_of_study) {
            (Some(title), Some(title_eng), Some(description), Some(type_of_study))
                if errors.is_empty() =>
            {
                Ok(NewTask {
                    title,
                    title_eng,
                    description,
                    type_of_study,
                    owner_id,
                })
            }
            _ => Err(errors),
        }
    }
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<String>,
    max_chars: Option<usize>,
) -> Option<String> {
    let value = value.map(|raw| raw.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, format!("The {field} field is required."));
        return None;
    }
    if let Some(max) = max_chars {
        if value.chars().count() > max {
            errors.add(
                field,
                format!("The {field} field must not be greater than {max} characters."),
            );
            return None;
        }
    }
    Some(value)
}
