use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Languages the assistant can detect and respond in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
    Ja,
    Ko,
    Es,
    Fr,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::En,
        Language::Zh,
        Language::Ja,
        Language::Ko,
        Language::Es,
        Language::Fr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ko => "ko",
            Language::Es => "es",
            Language::Fr => "fr",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = TalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            "ja" => Ok(Language::Ja),
            "ko" => Ok(Language::Ko),
            "es" => Ok(Language::Es),
            "fr" => Ok(Language::Fr),
            other => Err(TalkError::Validation(format!(
                "unsupported language code: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One turn in a conversation transcript, as exchanged with the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationState {
    Pending,
    Result,
}

/// A model-proposed call into the tool registry. The executor for a given
/// `call_id` runs at most once; a replayed invocation carries its stored
/// result instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    pub state: InvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Trial,
    Regular,
}

impl LessonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonType::Trial => "trial",
            LessonType::Regular => "regular",
        }
    }
}

impl FromStr for LessonType {
    type Err = TalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trial" => Ok(LessonType::Trial),
            "regular" => Ok(LessonType::Regular),
            other => Err(TalkError::Validation(format!(
                "unsupported lesson type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

/// A tutor profile as surfaced to the client carousel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_image_url: String,
    pub introduction: String,
    pub teaching_style: String,
    pub languages: Vec<String>,
    pub years_of_experience: u32,
    pub hourly_rate: u32,
}

/// A bookable 60-minute interval, tagged with the session language so the
/// rendering layer needs no extra lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_language: Language,
}

/// The pure outcome of teacher selection, before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub teacher_id: String,
    pub teacher_name: String,
    pub lesson_date_time: DateTime<Utc>,
    pub lesson_type: LessonType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub id: Uuid,
    pub teacher_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: String,
    pub schedule_slot_id: Uuid,
    pub lesson_type: LessonType,
    pub status: BookingStatus,
    pub classroom_link: String,
    pub payment_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status: String,
    pub classroom_link: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the notification sender needs; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationEmail {
    pub recipient: String,
    pub student_name: String,
    pub teacher_name: String,
    pub lesson_date_time: DateTime<Utc>,
    pub lesson_type: LessonType,
    pub classroom_link: String,
    pub language: Language,
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum TalkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No available slot")]
    NoAvailableSlot,

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TalkError>;

// API response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Substitute `{name}`-style placeholders in a message template.
pub fn render_template(template: &str, params: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}
