use crate::calendar::generate_slots;
use crate::faq::FaqClient;
use crate::mailer::Mailer;
use crate::store::{NewBooking, TalkStore};
use crate::teachers::{list_teachers, TEACHER_COUNT};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObjectArgs};
use baodao_common::{
    BookingStatus, ConfirmationEmail, Language, LessonType, TalkError,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The closed set of tools exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetInformation,
    GenerateCalendar,
    CheckTeacherAvailability,
    SelectTeacher,
    CreateBooking,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::GetInformation,
        ToolName::GenerateCalendar,
        ToolName::CheckTeacherAvailability,
        ToolName::SelectTeacher,
        ToolName::CreateBooking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetInformation => "getInformation",
            ToolName::GenerateCalendar => "generateCalendar",
            ToolName::CheckTeacherAvailability => "checkTeacherAvailability",
            ToolName::SelectTeacher => "selectTeacher",
            ToolName::CreateBooking => "createBooking",
        }
    }
}

impl FromStr for ToolName {
    type Err = TalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "getInformation" => Ok(ToolName::GetInformation),
            "generateCalendar" => Ok(ToolName::GenerateCalendar),
            "checkTeacherAvailability" => Ok(ToolName::CheckTeacherAvailability),
            "selectTeacher" => Ok(ToolName::SelectTeacher),
            "createBooking" => Ok(ToolName::CreateBooking),
            other => Err(TalkError::Validation(format!("unknown tool: {}", other))),
        }
    }
}

/// The authenticated student a conversation belongs to.
#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Per-conversation context threaded into every executor. The pinned
/// language lives here; model-supplied language arguments are ignored.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub language: Language,
    pub student: StudentProfile,
}

// Argument schemas. Unknown fields are rejected so a hallucinated
// parameter fails validation instead of being silently dropped.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetInformationArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GenerateCalendarArgs {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CheckTeacherAvailabilityArgs {
    #[allow(dead_code)]
    selected_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SelectTeacherArgs {
    teacher_id: String,
    teacher_name: String,
    selected_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateBookingArgs {
    teacher_id: String,
    teacher_name: String,
    lesson_date_time: String,
    lesson_type: LessonType,
}

fn parse_date(value: &str) -> Result<NaiveDate, TalkError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    Err(TalkError::Validation(format!("invalid date: {}", value)))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, TalkError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(TalkError::Validation(format!("invalid timestamp: {}", value)))
}

/// Validates model-proposed arguments, dispatches executors, and converts
/// failures into in-band error payloads the model can react to. Only the
/// `createBooking` executor touches persistence.
pub struct ToolRegistry {
    store: TalkStore,
    faq: FaqClient,
    mailer: Arc<dyn Mailer>,
    classroom_link_base: String,
}

impl ToolRegistry {
    pub fn new(
        store: TalkStore,
        faq: FaqClient,
        mailer: Arc<dyn Mailer>,
        classroom_link_base: String,
    ) -> Self {
        Self {
            store,
            faq,
            mailer,
            classroom_link_base,
        }
    }

    /// Wire-format tool declarations for the chat-completion request.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        ToolName::ALL
            .iter()
            .filter_map(|tool| {
                let (description, parameters) = match tool {
                    ToolName::GetInformation => (
                        "Search for relevant information in the database",
                        json!({
                            "type": "object",
                            "properties": {
                                "query": {"type": "string", "description": "The search query"}
                            },
                            "required": ["query"]
                        }),
                    ),
                    ToolName::GenerateCalendar => (
                        "Generate available time slots",
                        json!({
                            "type": "object",
                            "properties": {
                                "startDate": {"type": "string", "description": "Start date in ISO format"},
                                "endDate": {"type": "string", "description": "End date in ISO format"}
                            },
                            "required": ["startDate", "endDate"]
                        }),
                    ),
                    ToolName::CheckTeacherAvailability => (
                        "Show available teachers after time selection",
                        json!({
                            "type": "object",
                            "properties": {
                                "selectedDate": {"type": "string", "description": "Selected date and time"}
                            },
                            "required": ["selectedDate"]
                        }),
                    ),
                    ToolName::SelectTeacher => (
                        "Process teacher selection",
                        json!({
                            "type": "object",
                            "properties": {
                                "teacherId": {"type": "string"},
                                "teacherName": {"type": "string"},
                                "selectedTime": {"type": "string"}
                            },
                            "required": ["teacherId", "teacherName", "selectedTime"]
                        }),
                    ),
                    ToolName::CreateBooking => (
                        "Create final booking",
                        json!({
                            "type": "object",
                            "properties": {
                                "teacherId": {"type": "string"},
                                "teacherName": {"type": "string"},
                                "lessonDateTime": {"type": "string"},
                                "lessonType": {"type": "string", "enum": ["trial", "regular"]}
                            },
                            "required": ["teacherId", "teacherName", "lessonDateTime", "lessonType"]
                        }),
                    ),
                };
                let function = FunctionObjectArgs::default()
                    .name(tool.as_str())
                    .description(description)
                    .parameters(parameters)
                    .build()
                    .ok()?;
                Some(ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function,
                })
            })
            .collect()
    }

    /// Execute one tool call. Always yields a payload: validation and
    /// executor failures come back as structured failure results, never as
    /// an aborted turn.
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext) -> Value {
        let tool = match ToolName::from_str(name) {
            Ok(tool) => tool,
            Err(e) => return failure_payload(&e),
        };
        match self.dispatch(tool, arguments, ctx).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                failure_payload(&e)
            }
        }
    }

    async fn dispatch(
        &self,
        tool: ToolName,
        arguments: &str,
        ctx: &ToolContext,
    ) -> Result<Value, TalkError> {
        match tool {
            ToolName::GetInformation => {
                let args: GetInformationArgs = parse_args(arguments)?;
                let result = self.faq.lookup(&args.query, ctx.language).await;
                Ok(json!({
                    "type": "tool-result",
                    "toolName": ToolName::GetInformation.as_str(),
                    "result": result,
                }))
            }
            ToolName::GenerateCalendar => {
                let args: GenerateCalendarArgs = parse_args(arguments)?;
                let start = parse_date(&args.start_date)?;
                let end = parse_date(&args.end_date)?;
                let slots = generate_slots(start, end, ctx.language);
                Ok(serde_json::to_value(slots)
                    .map_err(|e| TalkError::Internal(e.to_string()))?)
            }
            ToolName::CheckTeacherAvailability => {
                let _args: CheckTeacherAvailabilityArgs = parse_args(arguments)?;
                let teachers = list_teachers(TEACHER_COUNT, ctx.language);
                Ok(serde_json::to_value(teachers)
                    .map_err(|e| TalkError::Internal(e.to_string()))?)
            }
            ToolName::SelectTeacher => {
                let args: SelectTeacherArgs = parse_args(arguments)?;
                let selected_time = parse_datetime(&args.selected_time)?;
                Ok(json!({
                    "status": "success",
                    "showBookingSuccess": true,
                    "bookingDetails": {
                        "teacherId": args.teacher_id,
                        "teacherName": args.teacher_name,
                        "lessonDateTime": selected_time,
                        "lessonType": LessonType::Trial.as_str(),
                    }
                }))
            }
            ToolName::CreateBooking => {
                let args: CreateBookingArgs = parse_args(arguments)?;
                self.create_booking(args, ctx).await
            }
        }
    }

    async fn create_booking(
        &self,
        args: CreateBookingArgs,
        ctx: &ToolContext,
    ) -> Result<Value, TalkError> {
        let lesson_date_time = parse_datetime(&args.lesson_date_time)?;
        let status = match args.lesson_type {
            LessonType::Trial => BookingStatus::Confirmed,
            LessonType::Regular => BookingStatus::Pending,
        };
        let classroom_link = format!(
            "{}/{}",
            self.classroom_link_base.trim_end_matches('/'),
            Uuid::new_v4()
        );

        let booking = self
            .store
            .create_booking(NewBooking {
                student_id: ctx.student.id,
                teacher_id: args.teacher_id.clone(),
                lesson_date_time,
                lesson_type: args.lesson_type,
                status,
                classroom_link,
            })
            .await?;

        // Trial lessons confirm immediately, so the email goes out now.
        // Regular bookings stay pending; their email fires on payment
        // completion instead.
        if args.lesson_type == LessonType::Trial {
            if let Some(recipient) = &ctx.student.email {
                let email = ConfirmationEmail {
                    recipient: recipient.clone(),
                    student_name: ctx
                        .student
                        .name
                        .clone()
                        .unwrap_or_else(|| recipient.clone()),
                    teacher_name: args.teacher_name.clone(),
                    lesson_date_time,
                    lesson_type: args.lesson_type,
                    classroom_link: booking.classroom_link.clone(),
                    language: ctx.language,
                };
                if let Err(e) = self.mailer.send(&email).await {
                    warn!("Confirmation email failed for booking {}: {}", booking.id, e);
                }
            }
        }

        info!(
            "Booking {} recorded as {} for teacher {}",
            booking.id,
            booking.status.as_str(),
            booking.teacher_id
        );

        Ok(json!({
            "status": "success",
            "showBookingSuccess": true,
            "bookingId": booking.id,
            "teacherName": args.teacher_name,
            "lessonDateTime": lesson_date_time,
            "lessonType": args.lesson_type.as_str(),
            "classroomLink": booking.classroom_link,
            "paymentRequired": args.lesson_type == LessonType::Regular,
        }))
    }
}

fn parse_args<'a, T: Deserialize<'a>>(arguments: &'a str) -> Result<T, TalkError> {
    serde_json::from_str(arguments)
        .map_err(|e| TalkError::Validation(format!("invalid tool arguments: {}", e)))
}

fn failure_payload(error: &TalkError) -> Value {
    json!({
        "status": "failed",
        "error": error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::RecordingMailer;
    use chrono::TimeZone;
    use std::time::Duration;

    async fn test_registry() -> (ToolRegistry, Arc<RecordingMailer>, TalkStore, tempfile::TempDir)
    {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let store = TalkStore::connect(&url).await.unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let registry = ToolRegistry::new(
            store.clone(),
            FaqClient::new("http://127.0.0.1:1".to_string(), Duration::from_millis(200)),
            mailer.clone(),
            "https://meet.baodaotalk.com".to_string(),
        );
        (registry, mailer, store, dir)
    }

    fn ctx(language: Language, email: Option<&str>) -> ToolContext {
        ToolContext {
            language,
            student: StudentProfile {
                id: Uuid::new_v4(),
                name: Some("Alex".to_string()),
                email: email.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_definitions_cover_every_tool() {
        let names: Vec<&str> = ToolName::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "getInformation",
                "generateCalendar",
                "checkTeacherAvailability",
                "selectTeacher",
                "createBooking"
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_calendar_uses_pinned_language() {
        let (registry, _mailer, _store, _dir) = test_registry().await;
        let payload = registry
            .execute(
                "generateCalendar",
                r#"{"startDate": "2025-01-06", "endDate": "2025-01-06"}"#,
                &ctx(Language::Zh, None),
            )
            .await;
        let slots = payload.as_array().unwrap();
        assert_eq!(slots.len(), 5);
        assert!(slots.iter().all(|s| s["userLanguage"] == "zh"));
    }

    #[tokio::test]
    async fn test_check_teacher_availability_ignores_argument_language() {
        let (registry, _mailer, _store, _dir) = test_registry().await;
        // The selectedDate text is English; the session language still wins.
        let payload = registry
            .execute(
                "checkTeacherAvailability",
                r#"{"selectedDate": "Monday January 6th at 9am"}"#,
                &ctx(Language::Ja, None),
            )
            .await;
        let teachers = payload.as_array().unwrap();
        assert_eq!(teachers.len(), 3);
        assert!(teachers[0]["languages"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l == "英語"));
    }

    #[tokio::test]
    async fn test_select_teacher_is_a_pure_draft() {
        let (registry, _mailer, store, _dir) = test_registry().await;
        let payload = registry
            .execute(
                "selectTeacher",
                r#"{"teacherId": "t-1", "teacherName": "Emily Parker", "selectedTime": "2025-01-06T09:00:00Z"}"#,
                &ctx(Language::En, None),
            )
            .await;
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["bookingDetails"]["lessonType"], "trial");
        assert_eq!(payload["bookingDetails"]["teacherName"], "Emily Parker");
        // No persistence happened.
        let slot = store.get_booking(Uuid::new_v4()).await.unwrap();
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn test_trial_booking_succeeds_and_emails_once() {
        let (registry, mailer, store, _dir) = test_registry().await;
        let when = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let slot_id = store
            .insert_schedule_slot("t-1", when, when + chrono::Duration::hours(1))
            .await
            .unwrap();

        let args = r#"{"teacherId": "t-1", "teacherName": "Emily Parker", "lessonDateTime": "2025-01-06T09:00:00Z", "lessonType": "trial"}"#;
        let payload = registry
            .execute("createBooking", args, &ctx(Language::En, Some("s@example.com")))
            .await;

        assert_eq!(payload["status"], "success");
        assert_eq!(payload["lessonType"], "trial");
        assert_eq!(payload["paymentRequired"], false);
        assert!(payload["classroomLink"]
            .as_str()
            .unwrap()
            .starts_with("https://meet.baodaotalk.com/"));

        let slot = store.get_schedule_slot(slot_id).await.unwrap().unwrap();
        assert!(!slot.is_available);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "s@example.com");
        assert_eq!(sent[0].teacher_name, "Emily Parker");

        // Same slot again: in-band failure, no second email.
        let second = registry
            .execute("createBooking", args, &ctx(Language::En, Some("s@example.com")))
            .await;
        assert_eq!(second["status"], "failed");
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_regular_booking_is_pending_without_email() {
        let (registry, mailer, store, _dir) = test_registry().await;
        let when = Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap();
        store
            .insert_schedule_slot("t-2", when, when + chrono::Duration::hours(1))
            .await
            .unwrap();

        let payload = registry
            .execute(
                "createBooking",
                r#"{"teacherId": "t-2", "teacherName": "Michael Chen", "lessonDateTime": "2025-01-06T10:00:00Z", "lessonType": "regular"}"#,
                &ctx(Language::En, Some("s@example.com")),
            )
            .await;

        assert_eq!(payload["status"], "success");
        assert_eq!(payload["paymentRequired"], true);
        assert!(mailer.sent().is_empty());

        let booking_id: Uuid = payload["bookingId"].as_str().unwrap().parse().unwrap();
        let booking = store.get_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(!booking.payment_completed);
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_persistence() {
        let (registry, mailer, _store, _dir) = test_registry().await;

        let bad_date = registry
            .execute(
                "createBooking",
                r#"{"teacherId": "t-1", "teacherName": "Emily", "lessonDateTime": "next tuesday", "lessonType": "trial"}"#,
                &ctx(Language::En, Some("s@example.com")),
            )
            .await;
        assert_eq!(bad_date["status"], "failed");

        let unknown_field = registry
            .execute(
                "generateCalendar",
                r#"{"startDate": "2025-01-06", "endDate": "2025-01-07", "timezone": "UTC"}"#,
                &ctx(Language::En, None),
            )
            .await;
        assert_eq!(unknown_field["status"], "failed");

        let unknown_tool = registry
            .execute("dropTables", "{}", &ctx(Language::En, None))
            .await;
        assert_eq!(unknown_tool["status"], "failed");

        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_get_information_degrades_in_band() {
        let (registry, _mailer, _store, _dir) = test_registry().await;
        let payload = registry
            .execute(
                "getInformation",
                r#"{"query": "refund policy"}"#,
                &ctx(Language::Ko, None),
            )
            .await;
        assert_eq!(payload["toolName"], "getInformation");
        let text = payload["result"].as_str().unwrap();
        assert!(text.contains("FAQ"));
    }

    #[test]
    fn test_datetime_parsing_accepts_common_shapes() {
        assert!(parse_datetime("2025-01-06T09:00:00Z").is_ok());
        assert!(parse_datetime("2025-01-06T09:00:00+08:00").is_ok());
        assert!(parse_datetime("2025-01-06T09:00").is_ok());
        assert!(parse_datetime("bogus").is_err());
        assert!(parse_date("2025-01-06").is_ok());
        assert!(parse_date("2025-01-06T00:00:00Z").is_ok());
    }
}
