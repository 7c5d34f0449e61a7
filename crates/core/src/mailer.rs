use crate::i18n::{lesson_type_label, render, MessageKey};
use async_trait::async_trait;
use baodao_common::{ConfirmationEmail, Result, TalkError};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Outbound confirmation mail. Callers treat delivery as best-effort; the
/// booking itself never depends on a send succeeding.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &ConfirmationEmail) -> Result<()>;
}

/// Render subject and body in the student's session language.
pub fn render_email(email: &ConfirmationEmail) -> (String, String) {
    let lesson = lesson_type_label(email.lesson_type, email.language).to_string();
    let mut params = HashMap::new();
    params.insert("student", email.student_name.clone());
    params.insert("teacher", email.teacher_name.clone());
    params.insert(
        "time",
        email
            .lesson_date_time
            .format("%Y-%m-%d %H:%M UTC")
            .to_string(),
    );
    params.insert("lesson", lesson);
    params.insert("link", email.classroom_link.clone());

    let subject = render(MessageKey::EmailSubject, email.language, &params);
    let body = render(MessageKey::EmailBody, email.language, &params);
    (subject, body)
}

/// Mailer backed by an HTTP mail-delivery API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, sender: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<()> {
        let (subject, body) = render_email(email);
        debug!("Sending confirmation email to {}", email.recipient);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.sender,
                "to": email.recipient,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| TalkError::Email(format!("mail API unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(TalkError::Email(format!(
                "mail API returned status {}",
                response.status()
            )));
        }

        info!("Confirmation email dispatched to {}", email.recipient);
        Ok(())
    }
}

/// Test double that records every email instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<ConfirmationEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ConfirmationEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baodao_common::{Language, LessonType};
    use chrono::TimeZone;

    fn sample(language: Language) -> ConfirmationEmail {
        ConfirmationEmail {
            recipient: "student@example.com".to_string(),
            student_name: "Alex".to_string(),
            teacher_name: "Emily Parker".to_string(),
            lesson_date_time: chrono::Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
            lesson_type: LessonType::Trial,
            classroom_link: "https://meet.baodaotalk.com/abc".to_string(),
            language,
        }
    }

    #[test]
    fn test_render_localizes_subject_and_body() {
        let (subject, body) = render_email(&sample(Language::Zh));
        assert_eq!(subject, "課程預約確認 - 體驗課");
        assert!(body.contains("Emily Parker"));
        assert!(body.contains("2025-01-06 09:00 UTC"));
        assert!(body.contains("https://meet.baodaotalk.com/abc"));
    }

    #[test]
    fn test_render_english_fills_every_placeholder() {
        let (subject, body) = render_email(&sample(Language::En));
        assert_eq!(subject, "Lesson booking confirmation - Trial Lesson");
        assert!(!body.contains('{'), "unfilled placeholder in: {}", body);
        assert!(body.contains("Dear Alex"));
    }

    #[tokio::test]
    async fn test_recording_mailer_captures_sends() {
        let mailer = RecordingMailer::new();
        mailer.send(&sample(Language::En)).await.unwrap();
        mailer.send(&sample(Language::Fr)).await.unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].language, Language::Fr);
    }
}
