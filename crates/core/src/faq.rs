use crate::i18n::{phrase, MessageKey};
use baodao_common::Language;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the external FAQ knowledge service.
///
/// Lookups degrade to a localized service-unavailable message instead of
/// failing: an unreachable knowledge base must never abort the conversation.
#[derive(Debug, Clone)]
pub struct FaqClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FaqResponse {
    #[serde(default)]
    response: Option<String>,
}

impl FaqClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url }
    }

    /// Look up FAQ content in the pinned session language.
    pub async fn lookup(&self, query: &str, language: Language) -> String {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        debug!("FAQ lookup against {}: {}", url, query);

        let body = json!({
            "messages": [{
                "role": "user",
                "content": query,
                "language": language,
            }],
        });

        let result = self.client.post(&url).json(&body).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<FaqResponse>().await {
                    Ok(parsed) => parsed.response.unwrap_or_else(|| {
                        "No specific information found in the database.".to_string()
                    }),
                    Err(e) => {
                        warn!("FAQ service returned unparseable body: {}", e);
                        phrase(MessageKey::ServiceUnavailable, language).to_string()
                    }
                }
            }
            Ok(response) => {
                warn!("FAQ service returned status {}", response.status());
                phrase(MessageKey::ServiceUnavailable, language).to_string()
            }
            Err(e) => {
                warn!("FAQ service unreachable: {}", e);
                phrase(MessageKey::ServiceUnavailable, language).to_string()
            }
        }
    }
}
