pub mod calendar;
pub mod faq;
pub mod i18n;
pub mod language;
pub mod mailer;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod store;
pub mod teachers;
pub mod tools;

use baodao_common::{Language, Result};
use std::sync::Arc;
use std::time::Duration;

/// The assembled conversation engine: everything the HTTP layer needs.
pub struct TalkCore {
    pub store: store::TalkStore,
    pub orchestrator: Arc<orchestrator::Orchestrator>,
    pub mailer: Arc<dyn mailer::Mailer>,
}

impl TalkCore {
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let store = store::TalkStore::connect(&config.database_url).await?;

        let faq = faq::FaqClient::new(config.faq_service_url.clone(), config.upstream_timeout);
        let mailer: Arc<dyn mailer::Mailer> = Arc::new(mailer::HttpMailer::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_sender.clone(),
            config.upstream_timeout,
        ));
        let registry = Arc::new(tools::ToolRegistry::new(
            store.clone(),
            faq,
            mailer.clone(),
            config.classroom_link_base.clone(),
        ));
        let model: Arc<dyn model::ChatModel> = Arc::new(model::OpenAiModel::new(
            &config.openai_api_key,
            config.openai_model.clone(),
        ));
        let detector = language::LanguageDetector::new(config.default_language);
        let orchestrator = Arc::new(orchestrator::Orchestrator::new(
            model,
            registry,
            detector,
            store.clone(),
        ));

        Ok(Self {
            store,
            orchestrator,
            mailer,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub faq_service_url: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_sender: String,
    pub classroom_link_base: String,
    pub default_language: Language,
    pub upstream_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/baodao.db".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            faq_service_url: "http://localhost:3002".to_string(),
            mail_api_url: "http://localhost:8025/api/send".to_string(),
            mail_api_key: String::new(),
            mail_sender: "bookings@baodaotalk.com".to_string(),
            classroom_link_base: "https://meet.baodaotalk.com".to_string(),
            default_language: Language::En,
            upstream_timeout: Duration::from_secs(10),
        }
    }
}
