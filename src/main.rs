use anyhow::{Context, Result};
use baodao_api::auth::{AuthConfig, AuthService};
use baodao_api::{ApiConfig, ApiServer};
use baodao_common::Language;
use baodao_core::{CoreConfig, TalkCore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "baodao=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BaoDao Talk booking assistant...");

    dotenv::dotenv().ok();

    let core_config = core_config_from_env()?;
    let core = Arc::new(
        TalkCore::new(core_config)
            .await
            .context("failed to initialize conversation engine")?,
    );

    seed_schedules(&core).await;

    let api_config = api_config_from_env()?;
    let auth_service = Arc::new(AuthService::new(
        AuthConfig {
            jwt_secret: api_config.jwt_secret.clone(),
            ..AuthConfig::default()
        },
        core.store.clone(),
    ));

    let server = ApiServer::new(api_config, core, auth_service);
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}

fn core_config_from_env() -> Result<CoreConfig> {
    let defaults = CoreConfig::default();
    let default_language = match std::env::var("DEFAULT_LANGUAGE") {
        Ok(value) => value
            .parse::<Language>()
            .with_context(|| format!("unsupported DEFAULT_LANGUAGE: {}", value))?,
        Err(_) => defaults.default_language,
    };

    Ok(CoreConfig {
        database_url: env_or("DATABASE_URL", &defaults.database_url),
        openai_api_key: std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set")?,
        openai_model: env_or("OPENAI_MODEL", &defaults.openai_model),
        faq_service_url: env_or("FAQ_SERVICE_URL", &defaults.faq_service_url),
        mail_api_url: env_or("MAIL_API_URL", &defaults.mail_api_url),
        mail_api_key: env_or("MAIL_API_KEY", &defaults.mail_api_key),
        mail_sender: env_or("MAIL_SENDER", &defaults.mail_sender),
        classroom_link_base: env_or("CLASSROOM_LINK_BASE", &defaults.classroom_link_base),
        default_language,
        upstream_timeout: Duration::from_secs(
            std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.upstream_timeout.as_secs()),
        ),
    })
}

fn api_config_from_env() -> Result<ApiConfig> {
    let defaults = ApiConfig::default();
    let port = match std::env::var("PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid PORT: {}", value))?,
        Err(_) => defaults.port,
    };
    let cors_origins = std::env::var("CORS_ORIGINS")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or(defaults.cors_origins);

    Ok(ApiConfig {
        host: env_or("HOST", &defaults.host),
        port,
        cors_origins,
        jwt_secret: env_or("JWT_SECRET", &defaults.jwt_secret),
        request_timeout_secs: defaults.request_timeout_secs,
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Seed two weeks of teacher schedules on a fresh database so bookings have
/// slots to claim. Existing rows are left alone.
async fn seed_schedules(core: &Arc<TalkCore>) {
    use baodao_core::calendar::generate_slots;
    use baodao_core::teachers::{list_teachers, TEACHER_COUNT};

    let today = chrono::Utc::now().date_naive();
    let Some(end) = today.checked_add_days(chrono::Days::new(13)) else {
        return;
    };
    let slots = generate_slots(today, end, Language::En);
    let teachers = list_teachers(TEACHER_COUNT, Language::En);

    let mut seeded = 0usize;
    for teacher in &teachers {
        for slot in &slots {
            match core
                .store
                .slot_exists(&teacher.id, slot.start_time)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = core
                        .store
                        .insert_schedule_slot(&teacher.id, slot.start_time, slot.end_time)
                        .await
                    {
                        warn!("Failed to seed slot for {}: {}", teacher.id, e);
                    } else {
                        seeded += 1;
                    }
                }
                Err(e) => warn!("Schedule seed lookup failed: {}", e),
            }
        }
    }
    if seeded > 0 {
        info!("Seeded {} teacher schedule slots", seeded);
    }
}
