use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use luxelink_agent::config::{load_agents, Settings, StorageBackend};
use luxelink_agent::core::{KeyLocks, Matcher};
use luxelink_agent::models::MatchPolicy;
use luxelink_agent::routes::{self, AppState};
use luxelink_agent::services::{
    spawn_scheduler, AgentRunner, ListingSource, LogNotifier, MarketcheckSource, MemoryStore,
    Notifier, PostgresStore, RunnerSettings, SmtpNotifier, Store,
};
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> IoError {
    error!("{}: {}", context, e);
    IoError::new(ErrorKind::Other, format!("{}: {}", context, e))
}

async fn build_store(settings: &Settings) -> std::io::Result<Arc<dyn Store>> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; seen listings are forgotten on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let url = settings
                .storage
                .url
                .as_deref()
                .ok_or_else(|| startup_error("PostgreSQL backend selected", "no storage.url or DATABASE_URL set"))?;

            let store = PostgresStore::from_settings(
                url,
                settings.storage.max_connections,
                settings.storage.min_connections,
                settings.storage.acquire_timeout_secs,
                settings.storage.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;

            info!("PostgreSQL store initialized");
            Ok(Arc::new(store))
        }
    }
}

fn build_sources(settings: &Settings) -> std::io::Result<Vec<Arc<dyn ListingSource>>> {
    let mut sources: Vec<Arc<dyn ListingSource>> = Vec::new();

    let marketcheck = &settings.sources.marketcheck;
    if marketcheck.enabled {
        if marketcheck.api_key.is_none() {
            warn!("MARKETCHECK_API_KEY not set; Marketcheck searches will return nothing");
        }
        let source = MarketcheckSource::new(
            marketcheck.base_url.clone(),
            marketcheck.api_key.clone(),
            marketcheck.rows,
            marketcheck.radius_miles,
            Duration::from_secs(marketcheck.timeout_secs),
        )
        .map_err(|e| startup_error("Failed to build Marketcheck client", e))?;
        sources.push(Arc::new(source));
    }

    Ok(sources)
}

fn build_notifier(settings: &Settings) -> std::io::Result<Arc<dyn Notifier>> {
    let smtp = &settings.notifications.smtp;
    match smtp.credentials() {
        Some((username, password)) => {
            let notifier = SmtpNotifier::new(&smtp.host, smtp.port, username, password)
                .map_err(|e| startup_error("Failed to configure SMTP", e))?;
            info!("Email alerts via {}:{} as {}", smtp.host, smtp.port, username);
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("SMTP credentials not set (GMAIL_USER / GMAIL_APP_PASSWORD); alerts go to the log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        IoError::new(ErrorKind::Other, format!("Configuration error: {}", e))
    })?;

    // Initialize logging; LOG_LEVEL and LOG_FORMAT win over the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting LuxeLink agent service...");

    let agents = load_agents(&settings.agents_path)
        .map_err(|e| startup_error("Failed to load agents", e))?;
    if agents.is_empty() {
        warn!("No agents defined in {}", settings.agents_path);
    }

    info!("Configuration loaded ({} agents)", agents.len());

    let store = build_store(&settings).await?;
    store
        .upsert_agents(&agents)
        .await
        .map_err(|e| startup_error("Failed to register agents", e))?;

    let policy = MatchPolicy::from(&settings.matching);
    info!("Matcher initialized with policy: {:?}", policy);

    let runner = Arc::new(AgentRunner::new(
        store,
        Matcher::new(policy),
        KeyLocks::new(
            settings.dedup.lock_capacity,
            Duration::from_secs(settings.dedup.lock_idle_secs),
        ),
        build_sources(&settings)?,
        build_notifier(&settings)?,
        RunnerSettings {
            politeness_delay: Duration::from_millis(settings.sources.politeness_delay_ms),
            max_consecutive_empty: settings.sources.max_consecutive_empty,
            default_recipients: settings.notifications.fallback_recipients(),
        },
    ));

    if settings.scheduler.enabled {
        spawn_scheduler(
            runner.clone(),
            settings.scheduler.interval(),
            settings.scheduler.run_on_startup,
        );
    } else {
        info!("Scheduler disabled; agents run only on request");
    }

    let app_state = AppState::new(runner);

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
