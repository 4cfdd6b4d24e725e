use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracksentry::config::Settings;
use tracksentry::core::AlertEvaluator;
use tracksentry::routes::{self, gps::AppState};
use tracksentry::services::{
    AlertSweeper, AreaCodeCache, DeviceDirectory, Ingestor, LogNotifier, MemoryStore, Notifier,
    PostgresStore, RecordStore, WebhookNotifier,
};

/// JSON error response for payload errors
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
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle form payload errors
pub fn handle_form_payload_error(err: error::UrlencodedError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Form payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_form".to_string(),
        message: format!("Invalid form: {}", err),
        status_code: 400,
    }
    .into()
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

/// PostgreSQL when a database URL is configured, memory otherwise
async fn init_store(settings: &Settings) -> std::io::Result<(Arc<dyn RecordStore>, Arc<dyn DeviceDirectory>)> {
    let Some(url) = settings.database.url() else {
        info!("No database configured, using the in-memory store");
        let store = Arc::new(MemoryStore::new());
        let records: Arc<dyn RecordStore> = store.clone();
        return Ok((records, store));
    };

    let store = Arc::new(
        PostgresStore::from_settings(
            url,
            settings.database.max_connections,
            settings.database.min_connections,
        )
        .await
        .map_err(|e| io_error("Failed to connect to PostgreSQL", e))?,
    );
    info!("PostgreSQL store initialized");

    let records: Arc<dyn RecordStore> = store.clone();
    Ok((records, store))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration before logging so the level comes from it
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Initialize logging, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting Tracksentry GPS tracking service...");

    // Initialize the record store
    let (records, directory) = init_store(&settings).await?;

    let codes = Arc::new(AreaCodeCache::new(settings.indexing.code_cache_size));
    let ingestor = Arc::new(Ingestor::new(records.clone(), directory.clone(), codes.clone()));

    let notifier: Arc<dyn Notifier> = match settings.notification.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            info!("Alert notifications go to webhook {}", url);
            Arc::new(
                WebhookNotifier::new(url, settings.notification.timeout_secs)
                    .map_err(|e| io_error("Failed to build webhook client", e))?,
            )
        }
        _ => {
            info!("No webhook configured, alert notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let policy = settings.alert.policy();
    info!("Alert policy: {:?}", policy);

    let sweeper = AlertSweeper::new(
        AlertEvaluator::new(policy),
        records.clone(),
        directory.clone(),
        notifier,
        settings.alert.max_concurrent,
    );

    // Periodic alert sweep
    let interval_secs = settings.alert.sweep_interval_secs.max(1);
    let background = sweeper.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = background.run_once(chrono::Utc::now()).await {
                error!("Failed to get alerts: {}", e);
            }
        }
    });
    info!("Alert sweep scheduled every {}s", interval_secs);

    // Build application state
    let app_state = AppState {
        ingestor,
        records,
        directory,
        sweeper,
        codes,
    };

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
            .app_data(web::FormConfig::default().error_handler(handle_form_payload_error))
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
