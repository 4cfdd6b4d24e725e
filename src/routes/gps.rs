use crate::core::movement::annotate_deltas;
use crate::core::projection::distance;
use crate::models::{
    Device, DeviceResponse, ErrorResponse, GeoPoint, GpsReportRequest, HealthResponse,
    RecordView, RecordsQuery, RecordsResponse, SearchPrecisionRequest,
};
use crate::services::{
    AlertSweeper, AreaCodeCache, DeviceDirectory, IngestError, Ingestor, RecordStore, Report,
};
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub records: Arc<dyn RecordStore>,
    pub directory: Arc<dyn DeviceDirectory>,
    pub sweeper: AlertSweeper,
    /// Shared with the ingestor
    pub codes: Arc<AreaCodeCache>,
}

/// Configure all tracking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/gps", web::get().to(report_query))
        .route("/gps", web::post().to(report_form))
        .route("/devices/{id}/records", web::get().to(device_records))
        .route("/devices/{id}/search-precision", web::put().to(update_search_precision))
        .route("/alerts/sweep", web::post().to(run_sweep));
}

fn bad_request(error: &str, message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 400,
    })
}

fn internal_error(error: &str, message: String) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 500,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.records.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        area_code_cache: state.codes.stats(),
    })
}

/// GPS report endpoint
///
/// GET /api/v1/gps?dev={randId}&lat={lat}&lon={lon}
/// GET /api/v1/gps?dev={randId}&tracker=start|stop
async fn report_query(
    state: web::Data<AppState>,
    req: web::Query<GpsReportRequest>,
) -> impl Responder {
    handle_report(&state, req.into_inner()).await
}

/// Same as [`report_query`] with a form encoded body
async fn report_form(
    state: web::Data<AppState>,
    req: web::Form<GpsReportRequest>,
) -> impl Responder {
    handle_report(&state, req.into_inner()).await
}

async fn handle_report(state: &AppState, req: GpsReportRequest) -> HttpResponse {
    if let Err(errors) = req.validate() {
        tracing::info!("Invalid GPS report: {}", errors);
        return bad_request("Validation failed", errors.to_string());
    }

    let report = match (req.tracker, req.lat, req.lon) {
        (Some(tracker), _, _) => Report::Tracker(tracker),
        (None, Some(lat), Some(lon)) => Report::Fix(GeoPoint::new(lat, lon)),
        (None, None, _) => {
            return bad_request("Invalid report", "Missing or invalid latitude (lat) parameter!".to_string())
        }
        (None, Some(_), None) => {
            return bad_request("Invalid report", "Missing or invalid longitude (lon) parameter!".to_string())
        }
    };

    match state.ingestor.ingest(&req.dev, report, chrono::Utc::now()).await {
        Ok(_) => HttpResponse::Ok().finish(),
        Err(IngestError::Store(e)) => {
            tracing::error!("Failed to store GPS record: {}", e);
            HttpResponse::InternalServerError().finish()
        }
        Err(e) => {
            tracing::info!("Rejected GPS report: {}", e);
            bad_request("Invalid report", e.to_string())
        }
    }
}

/// Device records endpoint
///
/// GET /api/v1/devices/{id}/records?loc={lat},{lng}&limit=20&exact=false
///
/// With `loc` on an indexed device only records stored near the location
/// are returned: those sharing an area code with the location's candidate
/// codes.
async fn device_records(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<RecordsQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    let device = match load_device(&state, path.into_inner()).await {
        Ok(device) => device,
        Err(response) => return response,
    };

    let search = if device.indexed() {
        match query.location() {
            Ok(point) => point,
            Err(e) => return bad_request("Invalid location", e.to_string()),
        }
    } else {
        None
    };
    let codes = search.map(|point| state.codes.candidate_codes(device.cell_size, &point));

    let mut samples = match state
        .records
        .fetch_recent(device.id, query.limit, codes.as_deref().map(Vec::as_slice))
        .await
    {
        Ok(samples) => samples,
        Err(e) => {
            tracing::error!("Failed to fetch records of device {}: {}", device.id, e);
            return internal_error("Failed to fetch records", e.to_string());
        }
    };

    if let (Some(center), true) = (search, query.exact) {
        let precision = device.search_precision();
        samples.retain(|s| s.track_point().is_some_and(|p| distance(&center, &p) <= precision));
    }

    let deltas = annotate_deltas(&samples);
    let records = samples
        .into_iter()
        .zip(deltas)
        .map(|(sample, delta)| RecordView {
            kind: sample.kind,
            point: sample.point,
            timestamp: sample.timestamp,
            delta,
        })
        .collect();

    HttpResponse::Ok().json(RecordsResponse {
        device_id: device.id,
        search_precision_m: device.indexed().then(|| device.search_precision()),
        records,
    })
}

/// Search precision endpoint
///
/// PUT /api/v1/devices/{id}/search-precision with `{"searchPrecision": 1000}`
///
/// Only records stored after the change are indexed with the new cell size.
async fn update_search_precision(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    req: web::Json<SearchPrecisionRequest>,
) -> impl Responder {
    let mut device = match load_device(&state, path.into_inner()).await {
        Ok(device) => device,
        Err(response) => return response,
    };

    if let Err(e) = device.set_search_precision(req.search_precision) {
        tracing::info!("Rejected search precision for device {}: {}", device.id, e);
        return bad_request("Invalid search precision", e.to_string());
    }

    match state.directory.update_cell_size(device.id, device.cell_size).await {
        Ok(true) => {
            tracing::info!("Device {} now uses {} m cells", device.id, device.cell_size);
            HttpResponse::Ok().json(DeviceResponse {
                search_precision_m: device.search_precision(),
                device,
            })
        }
        Ok(false) => not_found(device.id),
        Err(e) => {
            tracing::error!("Failed to update device {}: {}", device.id, e);
            internal_error("Failed to update device", e.to_string())
        }
    }
}

fn not_found(device_id: i64) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Device not found".to_string(),
        message: format!("No device with id {}", device_id),
        status_code: 404,
    })
}

async fn load_device(state: &AppState, device_id: i64) -> Result<Device, HttpResponse> {
    match state.directory.device(device_id).await {
        Ok(Some(device)) => Ok(device),
        Ok(None) => Err(not_found(device_id)),
        Err(e) => {
            tracing::error!("Failed to load device {}: {}", device_id, e);
            Err(internal_error("Failed to load device", e.to_string()))
        }
    }
}

/// Run one alert sweep on demand
///
/// POST /api/v1/alerts/sweep
async fn run_sweep(state: web::Data<AppState>) -> impl Responder {
    match state.sweeper.run_once(chrono::Utc::now()).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            tracing::error!("Failed to get alerts: {}", e);
            internal_error("Failed to run alert sweep", e.to_string())
        }
    }
}
