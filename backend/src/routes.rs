use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, web};
use log::{error, info, warn};
use shared::{DiagnosisResponse, HealthResponse, HealthStatus, ScanType};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ApiError;
use crate::inference::diagnose;
use crate::reports::ReportCatalog;
use crate::state::AppState;
use crate::storage::upload::read_upload;

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.service(web::resource("/predict").route(web::post().to(predict_spiral)))
        .service(web::resource("/predict_mri").route(web::post().to(predict_mri)))
        .service(web::resource("/health").route(web::get().to(health_check)))
        .service(
            web::resource("/download_report/{scan_type}").route(web::get().to(download_report)),
        )
        .service(web::resource("/check_files").route(web::get().to(check_files)))
        .service(Files::new("/static", static_dir));
}

pub fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_header(header::CONTENT_TYPE)
        .supports_credentials()
        .max_age(3600)
}

async fn predict_spiral(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    predict(state, payload, ScanType::Spiral).await
}

async fn predict_mri(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    predict(state, payload, ScanType::Mri).await
}

async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
    scan: ScanType,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload, state.config.max_upload_bytes)
        .await
        .inspect_err(|e| warn!("Rejected {} upload: {}", scan, e))?;

    let scratch = state.scratch.save(&upload).map_err(|e| {
        error!("Failed to store {} upload: {}", scan, e);
        ApiError::from(e)
    })?;

    let classifier = state.classifier(scan);
    let image_path = scratch.path().to_path_buf();
    let outcome = web::block(move || diagnose(scan, classifier.as_ref(), &image_path)).await;
    drop(scratch);

    match outcome {
        Ok(Ok(result)) => Ok(HttpResponse::Ok().json(DiagnosisResponse::from(result))),
        Ok(Err(e)) => {
            error!("Error during {} prediction: {}", scan, e);
            Err(ApiError::prediction_failed(scan, e))
        }
        Err(e) => {
            error!("{} prediction did not complete: {}", scan, e);
            Err(ApiError::prediction_failed(scan, e))
        }
    }
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let problem = if !state.scratch.exists() {
        Some("Upload directory not found")
    } else if !state.config.static_dir.is_dir() {
        Some("Static directory not found")
    } else {
        None
    };

    match problem {
        None => HttpResponse::Ok().json(HealthResponse {
            status: HealthStatus::Healthy,
            message: "All systems operational".into(),
        }),
        Some(message) => {
            warn!("Health check failed: {}", message);
            HttpResponse::InternalServerError().json(HealthResponse {
                status: HealthStatus::Unhealthy,
                message: message.into(),
            })
        }
    }
}

async fn download_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let requested = path.into_inner().to_lowercase();
    let scan = ScanType::from_str(&requested)
        .map_err(|_| ApiError::Validation(format!("Invalid report type: {requested}")))?;

    let file_path = state.reports.path_for(scan);
    info!("Attempting to serve file from: {}", file_path.display());
    if !file_path.is_file() {
        return Err(ApiError::NotFound(format!(
            "Report file not found at {}",
            file_path.display()
        )));
    }

    let file = NamedFile::open(&file_path)
        .map_err(|e| ApiError::Processing(e.to_string()))?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(ReportCatalog::download_name(
                scan,
            ))],
        });
    Ok(file.into_response(&req))
}

async fn check_files(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.reports.file_status())
}
