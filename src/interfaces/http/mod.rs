use crate::application::use_cases::preview::{parse_row_count, preview_dataset};
use crate::application::{IngestionService, UploadedFile, Workspace};
use crate::domain::app_config::ServerConfig;
use crate::domain::error::AppError;
use crate::infrastructure::activity_log::ActivityLog;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, post, put, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use std::sync::Arc;

const LOG_SOURCE: &str = "HttpApi";

/// Spreadsheets are sent as the raw request body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub struct HttpState {
    pub ingestion: IngestionService,
    pub workspace: Arc<Workspace>,
    pub activity: Arc<ActivityLog>,
    pub preview_rows: usize,
}

#[derive(Deserialize)]
struct UploadQuery {
    #[serde(default)]
    file_name: String,
}

#[derive(Deserialize)]
struct PreviewQuery {
    rows: Option<String>,
}

#[post("/datasets")]
async fn upload_dataset(
    data: web::Data<HttpState>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> impl Responder {
    data.activity.info(
        LOG_SOURCE,
        &format!("Received {} ({} bytes)", query.file_name, body.len()),
    );

    let file = UploadedFile::new(query.file_name.clone(), body.to_vec());
    match data.ingestion.ingest(file).await {
        // Persistence continues in the background and reports to the log.
        Ok(handle) => HttpResponse::Ok().json(&handle.receipt),
        Err(e) => error_response(&e),
    }
}

#[get("/datasets")]
async fn list_datasets(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.workspace.listing())
}

#[get("/datasets/{name}/preview")]
async fn dataset_preview(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<PreviewQuery>,
) -> impl Responder {
    let requested = query.rows.as_deref().map(parse_row_count);
    match preview_dataset(&data.workspace, &path, requested, data.preview_rows) {
        Ok(preview) => HttpResponse::Ok().json(preview),
        Err(e) => error_response(&e),
    }
}

#[put("/datasets/{name}/active")]
async fn activate_dataset(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.workspace.activate(&path) {
        Ok(()) => HttpResponse::Ok().json(data.workspace.listing()),
        Err(e) => error_response(&e),
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.activity.entries())
}

pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::MalformedFile { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::NamingFailure { .. }
        | AppError::UnsupportedFormat { .. }
        | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &AppError) -> HttpResponse {
    HttpResponse::build(status_for(error)).body(error.to_string())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
            .service(upload_dataset)
            .service(list_datasets)
            .service(dataset_preview)
            .service(activate_dataset)
            .service(get_logs),
    );
}

pub fn start_server(state: HttpState, config: &ServerConfig) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run();

    Ok(server)
}
