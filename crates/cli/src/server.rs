//! HTTP surface over the classifier.

use actix_cors::Cors;
use actix_web::{
    dev::Server, error::InternalError, get, http::StatusCode, post, web, App, HttpResponse,
    HttpServer, Responder,
};
use chrono::Utc;
use hscode_core::models::{ClassificationQuery, SearchResponse, TariffRecord};
use hscode_core::{Classifier, TariffIndex};
use providers::ProviderError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

const SAMPLE_SIZE: usize = 20;

pub struct AppState {
    index: OnceCell<Arc<TariffIndex>>,
    load_error: OnceCell<String>,
    classifier: Arc<Classifier>,
}

impl AppState {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self {
            index: OnceCell::new(),
            load_error: OnceCell::new(),
            classifier,
        }
    }

    /// Publishes the loaded index. Only the first call has any effect.
    pub fn set_index(&self, index: TariffIndex) -> bool {
        self.index.set(Arc::new(index)).is_ok()
    }

    pub fn index(&self) -> Option<&TariffIndex> {
        self.index.get().map(Arc::as_ref)
    }

    /// Records that the index will never arrive.
    pub fn set_load_error(&self, message: impl Into<String>) -> bool {
        self.load_error.set(message.into()).is_ok()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.get().map(String::as_str)
    }
}

const LOAD_FAILED: &str = "Tariff data failed to load";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health<'a> {
    status: &'static str,
    tariff_codes_loaded: usize,
    context_length: usize,
    timestamp: String,
    model: Option<&'a str>,
    error: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CodesDump<'a> {
    total: usize,
    sample: &'a [TariffRecord],
    all_codes: Vec<&'a str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[get("/health")]
async fn health(state: web::Data<AppState>) -> impl Responder {
    let index = state.index();
    let status = match (index, state.load_error()) {
        (Some(_), _) => "OK",
        (None, Some(_)) => "ERROR",
        (None, None) => "LOADING",
    };
    HttpResponse::Ok().json(Health {
        status,
        tariff_codes_loaded: index.map_or(0, |i| i.records().len()),
        context_length: index.map_or(0, |i| i.context().len()),
        timestamp: Utc::now().to_rfc3339(),
        model: state.classifier.primary_model(),
        error: index.is_none().then(|| state.load_error()).flatten(),
    })
}

#[post("/search-hs-code")]
async fn search_hs_code(
    state: web::Data<AppState>,
    query: web::Json<ClassificationQuery>,
) -> impl Responder {
    let query = query.into_inner();
    info!(follow_up = query.is_follow_up, "search request");
    if state.index().is_none() && state.load_error().is_some() {
        return HttpResponse::ServiceUnavailable().json(SearchResponse::from_error(LOAD_FAILED));
    }
    match state.classifier.classify(state.index(), &query).await {
        Ok(outcome) => {
            info!(source = ?outcome.source, "search resolved");
            HttpResponse::Ok().json(SearchResponse::from_resolution(&outcome.resolution))
        }
        Err(e) => {
            warn!(code = e.code(), error = %e, "search failed");
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(SearchResponse::from_error(e.public_message()))
        }
    }
}

#[get("/hs-codes")]
async fn hs_codes(state: web::Data<AppState>) -> impl Responder {
    let Some(index) = state.index() else {
        let error = match state.load_error() {
            Some(_) => LOAD_FAILED,
            None => "Tariff data is not loaded yet",
        };
        return HttpResponse::ServiceUnavailable().json(ErrorBody {
            error: error.to_string(),
        });
    };
    let records = index.records();
    HttpResponse::Ok().json(CodesDump {
        total: records.len(),
        sample: &records[..records.len().min(SAMPLE_SIZE)],
        all_codes: records.iter().map(|r| r.code.as_str()).collect(),
    })
}

#[get("/groq-models")]
async fn groq_models(state: web::Data<AppState>) -> impl Responder {
    let Some(llm) = state.classifier.backend() else {
        return HttpResponse::ServiceUnavailable().json(ErrorBody {
            error: "No model backend is configured".to_string(),
        });
    };
    match llm.list_models().await {
        Ok(models) => HttpResponse::Ok().json(models),
        Err(e) => {
            warn!(error = %e, "listing models failed");
            let status = match e {
                ProviderError::Unauthorized => StatusCode::UNAUTHORIZED,
                ProviderError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            };
            HttpResponse::build(status).json(ErrorBody {
                error: "Could not list backend models".to_string(),
            })
        }
    }
}

/// Mounts the `/api` routes. Malformed JSON bodies get the zeroed search shape with 400.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default().error_handler(|err, _req| {
        warn!(error = %err, "rejected request body");
        let response = HttpResponse::BadRequest()
            .json(SearchResponse::from_error("Invalid request body"));
        InternalError::from_response(err, response).into()
    });
    cfg.service(
        web::scope("/api")
            .app_data(json)
            .service(health)
            .service(search_hs_code)
            .service(hs_codes)
            .service(groq_models),
    );
}

pub fn start_server(state: web::Data<AppState>, host: &str, port: u16) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();
    info!(%host, port, "listening");
    Ok(server)
}
