use std::sync::Arc;

use actix_web::{HttpResponse, Responder, delete, get, post, web};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use crate::database::Store;
use crate::database::models::{Monitor, Subscriber};
use crate::monitoring::CheckRunner;
use crate::monitoring::types::MonitorStatus;
use crate::monitoring::validation::{validate_email, validate_monitor_target};

/// Shared handler state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub runner: Arc<CheckRunner>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_route)
        .service(list_monitors)
        .service(create_monitor)
        .service(delete_monitor)
        .service(list_subscribers)
        .service(create_subscriber)
        .service(delete_subscriber)
        .service(edge_update);
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

#[get("/monitors")]
async fn list_monitors(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let monitors = state.store.get_monitors().await?;
    Ok(HttpResponse::Ok().json(monitors))
}

#[derive(Debug, Deserialize)]
struct CreateMonitor {
    name: String,
    url: String,
}

#[post("/monitors")]
async fn create_monitor(
    state: web::Data<AppState>,
    body: web::Json<CreateMonitor>,
) -> Result<HttpResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Monitor name must not be empty".into()));
    }
    validate_monitor_target(&body.url).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if state.store.get_monitor_by_name(&body.name).await?.is_some() {
        return Err(ApiError::BadRequest(format!(
            "A monitor named {} already exists",
            body.name
        )));
    }

    let mut monitor = Monitor::new(body.name.clone(), body.url.clone());
    let id = match state.store.insert_monitor(&monitor).await {
        Ok(id) => id,
        // The pre-check above races with concurrent registrations; the
        // unique index on name is the authority.
        Err(error) if is_unique_violation(&error) => {
            return Err(ApiError::BadRequest(format!(
                "A monitor named {} already exists",
                body.name
            )));
        }
        Err(error) => return Err(error.into()),
    };
    monitor.id = Some(id);

    Ok(HttpResponse::Created().json(monitor))
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.to_string().contains("UNIQUE constraint failed"))
}

#[delete("/monitors/{uuid}")]
async fn delete_monitor(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state.store.delete_monitor(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/subscribers")]
async fn list_subscribers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let subscribers = state.store.get_subscribers().await?;
    Ok(HttpResponse::Ok().json(subscribers))
}

#[derive(Debug, Deserialize)]
struct SubscriberBody {
    email: String,
}

#[post("/subscribers")]
async fn create_subscriber(
    state: web::Data<AppState>,
    body: web::Json<SubscriberBody>,
) -> Result<HttpResponse, ApiError> {
    validate_email(&body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let subscriber = Subscriber::new(body.email.clone());
    state.store.upsert_subscriber(&subscriber).await?;

    Ok(HttpResponse::Created().json(subscriber))
}

#[delete("/subscribers")]
async fn delete_subscriber(
    state: web::Data<AppState>,
    body: web::Json<SubscriberBody>,
) -> Result<HttpResponse, ApiError> {
    state.store.delete_subscriber(&body.email).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
struct EdgeUpdate {
    name: String,
    status: MonitorStatus,
}

/// Delegated-report path: an external edge prober reports a status for a
/// monitor excluded from the local schedule. Feeds the same transition
/// pipeline as the internal loop.
#[post("/edge-update")]
async fn edge_update(
    state: web::Data<AppState>,
    body: web::Json<EdgeUpdate>,
) -> Result<HttpResponse, ApiError> {
    state.runner.apply_report(&body.name, body.status).await?;
    Ok(HttpResponse::Ok().finish())
}
