use crate::errors::AppError;
use crate::models::*;
use crate::services::PersonService;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub persons: PersonService,
}

/// Person routes without transport-level middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/persons", post(add_person).get(get_persons))
        .route("/person/:id", get(get_person))
        .route("/person", patch(update_person).delete(delete_person))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /persons
///
/// Enriches the submitted name with age, gender and nationality and stores the result.
pub async fn add_person(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewPerson>, JsonRejection>,
) -> Result<Json<IdResponse>, AppError> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("POST /persons - name: {}", input.name);

    let id = state.persons.add_person(input).await?;
    Ok(Json(IdResponse { id }))
}

/// GET /person/:id
pub async fn get_person(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Person>, AppError> {
    let Path(id) = id.map_err(|e| AppError::BadRequest(format!("invalid id: {}", e.body_text())))?;
    tracing::info!("GET /person/{}", id);

    let person = state.persons.get_person(id).await?;
    Ok(Json(person))
}

/// GET /persons
///
/// Every query parameter is an optional exact-match filter; `limit` and `offset` page the result.
pub async fn get_persons(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<PersonFilter>, QueryRejection>,
) -> Result<Json<Vec<Person>>, AppError> {
    let Query(filter) = filter.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("GET /persons - filter: {:?}", filter);

    let persons = state.persons.get_persons(filter).await?;
    Ok(Json(persons))
}

/// PATCH /person
pub async fn update_person(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Person>, JsonRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Json(person) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("PATCH /person - id: {}", person.id);

    state.persons.update_person(person).await?;
    Ok(Json(StatusResponse::ok()))
}

/// DELETE /person
pub async fn delete_person(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PersonIdRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Json(PersonIdRequest { id }) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    tracing::info!("DELETE /person - id: {}", id);

    state.persons.delete_person(id).await?;
    Ok(Json(StatusResponse::ok()))
}
