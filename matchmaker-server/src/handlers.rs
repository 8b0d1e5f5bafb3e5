use actix_web::{web, HttpResponse};
use matchmaker::{Materialization, MatchmakerError, ViewSchema};
use serde::Deserialize;
use std::time::Duration;

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/ping", web::get().to(ping))
            .route("/status", web::get().to(status))
            // Collections
            .route("/collections", web::get().to(list_collections))
            .route("/collections", web::post().to(create_collection))
            .route("/collections/{name}/insert", web::post().to(insert_documents))
            // Views
            .route("/views", web::get().to(list_views))
            .route("/views", web::post().to(create_view))
            .route("/views/materialize", web::post().to(materialize_schema))
            .route("/views/{name}", web::get().to(get_view))
            .route("/views/{name}/insert", web::post().to(insert_manual))
            .route("/views/{name}/materialize", web::get().to(materialize_view)),
    );
}

#[derive(Deserialize)]
struct NameQuery {
    name: String,
}

#[derive(Deserialize)]
struct MaterializeQuery {
    source: String,
    deadline_ms: Option<u64>,
}

impl MaterializeQuery {
    fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn created_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Created().json(value)
}

fn err_response(e: MatchmakerError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match &e {
        MatchmakerError::CollectionNotFound(_) | MatchmakerError::ViewNotFound(_) => {
            HttpResponse::NotFound().json(body)
        }
        MatchmakerError::SchemaInvalid(_)
        | MatchmakerError::InvalidDocument(_)
        | MatchmakerError::InvalidName(_)
        | MatchmakerError::InvalidId(_)
        | MatchmakerError::Json(_) => HttpResponse::BadRequest().json(body),
        MatchmakerError::Conflict(_) => HttpResponse::Conflict().json(body),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// A JSON array of objects, or a single object.
fn into_documents(body: serde_json::Value) -> Vec<serde_json::Value> {
    match body {
        serde_json::Value::Array(docs) => docs,
        doc => vec![doc],
    }
}

fn ids_json(ids: &[matchmaker::DocumentId]) -> serde_json::Value {
    serde_json::json!({
        "ids": ids.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
    })
}

/// Records as the body; the partial-result flag and warning count as headers.
fn materialized_response(result: matchmaker::Result<Materialization>) -> HttpResponse {
    match result {
        Ok(m) => HttpResponse::Ok()
            .insert_header(("X-Materialize-Timed-Out", m.timed_out.to_string()))
            .insert_header(("X-Materialize-Warnings", m.warnings.len().to_string()))
            .json(&m.records),
        Err(e) => err_response(e),
    }
}

// ── Status ──────────────────────────────────────────────────────────

async fn ping() -> HttpResponse {
    ok_json(serde_json::json!({ "message": "pong" }))
}

async fn status(state: web::Data<AppState>) -> HttpResponse {
    match state.store.status().await {
        Ok(v) => ok_json(v),
        Err(e) => err_response(e),
    }
}

// ── Collections ─────────────────────────────────────────────────────

async fn list_collections(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_collections().await {
        Ok(names) => ok_json(serde_json::json!(names)),
        Err(e) => err_response(e),
    }
}

async fn create_collection(
    state: web::Data<AppState>,
    query: web::Query<NameQuery>,
) -> HttpResponse {
    match state.store.create_collection(&query.name).await {
        Ok(()) => created_json(serde_json::json!({ "created": query.name })),
        Err(e) => err_response(e),
    }
}

async fn insert_documents(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let collection = path.into_inner();
    match state
        .store
        .insert_many(&collection, into_documents(body.into_inner()))
        .await
    {
        Ok(ids) => created_json(ids_json(&ids)),
        Err(e) => err_response(e),
    }
}

// ── Views ───────────────────────────────────────────────────────────

async fn list_views(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_views().await {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(e) => err_response(e),
    }
}

async fn create_view(state: web::Data<AppState>, body: web::Json<ViewSchema>) -> HttpResponse {
    let schema = body.into_inner();
    match state.store.create_view(&schema).await {
        Ok(id) => created_json(serde_json::json!({
            "id": id.to_hex(),
            "view": schema.name,
            "manual_collection": schema.manual_collection(),
        })),
        Err(e) => err_response(e),
    }
}

async fn get_view(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.store.get_view(&path.into_inner()).await {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => err_response(e),
    }
}

async fn insert_manual(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let view = path.into_inner();
    match state
        .store
        .insert_manual(&view, into_documents(body.into_inner()))
        .await
    {
        Ok(ids) => created_json(ids_json(&ids)),
        Err(e) => err_response(e),
    }
}

// ── Materialization ─────────────────────────────────────────────────

async fn materialize_schema(
    state: web::Data<AppState>,
    query: web::Query<MaterializeQuery>,
    body: web::Json<ViewSchema>,
) -> HttpResponse {
    let deadline = query
        .deadline()
        .unwrap_or_else(|| state.engine.config().deadline());
    let result = state
        .engine
        .materialize_with_deadline(&body, &query.source, deadline)
        .await;
    materialized_response(result)
}

async fn materialize_view(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MaterializeQuery>,
) -> HttpResponse {
    let result = state
        .engine
        .materialize_view(&path.into_inner(), &query.source, query.deadline())
        .await;
    materialized_response(result)
}
