// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::actions::ManualDraft;
use crate::ingest::types::FeedConfig;
use crate::metrics::Metrics;
use crate::orchestrator::{Listing, Pipeline, ViewStatus};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn create_router(pipeline: Arc<Pipeline>, metrics: &Metrics) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/articles", get(list_articles).post(add_manual))
        .route("/api/articles/save", post(toggle_save))
        .route("/api/articles/archive", post(archive))
        .route("/api/articles/unarchive", post(unarchive))
        .route("/api/articles/delete", post(delete))
        .route("/api/feeds", get(list_feeds).post(add_feed))
        .route("/api/feeds/remove", post(remove_feed))
        .route("/api/feeds/enabled", post(set_feed_enabled))
        .route("/api/feeds/status", get(feed_status))
        .route("/api/refresh", post(refresh))
        .route("/api/import", post(import))
        .route("/api/export", get(export))
        .route("/api/remote/load", post(load_from_remote))
        .route("/api/remote/status", get(remote_status))
        .merge(metrics.router::<AppState>())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ArticlesQuery {
    #[serde(default)]
    view: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArticlesResponse {
    status: ViewStatus,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    count: usize,
    articles: Vec<crate::article::Article>,
}

async fn list_articles(
    State(state): State<AppState>,
    Query(q): Query<ArticlesQuery>,
) -> Response {
    let listing = match q.view.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("active") => Listing::Active,
        Some("saved") => Listing::Saved,
        Some("archived") => Listing::Archived,
        Some(other) => {
            return error(StatusCode::BAD_REQUEST, format!("unknown view `{other}`"));
        }
    };
    let category = q.category.as_deref().filter(|c| !c.is_empty() && *c != "All");

    let view = state.pipeline.view();
    let articles = view.select(listing, category);
    Json(ArticlesResponse {
        status: view.status.clone(),
        updated_at: view.updated_at,
        count: articles.len(),
        articles,
    })
    .into_response()
}

#[derive(Deserialize)]
struct IdReq {
    id: String,
}

async fn add_manual(State(state): State<AppState>, Json(draft): Json<ManualDraft>) -> Response {
    match state.pipeline.add_manual(draft).await {
        Ok(article) => (StatusCode::CREATED, Json(article)).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, format!("{e:#}")),
    }
}

#[derive(Serialize)]
struct SavedResponse {
    saved: bool,
}

async fn toggle_save(State(state): State<AppState>, Json(req): Json<IdReq>) -> Response {
    match state.pipeline.toggle_save(&req.id).await {
        Ok(saved) => Json(SavedResponse { saved }).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, format!("{e:#}")),
    }
}

async fn archive(State(state): State<AppState>, Json(req): Json<IdReq>) -> Response {
    match state.pipeline.archive(&req.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error(StatusCode::NOT_FOUND, format!("{e:#}")),
    }
}

async fn unarchive(State(state): State<AppState>, Json(req): Json<IdReq>) -> Response {
    match state.pipeline.unarchive(&req.id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, format!("`{}` is not archived", req.id)),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

async fn delete(State(state): State<AppState>, Json(req): Json<IdReq>) -> Response {
    match state.pipeline.delete(&req.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

async fn list_feeds(State(state): State<AppState>) -> Json<Vec<FeedConfig>> {
    Json(state.pipeline.feeds())
}

async fn add_feed(State(state): State<AppState>, Json(feed): Json<FeedConfig>) -> Response {
    match state.pipeline.add_feed(feed).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, format!("{e:#}")),
    }
}

#[derive(Deserialize)]
struct SourceReq {
    source: String,
}

async fn remove_feed(State(state): State<AppState>, Json(req): Json<SourceReq>) -> Response {
    match state.pipeline.remove_feed(&req.source).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, format!("no feed named `{}`", req.source)),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

#[derive(Deserialize)]
struct EnabledReq {
    source: String,
    enabled: bool,
}

async fn set_feed_enabled(State(state): State<AppState>, Json(req): Json<EnabledReq>) -> Response {
    match state.pipeline.set_feed_enabled(&req.source, req.enabled).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, format!("no feed named `{}`", req.source)),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}

async fn feed_status(State(state): State<AppState>) -> Response {
    Json(state.pipeline.view().feeds.clone()).into_response()
}

async fn refresh(State(state): State<AppState>) -> Response {
    if state.pipeline.spawn_cycle() {
        StatusCode::ACCEPTED.into_response()
    } else {
        error(StatusCode::CONFLICT, "a refresh is already running")
    }
}

#[derive(Serialize)]
struct MergeResponse {
    articles: usize,
}

async fn import(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.import(&body).await {
        Ok(articles) => Json(MergeResponse { articles }).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, format!("{e:#}")),
    }
}

async fn export(State(state): State<AppState>) -> Response {
    Json(state.pipeline.export()).into_response()
}

async fn load_from_remote(State(state): State<AppState>) -> Response {
    match state.pipeline.load_from_remote().await {
        Ok(articles) => Json(MergeResponse { articles }).into_response(),
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "load from remote failed");
            error(StatusCode::BAD_GATEWAY, format!("{e:#}"))
        }
    }
}

#[derive(Serialize)]
struct RemoteStatusResponse {
    status: crate::remote::RemoteStatus,
    id: Option<String>,
}

async fn remote_status(State(state): State<AppState>) -> Json<RemoteStatusResponse> {
    Json(RemoteStatusResponse {
        status: state.pipeline.remote_status(),
        id: state.pipeline.remote_id(),
    })
}
