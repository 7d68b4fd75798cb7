//! Axum HTTP surface over the latest lead sync run.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use leadscope_classify::leads_to_csv;
use leadscope_core::{Category, Confidence, Lead};
use leadscope_sync::{list_runs, load_latest_run, LeadsDelta, QueryRegistry};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "leadscope-web";

#[derive(Clone)]
pub struct AppState {
    pub workspace_root: PathBuf,
}

impl AppState {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct LeadsQuery {
    category: Option<String>,
    confidence: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeadsPage {
    pub run_id: Option<String>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub leads: Vec<Lead>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/leads", get(leads_handler))
        .route("/leads.csv", get(leads_csv_handler))
        .route("/leads/{id}", get(lead_detail_handler))
        .route("/runs", get(runs_handler))
        .route("/queries", get(queries_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("LEADSCOPE_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let root = std::env::var("LEADSCOPE_WORKSPACE_ROOT").unwrap_or_else(|_| ".".to_string());
    let state = AppState::new(root);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "leadscope web listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn leads_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeadsQuery>,
) -> Response {
    let delta = match load_latest_run(&state.workspace_root) {
        Ok(delta) => delta,
        Err(err) => return server_error(err),
    };
    let filters = match parse_filters(&query) {
        Ok(filters) => filters,
        Err(message) => {
            let body = Json(serde_json::json!({ "error": message }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }
    };
    Json(filtered_paginated_leads(delta.as_ref(), filters, &query)).into_response()
}

async fn leads_csv_handler(State(state): State<Arc<AppState>>) -> Response {
    let delta = match load_latest_run(&state.workspace_root) {
        Ok(delta) => delta,
        Err(err) => return server_error(err),
    };
    let leads = delta.map(|d| d.leads).unwrap_or_default();
    match leads_to_csv(&leads) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"leads.csv\""),
            ],
            body,
        )
            .into_response(),
        Err(err) => server_error(err.into()),
    }
}

async fn lead_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    match load_latest_run(&state.workspace_root) {
        Ok(delta) => match delta.and_then(|d| d.leads.into_iter().find(|l| l.id == id)) {
            Some(lead) => Json(lead).into_response(),
            None => {
                let body = Json(serde_json::json!({ "error": "lead not found" }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
        },
        Err(err) => server_error(err),
    }
}

async fn runs_handler(State(state): State<Arc<AppState>>) -> Response {
    match list_runs(&state.workspace_root) {
        Ok(runs) => Json(runs).into_response(),
        Err(err) => server_error(err),
    }
}

async fn queries_handler(State(state): State<Arc<AppState>>) -> Response {
    match QueryRegistry::load(&state.workspace_root) {
        Ok(registry) => Json(registry.queries).into_response(),
        Err(err) => server_error(err),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": format!("{err:#}") })),
    )
        .into_response()
}

type Filters = (Option<Category>, Option<Confidence>);

fn parse_filters(query: &LeadsQuery) -> Result<Filters, String> {
    let category = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<Category>().map_err(|e| e.to_string())?),
        None => None,
    };
    let confidence = match query.confidence.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<Confidence>().map_err(|e| e.to_string())?),
        None => None,
    };
    Ok((category, confidence))
}

/// `confidence` filters to that tier or better.
fn filtered_paginated_leads(
    delta: Option<&LeadsDelta>,
    filters: Filters,
    query: &LeadsQuery,
) -> LeadsPage {
    let (category, confidence) = filters;
    let filtered = delta
        .map(|d| d.leads.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(|l| category.map_or(true, |c| l.category == c))
        .filter(|l| confidence.map_or(true, |c| l.confidence >= c))
        .cloned()
        .collect::<Vec<_>>();

    let per_page = query.per_page.unwrap_or(25).clamp(1, 500);
    let total = filtered.len();
    let total_pages = total.max(1).div_ceil(per_page);
    let page = query.page.unwrap_or(1).clamp(1, total_pages);
    let leads = filtered
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    LeadsPage {
        run_id: delta.map(|d| d.run.run_id.to_string()),
        total,
        page,
        total_pages,
        leads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use leadscope_search::SearchMode;
    use leadscope_sync::{LeadRunRecord, QueryOutcome};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn lead(id: &str, name: &str, category: Category, confidence: Confidence) -> Lead {
        Lead {
            id: id.to_string(),
            name: name.to_string(),
            headline: "Owner, Test Co".to_string(),
            profile_url: format!("https://linkedin.com/in/{id}"),
            snippet: String::new(),
            category,
            confidence,
            source: "Baltimore caterers".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).single().unwrap(),
        }
    }

    fn seeded_workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).single().unwrap();
        let delta = LeadsDelta {
            run: LeadRunRecord {
                run_id,
                started_at: at,
                finished_at: at,
                status: "completed".to_string(),
                batch_token: "abcd1234".to_string(),
            },
            queries: vec![QueryOutcome {
                query_id: "baltimore-caterers".to_string(),
                label: "Baltimore caterers".to_string(),
                mode: SearchMode::Fixture,
                candidates: 3,
                leads: 3,
                error: None,
            }],
            leads: vec![
                lead("jane", "Jane Doe", Category::KitchenTenant, Confidence::High),
                lead("rosa", "Rosa Park", Category::EventClient, Confidence::Medium),
                lead("tom", "Tom Baker", Category::KitchenTenant, Confidence::Low),
            ],
        };
        let run_dir = dir.path().join("reports").join(run_id.to_string());
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(
            run_dir.join("leads_delta.json"),
            serde_json::to_vec_pretty(&delta).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("queries.yaml"),
            "queries:\n  - query_id: baltimore-caterers\n    label: Baltimore caterers\n    category: Kitchen Tenant\n    query: caterer Baltimore\n    mode: fixture\n",
        )
        .unwrap();
        dir
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn handler_smoke_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(app(AppState::new(dir.path())), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn leads_filter_by_category_and_minimum_confidence() {
        let dir = seeded_workspace();
        let (status, body) = get(
            app(AppState::new(dir.path())),
            "/leads?category=kitchen_tenant&confidence=medium",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let page: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["total"], 1);
        assert_eq!(page["leads"][0]["name"], "Jane Doe");
        assert_eq!(page["leads"][0]["category"], "Kitchen Tenant");
    }

    #[tokio::test]
    async fn unknown_filter_is_bad_request() {
        let dir = seeded_workspace();
        let router = app(AppState::new(dir.path()));
        let (status, body) = get(router.clone(), "/leads?category=warehouse").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("unknown category: warehouse"));

        let (status, body) = get(router, "/leads?confidence=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("unknown confidence: bogus"));
    }

    #[tokio::test]
    async fn leads_paginate() {
        let dir = seeded_workspace();
        let (_, body) = get(app(AppState::new(dir.path())), "/leads?per_page=2&page=2").await;
        let page: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["total"], 3);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["leads"].as_array().unwrap().len(), 1);
        assert_eq!(page["leads"][0]["name"], "Tom Baker");
    }

    #[tokio::test]
    async fn csv_download_uses_serializer_output() {
        let dir = seeded_workspace();
        let resp = app(AppState::new(dir.path()))
            .oneshot(axum::http::Request::builder().uri("/leads.csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("Name,Headline,Category"));
        assert!(text.contains("Jane Doe,\"Owner, Test Co\",Kitchen Tenant,High"));
    }

    #[tokio::test]
    async fn csv_download_without_runs_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(app(AppState::new(dir.path())), "/leads.csv").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn lead_detail_and_missing_lead() {
        let dir = seeded_workspace();
        let router = app(AppState::new(dir.path()));
        let (status, body) = get(router.clone(), "/leads/rosa").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Rosa Park"));

        let (status, _) = get(router, "/leads/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn runs_and_queries_are_listed() {
        let dir = seeded_workspace();
        let router = app(AppState::new(dir.path()));
        let (status, body) = get(router.clone(), "/runs").await;
        assert_eq!(status, StatusCode::OK);
        let runs: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(runs.as_array().unwrap().len(), 1);

        let (status, body) = get(router, "/queries").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"query_id\":\"baltimore-caterers\""));
        assert!(body.contains("\"mode\":\"fixture\""));
    }
}
