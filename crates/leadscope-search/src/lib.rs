//! Search adapter contracts + live and fixture-first adapter implementations.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadscope_core::{Candidate, SearchQuery};
use leadscope_fetch::{FetchError, HttpFetcher};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadscope-search";

/// Only links under this path are treated as public profiles.
pub const PROFILE_PATH_MARKER: &str = "linkedin.com/in/";

const DEFAULT_NUM_RESULTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Live,
    Fixture,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub run_id: Uuid,
    pub requested_at: DateTime<Utc>,
}

impl SearchContext {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            requested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("search provider reported an error: {0}")]
    Provider(String),
    #[error("malformed search payload: {0}")]
    Payload(String),
    #[error("reading recorded response {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait SearchAdapter: Send + Sync {
    fn provider_id(&self) -> &'static str;
    async fn search(
        &self,
        http: &HttpFetcher,
        ctx: &SearchContext,
        query: &SearchQuery,
    ) -> Result<Vec<Candidate>, SearchError>;

    fn parse_results(&self, body: &str) -> Result<Vec<Candidate>, SearchError>;
}

/// Wire shape of a JSON search API response (organic results only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchApiResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

pub fn is_profile_link(link: &str) -> bool {
    link.to_ascii_lowercase().contains(PROFILE_PATH_MARKER)
}

fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Keeps profile links that carry a title, backfilling a missing position
/// with the 1-based result index.
pub fn organic_results_to_candidates(results: Vec<OrganicResult>) -> Vec<Candidate> {
    results
        .into_iter()
        .enumerate()
        .filter_map(|(idx, r)| {
            let link = r.link.as_deref().and_then(text_or_none)?;
            if !is_profile_link(&link) {
                return None;
            }
            let title = r.title.as_deref().and_then(text_or_none)?;
            Some(Candidate {
                title,
                snippet: r.snippet.unwrap_or_default().trim().to_string(),
                link,
                position: r.position.unwrap_or(idx as u32 + 1),
            })
        })
        .collect()
}

pub fn parse_search_api_json(body: &str) -> Result<Vec<Candidate>, SearchError> {
    let response: SearchApiResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Payload(e.to_string()))?;
    if let Some(message) = response.error {
        return Err(SearchError::Provider(message));
    }
    Ok(organic_results_to_candidates(response.organic_results))
}

fn select(selector: &str) -> Result<Selector, SearchError> {
    Selector::parse(selector).map_err(|e| SearchError::Message(e.to_string()))
}

fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|n| text_or_none(&n.text().collect::<String>()))
}

/// Parses a saved HTML results page where each hit is a `div.g` block with an
/// `h3` title, an anchor and a snippet container.
pub fn parse_result_page_html(html: &str) -> Result<Vec<Candidate>, SearchError> {
    let document = Html::parse_document(html);
    let result_sel = select("div.g")?;
    let title_sel = select("h3")?;
    let link_sel = select("a[href]")?;
    let snippet_sel = select(".VwiC3b, .snippet, span.st")?;

    let results = document
        .select(&result_sel)
        .map(|block| OrganicResult {
            title: first_text(&block, &title_sel),
            snippet: first_text(&block, &snippet_sel),
            link: block
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(ToString::to_string),
            position: None,
        })
        .collect::<Vec<_>>();
    Ok(organic_results_to_candidates(results))
}

/// Live adapter for a SerpAPI-style JSON endpoint.
#[derive(Debug, Clone)]
pub struct JsonSearchApiAdapter {
    base_url: String,
    api_key: String,
}

impl JsonSearchApiAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchAdapter for JsonSearchApiAdapter {
    fn provider_id(&self) -> &'static str {
        "search-api"
    }

    async fn search(
        &self,
        http: &HttpFetcher,
        ctx: &SearchContext,
        query: &SearchQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::Message(
                "search api key is not configured".to_string(),
            ));
        }
        let num = query.num_results.unwrap_or(DEFAULT_NUM_RESULTS);
        let params = [
            ("engine", "google".to_string()),
            ("q", query.query.clone()),
            ("num", num.to_string()),
            ("api_key", self.api_key.clone()),
        ];
        let resp = http
            .get_with_query(ctx.run_id, self.provider_id(), &self.base_url, &params)
            .await?;
        let candidates = self.parse_results(&resp.text())?;
        info!(
            query_id = %query.query_id,
            candidates = candidates.len(),
            "search api query completed"
        );
        Ok(candidates)
    }

    fn parse_results(&self, body: &str) -> Result<Vec<Candidate>, SearchError> {
        parse_search_api_json(body)
    }
}

/// Replays a recorded JSON response from `fixtures/<query_id>/response.json`.
#[derive(Debug, Clone)]
pub struct RecordedResponseAdapter {
    fixtures_root: PathBuf,
}

impl RecordedResponseAdapter {
    pub fn new(fixtures_root: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_root: fixtures_root.into(),
        }
    }

    pub fn response_path(&self, query_id: &str) -> PathBuf {
        self.fixtures_root.join(query_id).join("response.json")
    }
}

#[async_trait]
impl SearchAdapter for RecordedResponseAdapter {
    fn provider_id(&self) -> &'static str {
        "recorded-response"
    }

    async fn search(
        &self,
        _http: &HttpFetcher,
        _ctx: &SearchContext,
        query: &SearchQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        let body = read_fixture(&self.response_path(&query.query_id))?;
        self.parse_results(&body)
    }

    fn parse_results(&self, body: &str) -> Result<Vec<Candidate>, SearchError> {
        parse_search_api_json(body)
    }
}

/// Parses a saved results page from `fixtures/<query_id>/results.html`.
#[derive(Debug, Clone)]
pub struct HtmlResultPageAdapter {
    fixtures_root: PathBuf,
}

impl HtmlResultPageAdapter {
    pub fn new(fixtures_root: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_root: fixtures_root.into(),
        }
    }

    pub fn page_path(&self, query_id: &str) -> PathBuf {
        self.fixtures_root.join(query_id).join("results.html")
    }
}

#[async_trait]
impl SearchAdapter for HtmlResultPageAdapter {
    fn provider_id(&self) -> &'static str {
        "html-result-page"
    }

    async fn search(
        &self,
        _http: &HttpFetcher,
        _ctx: &SearchContext,
        query: &SearchQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        let body = read_fixture(&self.page_path(&query.query_id))?;
        self.parse_results(&body)
    }

    fn parse_results(&self, body: &str) -> Result<Vec<Candidate>, SearchError> {
        parse_result_page_html(body)
    }
}

fn read_fixture(path: &Path) -> Result<String, SearchError> {
    debug!(path = %path.display(), "reading recorded search response");
    fs::read_to_string(path).map_err(|source| SearchError::Fixture {
        path: path.to_path_buf(),
        source,
    })
}

/// Settings the factory needs to construct any adapter.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub api_base_url: String,
    pub api_key: String,
    pub fixtures_root: PathBuf,
}

pub fn adapter_for_mode(mode: SearchMode, settings: &AdapterSettings) -> Box<dyn SearchAdapter> {
    match mode {
        SearchMode::Live => Box::new(JsonSearchApiAdapter::new(
            settings.api_base_url.clone(),
            settings.api_key.clone(),
        )),
        SearchMode::Fixture => {
            Box::new(RecordedResponseAdapter::new(settings.fixtures_root.clone()))
        }
        SearchMode::Html => Box::new(HtmlResultPageAdapter::new(settings.fixtures_root.clone())),
    }
}
