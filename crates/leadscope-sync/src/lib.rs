//! Lead sync orchestration: runs configured search queries one at a time,
//! classifies and merges the results, and writes run reports.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arrow_array::{RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, Utc};
use leadscope_classify::{leads_to_csv, merge_leads, CategoryScorer, KeywordTable, LeadBuilder};
use leadscope_core::{Lead, SearchQuery};
use leadscope_fetch::{HttpClientConfig, HttpFetcher, TokenBucketConfig};
use leadscope_search::{adapter_for_mode, AdapterSettings, SearchContext, SearchMode};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadscope-sync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRegistry {
    pub queries: Vec<QueryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(flatten)]
    pub query: SearchQuery,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
}

fn default_enabled() -> bool {
    true
}

fn default_mode() -> SearchMode {
    SearchMode::Live
}

impl QueryRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing query registry")
    }

    pub fn load(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join("queries.yaml");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &QueryConfig> {
        self.queries.iter().filter(|q| q.enabled)
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub workspace_root: PathBuf,
    pub search_api_url: String,
    pub search_api_key: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub query_delay_ms: u64,
    pub scheduler_enabled: bool,
    pub sync_cron: String,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let workspace_root = std::env::var("LEADSCOPE_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self {
            search_api_url: std::env::var("LEADSCOPE_SEARCH_API_URL")
                .unwrap_or_else(|_| "https://serpapi.com/search.json".to_string()),
            search_api_key: std::env::var("LEADSCOPE_SEARCH_API_KEY").unwrap_or_default(),
            user_agent: std::env::var("LEADSCOPE_USER_AGENT")
                .unwrap_or_else(|_| "leadscope-bot/0.1".to_string()),
            http_timeout_secs: std::env::var("LEADSCOPE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            query_delay_ms: std::env::var("LEADSCOPE_QUERY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            scheduler_enabled: std::env::var("LEADSCOPE_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            sync_cron: std::env::var("LEADSCOPE_SYNC_CRON")
                .unwrap_or_else(|_| "0 0 7 * * Mon-Fri".to_string()),
            ..Self::for_workspace(workspace_root)
        }
    }

    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            search_api_url: "https://serpapi.com/search.json".to_string(),
            search_api_key: String::new(),
            user_agent: "leadscope-bot/0.1".to_string(),
            http_timeout_secs: 20,
            query_delay_ms: 1000,
            scheduler_enabled: false,
            sync_cron: "0 0 7 * * Mon-Fri".to_string(),
        }
    }

    pub fn reports_root(&self) -> PathBuf {
        self.workspace_root.join("reports")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: String,
    pub batch_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query_id: String,
    pub label: String,
    pub mode: SearchMode,
    pub candidates: usize,
    pub leads: usize,
    #[serde(default)]
    pub error: Option<String>,
}

/// Contents of `reports/<run_id>/leads_delta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadsDelta {
    pub run: LeadRunRecord,
    pub queries: Vec<QueryOutcome>,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub enabled_queries: usize,
    pub failed_queries: usize,
    pub candidates: usize,
    pub built_leads: usize,
    pub unique_leads: usize,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub struct SyncPipeline {
    config: SyncConfig,
    http: HttpFetcher,
    scorer: Arc<CategoryScorer>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let rules_path = config.workspace_root.join("rules").join("categories.yaml");
        let table = KeywordTable::load_or_default(&rules_path)
            .with_context(|| format!("loading keyword table {}", rules_path.display()))?;
        Self::with_keyword_table(config, table)
    }

    pub fn with_keyword_table(config: SyncConfig, table: KeywordTable) -> Result<Self> {
        // one token per query delay keeps live queries paced one at a time
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            global_concurrency: 1,
            token_bucket: Some(TokenBucketConfig {
                capacity: 1,
                refill_every: Duration::from_millis(config.query_delay_ms),
            }),
        })?;
        Ok(Self {
            config,
            http,
            scorer: Arc::new(CategoryScorer::new(table)),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn load_query_registry(&self) -> Result<QueryRegistry> {
        let path = self.config.workspace_root.join("queries.yaml");
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        QueryRegistry::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            api_base_url: self.config.search_api_url.clone(),
            api_key: self.config.search_api_key.clone(),
            fixtures_root: self.config.workspace_root.join("fixtures"),
        }
    }

    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let registry = self.load_query_registry().await?;
        let enabled = registry.enabled().cloned().collect::<Vec<_>>();
        let ctx = SearchContext::new(run_id);
        let builder = LeadBuilder::new(Arc::clone(&self.scorer));
        let settings = self.adapter_settings();

        let mut outcomes = Vec::with_capacity(enabled.len());
        let mut lead_lists = Vec::with_capacity(enabled.len());

        for query_config in &enabled {
            let query = &query_config.query;
            let adapter = adapter_for_mode(query_config.mode, &settings);
            let span = info_span!(
                "search",
                %run_id,
                query_id = %query.query_id,
                provider = adapter.provider_id()
            );
            let result = adapter.search(&self.http, &ctx, query).instrument(span).await;

            let (candidates, error) = match result {
                Ok(candidates) => (candidates, None),
                Err(err) => {
                    warn!(
                        query_id = %query.query_id,
                        error = %err,
                        "search failed; continuing with zero candidates"
                    );
                    (Vec::new(), Some(err.to_string()))
                }
            };

            let leads = builder.build_for_query(&candidates, query);
            outcomes.push(QueryOutcome {
                query_id: query.query_id.clone(),
                label: query.label.clone(),
                mode: query_config.mode,
                candidates: candidates.len(),
                leads: leads.len(),
                error,
            });
            lead_lists.push(leads);
        }

        let built_leads = lead_lists.iter().map(Vec::len).sum::<usize>();
        let merged = merge_leads(lead_lists);
        let finished_at = Utc::now();

        let failed_queries = outcomes.iter().filter(|o| o.error.is_some()).count();
        let delta = LeadsDelta {
            run: LeadRunRecord {
                run_id,
                started_at,
                finished_at,
                status: if failed_queries == 0 {
                    "completed".to_string()
                } else {
                    "completed_with_errors".to_string()
                },
                batch_token: builder.batch_token().to_string(),
            },
            queries: outcomes,
            leads: merged,
        };

        let reports_dir = self.write_reports(&delta).await?;
        let manifest_path = self.export_parquet_snapshot(&reports_dir, &delta.leads).await?;

        info!(
            %run_id,
            queries = enabled.len(),
            failed_queries,
            built_leads,
            unique_leads = delta.leads.len(),
            "lead sync finished"
        );

        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at,
            enabled_queries: enabled.len(),
            failed_queries,
            candidates: delta.queries.iter().map(|o| o.candidates).sum(),
            built_leads,
            unique_leads: delta.leads.len(),
            reports_dir: reports_dir.display().to_string(),
            parquet_manifest: manifest_path.display().to_string(),
        })
    }

    pub async fn maybe_build_scheduler(self: &Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let pipeline = Arc::clone(self);
        let cron = self.config.sync_cron.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                match pipeline.run_once().await {
                    Ok(summary) => info!(
                        run_id = %summary.run_id,
                        unique_leads = summary.unique_leads,
                        "scheduled sync finished"
                    ),
                    Err(err) => error!(error = %err, "scheduled sync failed"),
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
        Ok(Some(sched))
    }

    async fn write_reports(&self, delta: &LeadsDelta) -> Result<PathBuf> {
        let reports_dir = self.config.reports_root().join(delta.run.run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        let csv = leads_to_csv(&delta.leads).context("rendering leads.csv")?;
        fs::write(reports_dir.join("leads.csv"), csv)
            .await
            .context("writing leads.csv")?;

        fs::write(reports_dir.join("daily_brief.md"), render_brief(delta))
            .await
            .context("writing daily_brief.md")?;

        let delta_json = serde_json::to_vec_pretty(delta).context("serializing leads delta")?;
        fs::write(reports_dir.join("leads_delta.json"), delta_json)
            .await
            .context("writing leads_delta.json")?;

        Ok(reports_dir)
    }

    async fn export_parquet_snapshot(&self, reports_dir: &Path, leads: &[Lead]) -> Result<PathBuf> {
        let snapshot_dir = reports_dir.join("snapshots");
        fs::create_dir_all(&snapshot_dir)
            .await
            .with_context(|| format!("creating {}", snapshot_dir.display()))?;

        let leads_path = snapshot_dir.join("leads.parquet");
        write_leads_parquet(&leads_path, leads)?;

        let manifest = ParquetManifest {
            schema_version: 1,
            files: vec![manifest_entry("leads", reports_dir, &leads_path)?],
        };
        let manifest_path = snapshot_dir.join("manifest.json");
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
        fs::write(&manifest_path, bytes)
            .await
            .with_context(|| format!("writing {}", manifest_path.display()))?;
        Ok(manifest_path)
    }
}

pub async fn run_sync_once_from_env() -> Result<SyncRunSummary> {
    let pipeline = SyncPipeline::new(SyncConfig::from_env())?;
    pipeline.run_once().await
}

fn render_brief(delta: &LeadsDelta) -> String {
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_confidence: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    for lead in &delta.leads {
        *by_category.entry(lead.category.to_string()).or_default() += 1;
        *by_confidence.entry(lead.confidence.to_string()).or_default() += 1;
        *by_source.entry(lead.source.clone()).or_default() += 1;
    }
    let counts = |map: &BTreeMap<String, usize>| {
        map.iter()
            .map(|(k, v)| format!("- {k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let failures = delta
        .queries
        .iter()
        .filter_map(|q| q.error.as_ref().map(|e| format!("- {}: {}", q.query_id, e)))
        .collect::<Vec<_>>();

    let mut brief = format!(
        "# Leadscope Daily Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Queries: {}\n- Unique leads: {}\n\n## By Category\n{}\n\n## By Confidence\n{}\n\n## By Source Query\n{}\n",
        delta.run.run_id,
        delta.run.started_at,
        delta.run.finished_at,
        delta.queries.len(),
        delta.leads.len(),
        counts(&by_category),
        counts(&by_confidence),
        counts(&by_source),
    );
    if !failures.is_empty() {
        brief.push_str(&format!("\n## Failed Queries\n{}\n", failures.join("\n")));
    }
    brief
}

/// Runs found under `reports/`, newest first.
pub fn list_runs(workspace_root: &Path) -> Result<Vec<LeadRunRecord>> {
    let reports_root = workspace_root.join("reports");
    if !reports_root.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(&reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
    {
        let entry = entry?;
        let delta_path = entry.path().join("leads_delta.json");
        if !delta_path.exists() {
            continue;
        }
        match read_delta(&delta_path) {
            Ok(delta) => runs.push(delta.run),
            Err(err) => warn!(
                path = %delta_path.display(),
                error = %format!("{err:#}"),
                "skipping unreadable run"
            ),
        }
    }
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(runs)
}

pub fn load_run(workspace_root: &Path, run_id: &str) -> Result<LeadsDelta> {
    read_delta(
        &workspace_root
            .join("reports")
            .join(run_id)
            .join("leads_delta.json"),
    )
}

pub fn load_latest_run(workspace_root: &Path) -> Result<Option<LeadsDelta>> {
    match list_runs(workspace_root)?.first() {
        Some(run) => load_run(workspace_root, &run.run_id.to_string()).map(Some),
        None => Ok(None),
    }
}

fn read_delta(path: &Path) -> Result<LeadsDelta> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn write_leads_parquet(path: &Path, leads: &[Lead]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("id", DataType::Utf8, false),
        ArrowField::new("name", DataType::Utf8, false),
        ArrowField::new("headline", DataType::Utf8, false),
        ArrowField::new("category", DataType::Utf8, false),
        ArrowField::new("confidence", DataType::Utf8, false),
        ArrowField::new("confidence_rank", DataType::UInt32, false),
        ArrowField::new("profile_url", DataType::Utf8, false),
        ArrowField::new("source", DataType::Utf8, false),
        ArrowField::new("scraped_at", DataType::Utf8, false),
    ]));

    let column = |f: fn(&Lead) -> String| {
        StringArray::from(leads.iter().map(|l| Some(f(l))).collect::<Vec<_>>())
    };
    let ranks = UInt32Array::from(
        leads
            .iter()
            .map(|l| u32::from(l.confidence.rank()))
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(column(|l| l.id.clone())),
            Arc::new(column(|l| l.name.clone())),
            Arc::new(column(|l| l.headline.clone())),
            Arc::new(column(|l| l.category.to_string())),
            Arc::new(column(|l| l.confidence.to_string())),
            Arc::new(ranks),
            Arc::new(column(|l| l.profile_url.clone())),
            Arc::new(column(|l| l.source.clone())),
            Arc::new(column(|l| l.scraped_at.to_rfc3339())),
        ],
    )
    .context("building leads record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256: hex::encode(hasher.finalize()),
        bytes: bytes.len() as u64,
    })
}
