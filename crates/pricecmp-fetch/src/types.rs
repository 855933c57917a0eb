//! Records flowing through one acquisition run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pricecmp_core::Category;
use serde::Serialize;
use uuid::Uuid;

/// One remote file as reported by a catalog, before it is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub remote_name: String,
    pub category: Category,
    /// `None` for chain-wide files not tied to a branch.
    pub store_key: Option<String>,
    pub retailer_key: String,
    pub published_at: Option<NaiveDateTime>,
    /// Opaque download reference: a URL, or a file token the catalog resolves.
    pub download_ref: String,
}

/// Grouping key for selection: store (or chain-wide) plus category.
pub type SelectionKey = (Option<String>, Category);

/// At most one descriptor per [`SelectionKey`].
pub type SelectionResult = BTreeMap<SelectionKey, FileDescriptor>;

/// A normalized file written to disk after fetch and extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedArtifact {
    pub source: FileDescriptor,
    pub local_path: PathBuf,
    pub byte_size: u64,
    pub extracted_at: DateTime<Utc>,
}

/// Steps of one chain run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchingStoreList,
    DiscoveringStores,
    FetchingPrices,
    FetchingPromos,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::FetchingStoreList => write!(f, "fetching_store_list"),
            Stage::DiscoveringStores => write!(f, "discovering_stores"),
            Stage::FetchingPrices => write!(f, "fetching_prices"),
            Stage::FetchingPromos => write!(f, "fetching_promos"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// The catalog is valid but publishes nothing relevant.
    Empty,
    Failed,
    /// Not requested for this chain.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    /// Files downloaded by the stage (stores found, for discovery).
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// Nothing was published and nothing failed.
    Empty,
    Failed,
}

/// Outcome of one chain downloader invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub retailer_key: String,
    pub success: bool,
    pub status: RunStatus,
    /// Downloaded files per category.
    pub counts: BTreeMap<Category, usize>,
    pub stages: Vec<StageOutcome>,
    pub artifacts: Vec<ExtractedArtifact>,
    /// Causal errors and non-fatal warnings, oldest first.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RunReport {
    /// Report for a chain whose run never produced its own report.
    #[must_use]
    pub fn failed(retailer_key: &str, started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            retailer_key: retailer_key.to_string(),
            success: false,
            status: RunStatus::Failed,
            counts: BTreeMap::new(),
            stages: Vec::new(),
            artifacts: Vec::new(),
            errors: vec![error],
            started_at,
            ended_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn files_downloaded(&self) -> usize {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.artifacts.iter().map(|a| a.byte_size).sum()
    }

    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Aggregate of every chain's [`RunReport`] for one coordinator run, in
/// chain declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub reports: Vec<RunReport>,
    pub total_files: usize,
    pub total_bytes: u64,
    pub overall_success_count: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl CoordinatorReport {
    #[must_use]
    pub fn from_reports(
        date: NaiveDate,
        reports: Vec<RunReport>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let total_files = reports.iter().map(RunReport::files_downloaded).sum();
        let total_bytes = reports.iter().map(RunReport::bytes_written).sum();
        let overall_success_count = reports.iter().filter(|r| r.success).count();
        Self {
            run_id: Uuid::new_v4(),
            date,
            reports,
            total_files,
            total_bytes,
            overall_success_count,
            started_at,
            ended_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn report(&self, retailer_key: &str) -> Option<&RunReport> {
        self.reports.iter().find(|r| r.retailer_key == retailer_key)
    }
}
