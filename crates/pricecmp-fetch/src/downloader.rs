//! Per-chain acquisition run.
//!
//! One [`ChainDownloader`] drives a chain through its stages in order:
//! store list, store discovery, prices, promotions. Stages are independent;
//! a failed stage is recorded and the next one still runs with whatever
//! store set is known. Protocol and extra-column differences live in the
//! chain's profile and catalog, not in the control flow here.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use pricecmp_core::{Category, ChainProfile};

use crate::catalog::{Catalog, CatalogQuery};
use crate::client::PriceClient;
use crate::error::FetchError;
use crate::events::{EventSink, PipelineEvent};
use crate::extract::extract;
use crate::selector::{select, SelectionPolicy};
use crate::types::{
    ExtractedArtifact, FileDescriptor, RunReport, RunStatus, Stage, StageOutcome, StageStatus,
};

pub struct ChainDownloader {
    profile: Arc<ChainProfile>,
    client: Arc<PriceClient>,
    output_root: PathBuf,
    sink: Arc<dyn EventSink>,
    policy: SelectionPolicy,
}

/// Store set the price and promo stages are narrowed to.
#[derive(Debug, Clone)]
enum StoreScope {
    /// Discovery failed; every listed store is kept.
    Unknown,
    Known(BTreeSet<String>),
}

impl StoreScope {
    fn admits(&self, descriptor: &FileDescriptor) -> bool {
        match (self, descriptor.store_key.as_deref()) {
            (StoreScope::Unknown, _) | (StoreScope::Known(_), None) => true,
            (StoreScope::Known(stores), Some(store)) => stores.contains(store),
        }
    }
}

/// Mutable bookkeeping for one run, turned into a [`RunReport`] at the end.
#[derive(Debug, Default)]
struct RunLedger {
    counts: BTreeMap<Category, usize>,
    stages: Vec<StageOutcome>,
    artifacts: Vec<ExtractedArtifact>,
    errors: Vec<String>,
}

impl RunLedger {
    fn finish(self, retailer_key: &str, started_at: DateTime<Utc>) -> RunReport {
        let downloaded: usize = self.counts.values().sum();
        let status = if downloaded > 0 {
            RunStatus::Succeeded
        } else if self.errors.is_empty() {
            RunStatus::Empty
        } else {
            RunStatus::Failed
        };
        RunReport {
            retailer_key: retailer_key.to_string(),
            success: status != RunStatus::Failed,
            status,
            counts: self.counts,
            stages: self.stages,
            artifacts: self.artifacts,
            errors: self.errors,
            started_at,
            ended_at: Utc::now(),
        }
    }
}

impl ChainDownloader {
    #[must_use]
    pub fn new(
        profile: Arc<ChainProfile>,
        client: Arc<PriceClient>,
        output_root: PathBuf,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            profile,
            client,
            output_root,
            sink,
            policy: SelectionPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &ChainProfile {
        &self.profile
    }

    /// Runs every stage for `date` and reports what was written.
    ///
    /// Never fails: catalog, fetch and extraction errors end up in
    /// [`RunReport::errors`]. Only an unusable profile (bad base URL) fails
    /// the whole run up front.
    pub async fn run(&self, date: NaiveDate) -> RunReport {
        let started_at = Utc::now();
        let key = self.profile.key.as_str();
        tracing::info!(retailer = key, %date, protocol = %self.profile.protocol, "chain run starting");

        let catalog = match Catalog::for_profile(&self.profile) {
            Ok(catalog) => catalog,
            Err(e) => {
                self.emit_error(None, &e);
                return RunReport::failed(key, started_at, e.to_string());
            }
        };

        let mut ledger = RunLedger::default();

        if self.profile.wants(Category::StoreList) {
            let listing = self
                .list(&catalog, date, Stage::FetchingStoreList, &[Category::StoreList])
                .await;
            self.download_stage(
                &catalog,
                Stage::FetchingStoreList,
                listing,
                &[Category::StoreList],
                &StoreScope::Unknown,
                &mut ledger,
            )
            .await;
        } else {
            self.skip(Stage::FetchingStoreList, &mut ledger);
        }

        let price_categories = self.wanted(Category::is_price);
        let promo_categories = self.wanted(Category::is_promo);
        let (scope, scan) = self
            .discover_stores(&catalog, date, &price_categories, &promo_categories, &mut ledger)
            .await;

        for (stage, categories) in [
            (Stage::FetchingPrices, price_categories),
            (Stage::FetchingPromos, promo_categories),
        ] {
            if categories.is_empty() {
                self.skip(stage, &mut ledger);
                continue;
            }
            let listing = match &scan {
                Some(cached) => {
                    self.start_stage(stage);
                    Ok(cached
                        .iter()
                        .filter(|d| categories.contains(&d.category))
                        .cloned()
                        .collect())
                }
                None => self.list(&catalog, date, stage, &categories).await,
            };
            self.download_stage(&catalog, stage, listing, &categories, &scope, &mut ledger)
                .await;
        }

        let report = ledger.finish(key, started_at);
        tracing::info!(
            retailer = key,
            status = ?report.status,
            files = report.files_downloaded(),
            bytes = report.bytes_written(),
            errors = report.errors.len(),
            "chain run finished"
        );
        report
    }

    fn wanted(&self, filter: fn(Category) -> bool) -> Vec<Category> {
        self.profile
            .categories
            .iter()
            .copied()
            .filter(|c| filter(*c))
            .collect()
    }

    async fn list(
        &self,
        catalog: &Catalog,
        date: NaiveDate,
        stage: Stage,
        categories: &[Category],
    ) -> Result<Vec<FileDescriptor>, FetchError> {
        self.start_stage(stage);
        catalog
            .list_files(&self.client, &self.profile, date, &CatalogQuery::categories(categories))
            .await
    }

    /// Works out the store set for the price and promo stages.
    ///
    /// Configured stores are used as-is. Otherwise every price and promo file
    /// published for `date` is listed once; the listing is returned so the
    /// following stages reuse it instead of asking the catalog again.
    async fn discover_stores(
        &self,
        catalog: &Catalog,
        date: NaiveDate,
        price_categories: &[Category],
        promo_categories: &[Category],
        ledger: &mut RunLedger,
    ) -> (StoreScope, Option<Vec<FileDescriptor>>) {
        let stage = Stage::DiscoveringStores;

        if !self.profile.stores.is_empty() {
            self.start_stage(stage);
            let stores: BTreeSet<String> = self.profile.stores.iter().cloned().collect();
            self.finish_stage(stage, StageStatus::Completed, stores.len(), ledger);
            return (StoreScope::Known(stores), None);
        }

        let categories: Vec<Category> = price_categories
            .iter()
            .chain(promo_categories)
            .copied()
            .collect();
        if categories.is_empty() {
            self.skip(stage, ledger);
            return (StoreScope::Unknown, None);
        }

        match self.list(catalog, date, stage, &categories).await {
            Ok(listing) => {
                let stores: BTreeSet<String> =
                    listing.iter().filter_map(|d| d.store_key.clone()).collect();
                let status = if stores.is_empty() {
                    StageStatus::Empty
                } else {
                    StageStatus::Completed
                };
                self.finish_stage(stage, status, stores.len(), ledger);
                (StoreScope::Known(stores), Some(listing))
            }
            Err(FetchError::Empty { .. }) => {
                self.finish_stage(stage, StageStatus::Empty, 0, ledger);
                (StoreScope::Known(BTreeSet::new()), Some(Vec::new()))
            }
            Err(e) => {
                self.record_error(stage, &e, None, ledger);
                self.finish_stage(stage, StageStatus::Failed, 0, ledger);
                (StoreScope::Unknown, None)
            }
        }
    }

    /// Selects and downloads the latest file per store for one stage.
    async fn download_stage(
        &self,
        catalog: &Catalog,
        stage: Stage,
        listing: Result<Vec<FileDescriptor>, FetchError>,
        categories: &[Category],
        scope: &StoreScope,
        ledger: &mut RunLedger,
    ) {
        let candidates = match listing {
            Ok(listing) => listing,
            Err(FetchError::Empty { .. }) => {
                self.finish_stage(stage, StageStatus::Empty, 0, ledger);
                return;
            }
            Err(e) => {
                self.record_error(stage, &e, None, ledger);
                self.finish_stage(stage, StageStatus::Failed, 0, ledger);
                return;
            }
        };

        let in_scope: Vec<FileDescriptor> =
            candidates.into_iter().filter(|d| scope.admits(d)).collect();
        let selected = select(&in_scope, categories, self.policy);
        if selected.is_empty() {
            self.finish_stage(stage, StageStatus::Empty, 0, ledger);
            return;
        }

        let mut downloaded = 0usize;
        let mut failed = 0usize;
        for descriptor in selected.values() {
            self.sink.emit(&PipelineEvent::FileSelected {
                retailer: self.profile.key.clone(),
                label: self.label_for(descriptor),
                remote_name: descriptor.remote_name.clone(),
                category: descriptor.category,
                store_key: descriptor.store_key.clone(),
            });
            match self.download_one(catalog, descriptor).await {
                Ok(artifacts) => {
                    downloaded += 1;
                    *ledger.counts.entry(descriptor.category).or_insert(0) += 1;
                    ledger.artifacts.extend(artifacts);
                }
                Err(e) => {
                    failed += 1;
                    self.record_error(stage, &e, Some(descriptor), ledger);
                }
            }
        }

        let status = if downloaded == 0 && failed > 0 {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        self.finish_stage(stage, status, downloaded, ledger);
    }

    /// Resolves, fetches and extracts one selected file.
    async fn download_one(
        &self,
        catalog: &Catalog,
        descriptor: &FileDescriptor,
    ) -> Result<Vec<ExtractedArtifact>, FetchError> {
        let url = catalog.resolve_download_url(&self.client, descriptor).await?;
        let fetched = self.client.fetch_file(&url).await?;
        tracing::debug!(
            retailer = %self.profile.key,
            file = %descriptor.remote_name,
            attempts = fetched.attempts,
            bytes = fetched.bytes.len(),
            "file fetched"
        );

        let out_dir = self
            .output_root
            .join(&self.profile.key)
            .join(descriptor.category.dir_name());
        let name = descriptor.remote_name.clone();
        let target = out_dir.clone();
        let paths = tokio::task::spawn_blocking(move || extract(&fetched.bytes, &name, &target))
            .await
            .map_err(|e| FetchError::Write {
                path: out_dir.clone(),
                source: std::io::Error::other(e),
            })??;

        let mut artifacts = Vec::with_capacity(paths.len());
        for local_path in paths {
            let metadata = tokio::fs::metadata(&local_path)
                .await
                .map_err(|source| FetchError::Write {
                    path: local_path.clone(),
                    source,
                })?;
            artifacts.push(ExtractedArtifact {
                source: descriptor.clone(),
                local_path,
                byte_size: metadata.len(),
                extracted_at: Utc::now(),
            });
        }
        Ok(artifacts)
    }

    /// Display label with the sub-brand folded in. Chains with the extra
    /// column carry it as the leading part of the store key.
    fn label_for(&self, descriptor: &FileDescriptor) -> String {
        let extra = if self.profile.has_extra_column {
            descriptor
                .store_key
                .as_deref()
                .and_then(sub_brand)
        } else {
            None
        };
        self.profile.display_name_with(extra)
    }

    fn start_stage(&self, stage: Stage) {
        self.sink.emit(&PipelineEvent::StageStarted {
            retailer: self.profile.key.clone(),
            stage,
        });
    }

    fn skip(&self, stage: Stage, ledger: &mut RunLedger) {
        self.finish_stage(stage, StageStatus::Skipped, 0, ledger);
    }

    fn finish_stage(&self, stage: Stage, status: StageStatus, count: usize, ledger: &mut RunLedger) {
        self.sink.emit(&PipelineEvent::StageFinished {
            retailer: self.profile.key.clone(),
            stage,
            status,
            count,
        });
        ledger.stages.push(StageOutcome {
            stage,
            status,
            count,
        });
    }

    fn record_error(
        &self,
        stage: Stage,
        error: &FetchError,
        descriptor: Option<&FileDescriptor>,
        ledger: &mut RunLedger,
    ) {
        self.emit_error(Some(stage), error);
        let message = match descriptor {
            Some(d) => format!("{stage}: {}: {error}", d.remote_name),
            None => format!("{stage}: {error}"),
        };
        ledger.errors.push(message);
    }

    fn emit_error(&self, stage: Option<Stage>, error: &FetchError) {
        self.sink.emit(&PipelineEvent::Error {
            retailer: self.profile.key.clone(),
            stage,
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Sub-brand part of a composed `<extra>-<store>` key. The sub-brand may
/// itself contain dashes; store ids do not.
fn sub_brand(store_key: &str) -> Option<&str> {
    store_key.rsplit_once('-').map(|(extra, _)| extra)
}
