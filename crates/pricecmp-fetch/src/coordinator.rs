//! Concurrent fan-out of chain downloaders for one date.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use pricecmp_core::ChainProfile;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::client::PriceClient;
use crate::downloader::ChainDownloader;
use crate::error::FetchError;
use crate::events::{EventSink, PipelineEvent};
use crate::selector::SelectionPolicy;
use crate::types::{CoordinatorReport, RunReport};

/// Chains running at once when the caller does not say otherwise.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

pub struct Coordinator {
    client: Arc<PriceClient>,
    output_root: PathBuf,
    sink: Arc<dyn EventSink>,
    max_concurrent: usize,
    run_timeout: Option<Duration>,
    policy: SelectionPolicy,
}

impl Coordinator {
    #[must_use]
    pub fn new(client: Arc<PriceClient>, output_root: PathBuf, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            output_root,
            sink,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            run_timeout: None,
            policy: SelectionPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Deadline for the whole run. Chains still running (or still queued)
    /// when it passes are reported as failed.
    #[must_use]
    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    #[must_use]
    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs every enabled chain for `date`.
    ///
    /// Always returns a report. Each chain runs in its own task, so a panic
    /// or timeout in one chain becomes that chain's failed [`RunReport`]
    /// while the others finish normally. Reports are ordered as `profiles`.
    pub async fn run_all(&self, profiles: &[ChainProfile], date: NaiveDate) -> CoordinatorReport {
        let started_at = Utc::now();
        let jobs: Vec<(String, BoxFuture<'static, RunReport>)> = profiles
            .iter()
            .filter(|p| {
                if !p.enabled {
                    tracing::debug!(retailer = %p.key, "chain disabled, skipping");
                }
                p.enabled
            })
            .map(|profile| {
                let downloader = ChainDownloader::new(
                    Arc::new(profile.clone()),
                    Arc::clone(&self.client),
                    self.output_root.clone(),
                    Arc::clone(&self.sink),
                )
                .with_selection_policy(self.policy);
                let job = async move { downloader.run(date).await }.boxed();
                (profile.key.clone(), job)
            })
            .collect();

        tracing::info!(
            %date,
            chains = jobs.len(),
            max_concurrent = self.max_concurrent,
            "download run starting"
        );

        let reports = self.settle(jobs).await;
        let report = CoordinatorReport::from_reports(date, reports, started_at);
        tracing::info!(
            run_id = %report.run_id,
            %date,
            chains = report.reports.len(),
            succeeded = report.overall_success_count,
            files = report.total_files,
            bytes = report.total_bytes,
            "download run finished"
        );
        report
    }

    /// Spawns every job under the concurrency cap and the run deadline, then
    /// awaits them in declaration order.
    async fn settle(&self, jobs: Vec<(String, BoxFuture<'static, RunReport>)>) -> Vec<RunReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let deadline = self
            .run_timeout
            .map(|t| (Instant::now() + t, u64::try_from(t.as_millis()).unwrap_or(u64::MAX)));

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(key, job)| {
                let semaphore = Arc::clone(&semaphore);
                let queued_at = Utc::now();
                let task_key = key.clone();
                let gated = async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return RunReport::failed(&task_key, queued_at, "scheduler closed".to_string());
                    };
                    job.await
                };
                let handle = tokio::spawn(async move {
                    match deadline {
                        Some((at, _)) => tokio::time::timeout_at(at, gated).await.ok(),
                        None => Some(gated.await),
                    }
                });
                (key, queued_at, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (key, queued_at, handle) in handles {
            let report = match handle.await {
                Ok(Some(report)) => report,
                Ok(None) => {
                    let millis = deadline.map_or(0, |(_, millis)| millis);
                    let error = FetchError::Timeout { millis };
                    self.emit_failure(&key, error.kind(), error.to_string());
                    RunReport::failed(&key, queued_at, format!("run timeout: {error}"))
                }
                Err(join_error) => {
                    let message = format!("chain task aborted: {join_error}");
                    self.emit_failure(&key, "panic", message.clone());
                    RunReport::failed(&key, queued_at, message)
                }
            };
            reports.push(report);
        }
        reports
    }

    fn emit_failure(&self, retailer: &str, kind: &'static str, message: String) {
        self.sink.emit(&PipelineEvent::Error {
            retailer: retailer.to_string(),
            stage: None,
            kind,
            message,
        });
    }
}
