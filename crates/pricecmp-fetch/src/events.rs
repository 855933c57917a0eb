//! Structured progress events emitted by the pipeline.
//!
//! The pipeline never writes to the console; it hands [`PipelineEvent`]s to
//! an [`EventSink`] chosen by the caller.

use std::sync::Mutex;

use pricecmp_core::Category;

use crate::types::{Stage, StageStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted {
        retailer: String,
        stage: Stage,
    },
    StageFinished {
        retailer: String,
        stage: Stage,
        status: StageStatus,
        count: usize,
    },
    FileSelected {
        retailer: String,
        /// Chain display name, with the sub-brand folded in when present.
        label: String,
        remote_name: String,
        category: Category,
        store_key: Option<String>,
    },
    Error {
        retailer: String,
        stage: Option<Stage>,
        kind: &'static str,
        message: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted { retailer, stage } => {
                tracing::debug!(retailer, %stage, "stage started");
            }
            PipelineEvent::StageFinished {
                retailer,
                stage,
                status,
                count,
            } => {
                tracing::info!(retailer, %stage, ?status, count, "stage finished");
            }
            PipelineEvent::FileSelected {
                retailer,
                label,
                remote_name,
                category,
                store_key,
            } => {
                tracing::debug!(
                    retailer,
                    label,
                    file = remote_name,
                    %category,
                    store = store_key.as_deref().unwrap_or("-"),
                    "file selected"
                );
            }
            PipelineEvent::Error {
                retailer,
                stage,
                kind,
                message,
            } => {
                tracing::warn!(
                    retailer,
                    stage = ?stage,
                    kind,
                    error = %message,
                    "pipeline error"
                );
            }
        }
    }
}

/// Keeps every event in memory; useful for tests and run summaries.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
