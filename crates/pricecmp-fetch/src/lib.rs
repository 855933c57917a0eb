//! Multi-retailer price file acquisition.
//!
//! For a target date, each enabled chain's catalog is listed, the latest file
//! per store and category is selected, fetched with retry and bot-block
//! fallback, and extracted under `<output>/<retailer>/<category>/`. The
//! [`Coordinator`] runs chains concurrently and never lets one chain's failure
//! reach another.

pub mod catalog;
pub mod client;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod events;
pub mod extract;
pub mod retry;
pub mod selector;
pub mod types;

pub use catalog::{Catalog, CatalogQuery};
pub use client::{Fetched, PriceClient};
pub use coordinator::{Coordinator, DEFAULT_MAX_CONCURRENT};
pub use downloader::ChainDownloader;
pub use error::FetchError;
pub use events::{CollectingSink, EventSink, PipelineEvent, TracingSink};
pub use extract::{detect_format, extract, ArchiveFormat, OUTPUT_EXTENSION};
pub use retry::{PathRewrite, RetryPolicy};
pub use selector::{select, SelectionPolicy, TieBreak};
pub use types::{
    CoordinatorReport, ExtractedArtifact, FileDescriptor, RunReport, RunStatus, SelectionKey,
    SelectionResult, Stage, StageOutcome, StageStatus,
};
