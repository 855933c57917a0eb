//! Static configuration and shared domain vocabulary for the price-file
//! acquisition pipeline.
//!
//! Everything in this crate is pure data: environment-driven [`AppConfig`],
//! the per-retailer [`ChainProfile`] list, file [`Category`] classification and
//! the [`NamingRule`] that derives store ids and timestamps from remote names.

pub mod app_config;
pub mod category;
pub mod chains;
pub mod config;
pub mod naming;

use thiserror::Error;

pub use app_config::AppConfig;
pub use category::{CatalogProtocol, Category};
pub use chains::{load_chains, parse_chains, ChainProfile, ChainsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use naming::NamingRule;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read chains file {path}: {source}")]
    ChainsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse chains file: {0}")]
    ChainsFileParse(#[from] serde_yaml::Error),

    #[error("chain configuration is invalid: {0}")]
    Validation(String),
}
