use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::category::{CatalogProtocol, Category};
use crate::naming::NamingRule;
use crate::ConfigError;

/// Static description of one retailer, loaded once at startup and shared
/// read-only for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainProfile {
    pub id: u32,
    /// Stable retailer key; also the output directory name.
    pub key: String,
    pub name: String,
    pub base_url: String,
    pub protocol: CatalogProtocol,
    /// Chain identifier that must appear in remote names, for portals that
    /// publish several chains side by side.
    #[serde(default)]
    pub prefix: Option<String>,
    /// The retailer exposes a sub-brand column that disambiguates store ids.
    #[serde(default)]
    pub has_extra_column: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Explicit working store set. Empty means discover from the catalog.
    #[serde(default)]
    pub stores: Vec<String>,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub naming: NamingRule,
}

fn default_enabled() -> bool {
    true
}

fn default_categories() -> Vec<Category> {
    vec![Category::StoreList, Category::PriceFull, Category::PromoFull]
}

impl ChainProfile {
    /// Whether files of `category` are requested for this chain.
    #[must_use]
    pub fn wants(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Store key with the sub-brand column folded in, when the chain has one.
    ///
    /// Returns `store` unchanged for chains without the extra column or when
    /// the column is blank.
    #[must_use]
    pub fn compose_store_key(&self, store: &str, extra: &str) -> String {
        let extra = extra.trim();
        if self.has_extra_column && !extra.is_empty() {
            format!("{extra}-{store}")
        } else {
            store.to_string()
        }
    }

    /// Human-readable label with the sub-brand appended when present.
    #[must_use]
    pub fn display_name_with(&self, extra: Option<&str>) -> String {
        match extra.map(str::trim) {
            Some(sub) if self.has_extra_column && !sub.is_empty() => {
                format!("{} ({sub})", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChainsFile {
    pub chains: Vec<ChainProfile>,
}

impl ChainsFile {
    pub fn enabled(&self) -> impl Iterator<Item = &ChainProfile> {
        self.chains.iter().filter(|c| c.enabled)
    }
}

/// Load and validate the chain list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_chains(path: &Path) -> Result<ChainsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ChainsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_chains(&content)
}

/// Parse and validate a chain list from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_chains(content: &str) -> Result<ChainsFile, ConfigError> {
    let chains_file: ChainsFile = serde_yaml::from_str(content)?;
    validate_chains(&chains_file)?;
    Ok(chains_file)
}

fn validate_chains(chains_file: &ChainsFile) -> Result<(), ConfigError> {
    let mut seen_keys = HashSet::new();
    let mut seen_ids = HashSet::new();

    for chain in &chains_file.chains {
        let key = chain.key.trim();
        if key.is_empty() {
            return Err(ConfigError::Validation(format!(
                "chain {} has an empty key",
                chain.id
            )));
        }

        if key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(ConfigError::Validation(format!(
                "chain key '{key}' is not usable as a directory name"
            )));
        }

        if !seen_keys.insert(key.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate chain key: '{key}'"
            )));
        }

        if !seen_ids.insert(chain.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate chain id {} (chain '{key}')",
                chain.id
            )));
        }

        let base = chain.base_url.trim();
        match url::Url::parse(base) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(_) => {
                return Err(ConfigError::Validation(format!(
                    "chain '{key}' has invalid base_url '{base}'; expected http(s)"
                )));
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "chain '{key}' has unparseable base_url '{base}': {e}"
                )));
            }
        }

        if chain.categories.is_empty() {
            return Err(ConfigError::Validation(format!(
                "chain '{key}' requests no categories"
            )));
        }

        if chain.naming.store_segment == chain.naming.timestamp_segment {
            return Err(ConfigError::Validation(format!(
                "chain '{key}' uses segment {} for both store and timestamp",
                chain.naming.store_segment
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "chains_test.rs"]
mod tests;
