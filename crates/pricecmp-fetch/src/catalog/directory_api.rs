//! JSON directory service: one GET returns `{name, type, date, url}` records
//! that already carry the download URL.

use chrono::NaiveDate;
use pricecmp_core::ChainProfile;
use reqwest::Url;
use serde::Deserialize;

use super::{describe, join_url, parse_json_array, parse_metadata_time};
use crate::client::PriceClient;
use crate::error::FetchError;
use crate::types::FileDescriptor;

pub(crate) const LIST_PATH: &str = "GetFiles";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectoryEntry {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    date: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryApiCatalog {
    base: Url,
}

impl DirectoryApiCatalog {
    pub(crate) fn new(base: Url) -> Self {
        Self { base }
    }

    pub(crate) async fn list(
        &self,
        client: &PriceClient,
        profile: &ChainProfile,
        date: NaiveDate,
    ) -> Result<Vec<FileDescriptor>, FetchError> {
        let mut url = join_url(&self.base, LIST_PATH)?;
        url.query_pairs_mut()
            .append_pair("date", &date.format("%Y-%m-%d").to_string());

        let body = client.get_text(url.as_str()).await?;
        let entries: Vec<DirectoryEntry> =
            parse_json_array(&body, &format!("{} directory for {date}", profile.key))?;

        let mut descriptors = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.unwrap_or_default();
            let link = entry.url.unwrap_or_default();
            if name.trim().is_empty() || link.trim().is_empty() {
                tracing::debug!(retailer = %profile.key, name, "skipping directory entry without name or url");
                continue;
            }
            // Relative links are resolved against the service root.
            let download_ref = match join_url(&self.base, link.trim()) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::warn!(retailer = %profile.key, name, error = %e, "skipping directory entry with bad url");
                    continue;
                }
            };
            descriptors.push(describe(
                profile,
                name.trim(),
                entry.kind.as_deref(),
                entry.date.as_deref().and_then(parse_metadata_time),
                download_ref,
            ));
        }
        Ok(descriptors)
    }
}
