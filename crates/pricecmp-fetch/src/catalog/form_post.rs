//! Form-post catalogs: a search endpoint taking form fields and answering
//! with a JSON array, plus a download endpoint that maps a file name to the
//! real binary URL.

use chrono::NaiveDate;
use pricecmp_core::{Category, ChainProfile};
use reqwest::Url;
use serde::{Deserialize, Deserializer};

use super::{describe, join_url, parse_json_array, parse_metadata_time, CatalogQuery};
use crate::client::PriceClient;
use crate::error::FetchError;
use crate::types::FileDescriptor;

pub(crate) const SEARCH_PATH: &str = "MainIO_Hok.aspx";
pub(crate) const DOWNLOAD_PATH: &str = "Download.aspx";

/// `fileType` value asking for every category.
const ALL_TYPES: &str = "0";
/// `store` value asking for every store.
const ALL_STORES: &str = "0";

/// Accepts strings, numbers, booleans or null and yields a string, so a
/// missing or oddly typed column never fails the whole listing.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchRow {
    #[serde(rename = "FileNm", deserialize_with = "lenient_string")]
    file_name: String,
    #[serde(rename = "Company", deserialize_with = "lenient_string")]
    company: String,
    #[serde(rename = "Store", deserialize_with = "lenient_string")]
    store: String,
    #[serde(rename = "TypeFile", deserialize_with = "lenient_string")]
    type_file: String,
    #[serde(rename = "DateFile", deserialize_with = "lenient_string")]
    date_file: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DownloadRow {
    #[serde(rename = "SPath", deserialize_with = "lenient_string")]
    s_path: String,
}

#[derive(Debug, Clone)]
pub struct FormPostCatalog {
    base: Url,
}

impl FormPostCatalog {
    pub(crate) fn new(base: Url) -> Self {
        Self { base }
    }

    pub(crate) async fn list(
        &self,
        client: &PriceClient,
        profile: &ChainProfile,
        date: NaiveDate,
        query: &CatalogQuery,
    ) -> Result<Vec<FileDescriptor>, FetchError> {
        let url = join_url(&self.base, SEARCH_PATH)?;
        let form = Self::search_form(date, query);
        let body = client.post_form_text(url.as_str(), &form).await?;
        let rows: Vec<SearchRow> =
            parse_json_array(&body, &format!("{} catalog for {date}", profile.key))?;

        Ok(rows
            .into_iter()
            .filter(|row| !row.file_name.trim().is_empty())
            .map(|row| Self::describe_row(profile, row))
            .collect())
    }

    fn search_form(date: NaiveDate, query: &CatalogQuery) -> Vec<(&'static str, String)> {
        let file_type = match query.categories.as_slice() {
            [single] => single.form_code(),
            _ => ALL_TYPES,
        };
        vec![
            (
                "store",
                query.store.clone().unwrap_or_else(|| ALL_STORES.to_string()),
            ),
            ("date", date.format("%d/%m/%Y").to_string()),
            ("fileType", file_type.to_string()),
        ]
    }

    fn describe_row(profile: &ChainProfile, row: SearchRow) -> FileDescriptor {
        let name = row.file_name.trim();
        let hint = (!row.type_file.is_empty()).then_some(row.type_file.as_str());
        let mut descriptor = describe(
            profile,
            name,
            hint,
            parse_metadata_time(&row.date_file),
            name.to_string(),
        );

        // Fall back to the Store column when the name has no store segment,
        // unless the column holds the chain-wide sentinel.
        if descriptor.store_key.is_none() && descriptor.category != Category::StoreList {
            let store = row.store.trim();
            if !store.is_empty() && store != profile.naming.no_store_sentinel {
                descriptor.store_key = Some(store.to_string());
            }
        }

        if let Some(store) = descriptor.store_key.take() {
            descriptor.store_key = Some(profile.compose_store_key(&store, &row.company));
        }
        descriptor
    }

    /// Asks the download endpoint for the binary URL of `descriptor`.
    pub(crate) async fn resolve(
        &self,
        client: &PriceClient,
        descriptor: &FileDescriptor,
    ) -> Result<String, FetchError> {
        let mut url = join_url(&self.base, DOWNLOAD_PATH)?;
        url.query_pairs_mut()
            .append_pair("FileNm", &descriptor.download_ref);

        let context = format!("download link for {}", descriptor.remote_name);
        let body = client.post_form_text(url.as_str(), &[]).await?;
        let rows: Vec<DownloadRow> = parse_json_array(&body, &context)?;

        let s_path = rows
            .into_iter()
            .next()
            .map(|row| row.s_path.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FetchError::malformed(&context, "response carries no SPath"))?;

        Ok(join_url(&self.base, &s_path)?.to_string())
    }
}
