//! Catalog clients: list the files a retailer publishes for a date.
//!
//! Three protocols sit behind [`Catalog`]:
//! - [`FormPostCatalog`] POSTs store/date/type fields to a search endpoint and
//!   resolves each file through a second download-link request.
//! - [`DirectoryApiCatalog`] GETs a JSON directory that already carries URLs.
//! - [`HtmlListingCatalog`] scrapes an index page for dates, then the date
//!   page for file links.
//!
//! Every variant derives category, store and timestamp from the remote name
//! through the chain's [`NamingRule`](pricecmp_core::NamingRule), then applies
//! the same prefix/category/store filtering. An empty catalog is `Ok(vec![])`.

mod directory_api;
mod form_post;
mod html_listing;

use chrono::{NaiveDate, NaiveDateTime};
use pricecmp_core::{CatalogProtocol, Category, ChainProfile};
use reqwest::Url;

use crate::client::PriceClient;
use crate::error::FetchError;
use crate::types::FileDescriptor;

pub use directory_api::DirectoryApiCatalog;
pub use form_post::FormPostCatalog;
pub use html_listing::HtmlListingCatalog;

/// Narrows a listing. Empty `categories` means every category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub store: Option<String>,
    pub categories: Vec<Category>,
}

impl CatalogQuery {
    #[must_use]
    pub fn categories(categories: &[Category]) -> Self {
        Self {
            store: None,
            categories: categories.to_vec(),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: &str) -> Self {
        self.store = Some(store.to_string());
        self
    }

    fn matches(&self, descriptor: &FileDescriptor) -> bool {
        let category_ok =
            self.categories.is_empty() || self.categories.contains(&descriptor.category);
        let store_ok = self
            .store
            .as_deref()
            .is_none_or(|store| descriptor.store_key.as_deref() == Some(store));
        category_ok && store_ok
    }
}

/// Catalog client for one chain, chosen by its [`CatalogProtocol`].
#[derive(Debug, Clone)]
pub enum Catalog {
    FormPost(FormPostCatalog),
    DirectoryApi(DirectoryApiCatalog),
    HtmlListing(HtmlListingCatalog),
}

impl Catalog {
    /// Builds the catalog client matching `profile.protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if `profile.base_url` does not parse.
    pub fn for_profile(profile: &ChainProfile) -> Result<Self, FetchError> {
        let base = normalized_base(&profile.base_url)?;
        Ok(match profile.protocol {
            CatalogProtocol::FormPost => Catalog::FormPost(FormPostCatalog::new(base)),
            CatalogProtocol::DirectoryApi => Catalog::DirectoryApi(DirectoryApiCatalog::new(base)),
            CatalogProtocol::HtmlListing => Catalog::HtmlListing(HtmlListingCatalog::new(base)),
        })
    }

    /// Lists the files published by `profile` on `date` that match `query`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Unreachable`] / [`FetchError::Exhausted`] on transport failure.
    /// - [`FetchError::Malformed`] when the listing cannot be parsed.
    /// - [`FetchError::Empty`] when an HTML index does not offer `date`.
    pub async fn list_files(
        &self,
        client: &PriceClient,
        profile: &ChainProfile,
        date: NaiveDate,
        query: &CatalogQuery,
    ) -> Result<Vec<FileDescriptor>, FetchError> {
        let listed = match self {
            Catalog::FormPost(c) => c.list(client, profile, date, query).await?,
            Catalog::DirectoryApi(c) => c.list(client, profile, date).await?,
            Catalog::HtmlListing(c) => c.list(client, profile, date).await?,
        };
        let total = listed.len();
        let kept: Vec<FileDescriptor> = listed
            .into_iter()
            .filter(|d| matches_prefix(profile, &d.remote_name))
            .filter(|d| query.matches(d))
            .collect();
        tracing::debug!(
            retailer = %profile.key,
            %date,
            listed = total,
            kept = kept.len(),
            "catalog listed"
        );
        Ok(kept)
    }

    /// Turns a descriptor's `download_ref` into the URL to fetch.
    ///
    /// # Errors
    ///
    /// Form-post catalogs need a round trip and fail like [`Self::list_files`];
    /// the other protocols return the stored URL as-is.
    pub async fn resolve_download_url(
        &self,
        client: &PriceClient,
        descriptor: &FileDescriptor,
    ) -> Result<String, FetchError> {
        match self {
            Catalog::FormPost(c) => c.resolve(client, descriptor).await,
            Catalog::DirectoryApi(_) | Catalog::HtmlListing(_) => {
                Ok(descriptor.download_ref.clone())
            }
        }
    }
}

fn matches_prefix(profile: &ChainProfile, remote_name: &str) -> bool {
    profile
        .prefix
        .as_deref()
        .map(str::trim)
        .is_none_or(|prefix| prefix.is_empty() || remote_name.contains(prefix))
}

/// Parses `base_url`, ensuring a trailing slash so `Url::join` appends to it
/// instead of replacing the last path segment.
fn normalized_base(base_url: &str) -> Result<Url, FetchError> {
    let normalised = format!("{}/", base_url.trim().trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| FetchError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

fn join_url(base: &Url, path: &str) -> Result<Url, FetchError> {
    base.join(path).map_err(|e| FetchError::InvalidUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

/// Builds a descriptor from a remote name using the chain's naming rule.
///
/// `hint_category` and `metadata_time` fill in when the name itself carries no
/// category marker or no parseable timestamp.
fn describe(
    profile: &ChainProfile,
    remote_name: &str,
    hint_category: Option<&str>,
    metadata_time: Option<NaiveDateTime>,
    download_ref: String,
) -> FileDescriptor {
    let mut category = Category::from_remote_name(remote_name);
    if category == Category::Unknown {
        if let Some(hint) = hint_category {
            category = Category::from_remote_name(hint);
        }
    }
    FileDescriptor {
        remote_name: remote_name.to_string(),
        category,
        store_key: profile.naming.store_key(remote_name),
        retailer_key: profile.key.clone(),
        published_at: profile.naming.published_at(remote_name).or(metadata_time),
        download_ref,
    }
}

/// Parses the loose date-time strings catalogs put in metadata columns.
fn parse_metadata_time(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 5] = [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a JSON array body. Blank bodies count as an empty array.
fn parse_json_array<T: serde::de::DeserializeOwned>(
    body: &str,
    context: &str,
) -> Result<Vec<T>, FetchError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<T>>(body).map_err(|e| FetchError::malformed(context, e))
}
