//! HTML directory listings: an index page linking one page per date
//! (`href="2025-01-01.html"`), each date page linking the published files.

use std::sync::LazyLock;

use chrono::NaiveDate;
use pricecmp_core::ChainProfile;
use regex::Regex;
use reqwest::Url;

use super::{describe, join_url};
use crate::client::PriceClient;
use crate::error::FetchError;
use crate::types::FileDescriptor;

static DATE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["'](?:[^"']*/)?(\d{4}-\d{2}-\d{2})\.html?["']"#)
        .expect("valid date link regex")
});

static FILE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']((?:[^"'?#]*/)?([^"'/?#]+\.(?:xml|gz|zip)))["']"#)
        .expect("valid file link regex")
});

#[derive(Debug, Clone)]
pub struct HtmlListingCatalog {
    index: Url,
}

impl HtmlListingCatalog {
    pub(crate) fn new(index: Url) -> Self {
        Self { index }
    }

    pub(crate) async fn list(
        &self,
        client: &PriceClient,
        profile: &ChainProfile,
        date: NaiveDate,
    ) -> Result<Vec<FileDescriptor>, FetchError> {
        let index_html = client.get_text(self.index.as_str()).await?;
        let wanted = date.format("%Y-%m-%d").to_string();
        let available = extract_dates(&index_html);
        if !available.iter().any(|d| *d == wanted) {
            tracing::debug!(
                retailer = %profile.key,
                date = %wanted,
                available = available.len(),
                "date not offered by index page"
            );
            return Err(FetchError::Empty {
                context: format!("{} index has no page for {wanted}", profile.key),
            });
        }

        let page_url = join_url(&self.index, &format!("{wanted}.html"))?;
        let page_html = client.get_text(page_url.as_str()).await?;

        let mut descriptors = Vec::new();
        for (href, name) in extract_file_links(&page_html) {
            let download_ref = match join_url(&page_url, &href) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::warn!(retailer = %profile.key, href, error = %e, "skipping file link with bad url");
                    continue;
                }
            };
            descriptors.push(describe(profile, &name, None, None, download_ref));
        }
        Ok(descriptors)
    }
}

/// Dates linked from an index page, in page order, without duplicates.
fn extract_dates(html: &str) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    for caps in DATE_LINK_RE.captures_iter(html) {
        let date = caps[1].to_string();
        if !dates.contains(&date) {
            dates.push(date);
        }
    }
    dates
}

/// `(href, file name)` pairs for every archive or XML link on a date page.
fn extract_file_links(html: &str) -> Vec<(String, String)> {
    let mut links: Vec<(String, String)> = Vec::new();
    for caps in FILE_LINK_RE.captures_iter(html) {
        let href = caps[1].to_string();
        let name = caps[2].to_string();
        if !links.iter().any(|(h, _)| *h == href) {
            links.push((href, name));
        }
    }
    links
}
