//! Positional parsing rules for remote file names.
//!
//! Retailers encode store id and publication time in the file name itself,
//! e.g. `PriceFull7290027600007-001-202501011200.gz`. A [`NamingRule`] names
//! the delimiter and the segment indices so each chain declares its layout as
//! data instead of ad-hoc string slicing.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingRule {
    pub delimiter: char,
    /// Zero-based segment holding the store id.
    pub store_segment: usize,
    /// Zero-based segment holding the publication timestamp.
    pub timestamp_segment: usize,
    /// `chrono` format string for the timestamp segment.
    pub timestamp_format: String,
    /// Store id used for chain-wide files that belong to no branch.
    pub no_store_sentinel: String,
}

impl Default for NamingRule {
    fn default() -> Self {
        Self {
            delimiter: '-',
            store_segment: 1,
            timestamp_segment: 2,
            timestamp_format: "%Y%m%d%H%M".to_string(),
            no_store_sentinel: "000".to_string(),
        }
    }
}

impl NamingRule {
    /// Returns `name` without directory components and without extensions.
    ///
    /// `a/b/PriceFull1-001-202501011200.xml.gz` becomes `PriceFull1-001-202501011200`.
    #[must_use]
    pub fn stem(name: &str) -> &str {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        base.split('.').next().unwrap_or(base)
    }

    fn segment<'a>(&self, name: &'a str, index: usize) -> Option<&'a str> {
        Self::stem(name)
            .split(self.delimiter)
            .nth(index)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Store id embedded in `name`.
    ///
    /// `None` when the segment is missing or equals the no-store sentinel,
    /// marking a chain-wide file.
    #[must_use]
    pub fn store_key(&self, name: &str) -> Option<String> {
        self.segment(name, self.store_segment)
            .filter(|s| *s != self.no_store_sentinel)
            .map(str::to_string)
    }

    /// Publication timestamp embedded in `name`, if the segment parses.
    #[must_use]
    pub fn published_at(&self, name: &str) -> Option<NaiveDateTime> {
        self.segment(name, self.timestamp_segment)
            .and_then(|s| NaiveDateTime::parse_from_str(s, &self.timestamp_format).ok())
    }
}
