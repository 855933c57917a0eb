//! Latest-wins selection of one descriptor per store and category.

use pricecmp_core::Category;

use crate::types::{FileDescriptor, SelectionKey, SelectionResult};

/// What to do when two candidates carry the same timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// A Full snapshot beats its incremental counterpart, otherwise the
    /// first-seen candidate stays.
    #[default]
    PreferFull,
    FirstSeen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub tie_break: TieBreak,
    /// Group a Full category with its incremental counterpart (`PriceFull`
    /// with `Price`), so only one of them survives per store. The group key
    /// then carries the incremental category.
    pub merge_variants: bool,
}

impl SelectionPolicy {
    fn group_category(self, category: Category) -> Category {
        if self.merge_variants {
            category.family()
        } else {
            category
        }
    }

    fn is_wanted(self, category: Category, wanted: &[Category]) -> bool {
        wanted.is_empty()
            || wanted
                .iter()
                .any(|w| self.group_category(*w) == self.group_category(category))
    }

    fn replaces(self, candidate: &FileDescriptor, current: &FileDescriptor) -> bool {
        if candidate.published_at != current.published_at {
            // `None` orders below every parsed timestamp.
            return candidate.published_at > current.published_at;
        }
        match self.tie_break {
            TieBreak::PreferFull => candidate.category.is_full() && !current.category.is_full(),
            TieBreak::FirstSeen => false,
        }
    }
}

/// Picks the latest descriptor per `(store_key, category)` among those whose
/// category is in `wanted` (every category when `wanted` is empty).
///
/// Chain-wide files have `store_key == None` and share one key per category.
#[must_use]
pub fn select(
    descriptors: &[FileDescriptor],
    wanted: &[Category],
    policy: SelectionPolicy,
) -> SelectionResult {
    let mut selected = SelectionResult::new();
    for descriptor in descriptors {
        if !policy.is_wanted(descriptor.category, wanted) {
            continue;
        }
        let key: SelectionKey = (
            descriptor.store_key.clone(),
            policy.group_category(descriptor.category),
        );
        match selected.get(&key) {
            Some(current) if !policy.replaces(descriptor, current) => {}
            _ => {
                selected.insert(key, descriptor.clone());
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn descriptor(name: &str, category: Category, store: Option<&str>, ts: Option<&str>) -> FileDescriptor {
        FileDescriptor {
            remote_name: name.to_string(),
            category,
            store_key: store.map(str::to_string),
            retailer_key: "a".to_string(),
            published_at: ts.map(|t| NaiveDateTime::parse_from_str(t, "%Y%m%d%H%M").unwrap()),
            download_ref: name.to_string(),
        }
    }

    #[test]
    fn latest_timestamp_wins_per_store() {
        let files = vec![
            descriptor("p-100-1000", Category::PriceFull, Some("100"), Some("202501011000")),
            descriptor("p-100-1200", Category::PriceFull, Some("100"), Some("202501011200")),
            descriptor("p-100-1100", Category::PriceFull, Some("100"), Some("202501011100")),
            descriptor("p-200-0900", Category::PriceFull, Some("200"), Some("202501010900")),
        ];
        let result = select(&files, &[Category::PriceFull], SelectionPolicy::default());
        assert_eq!(result.len(), 2);
        assert_eq!(
            result[&(Some("100".to_string()), Category::PriceFull)].remote_name,
            "p-100-1200"
        );
        assert_eq!(
            result[&(Some("200".to_string()), Category::PriceFull)].remote_name,
            "p-200-0900"
        );
    }

    #[test]
    fn unwanted_categories_are_dropped() {
        let files = vec![
            descriptor("promo", Category::Promo, Some("100"), Some("202501011000")),
            descriptor("price", Category::PriceFull, Some("100"), Some("202501011000")),
        ];
        let result = select(&files, &[Category::PriceFull], SelectionPolicy::default());
        assert_eq!(result.len(), 1);
        assert!(result.values().all(|d| d.category == Category::PriceFull));
    }

    #[test]
    fn parsed_timestamp_beats_missing_one() {
        let files = vec![
            descriptor("dated", Category::Price, Some("1"), Some("202501010100")),
            descriptor("undated", Category::Price, Some("1"), None),
        ];
        let result = select(&files, &[], SelectionPolicy::default());
        assert_eq!(result.values().next().unwrap().remote_name, "dated");
    }

    #[test]
    fn merged_variants_prefer_full_on_tie() {
        let policy = SelectionPolicy {
            merge_variants: true,
            ..SelectionPolicy::default()
        };
        let files = vec![
            descriptor("incremental", Category::Price, Some("100"), Some("202501011200")),
            descriptor("full", Category::PriceFull, Some("100"), Some("202501011200")),
        ];
        let result = select(&files, &[Category::PriceFull], policy);
        assert_eq!(result.len(), 1);
        let chosen = &result[&(Some("100".to_string()), Category::Price)];
        assert_eq!(chosen.remote_name, "full");
    }

    #[test]
    fn first_seen_tie_break_keeps_first() {
        let policy = SelectionPolicy {
            tie_break: TieBreak::FirstSeen,
            merge_variants: true,
        };
        let files = vec![
            descriptor("incremental", Category::Price, Some("100"), Some("202501011200")),
            descriptor("full", Category::PriceFull, Some("100"), Some("202501011200")),
        ];
        let result = select(&files, &[], policy);
        assert_eq!(result.values().next().unwrap().remote_name, "incremental");
    }

    #[test]
    fn newer_incremental_still_beats_older_full() {
        let policy = SelectionPolicy {
            merge_variants: true,
            ..SelectionPolicy::default()
        };
        let files = vec![
            descriptor("full", Category::PriceFull, Some("100"), Some("202501010500")),
            descriptor("incremental", Category::Price, Some("100"), Some("202501011200")),
        ];
        let result = select(&files, &[], policy);
        assert_eq!(result.values().next().unwrap().remote_name, "incremental");
    }

    #[test]
    fn chain_wide_files_share_one_key() {
        let files = vec![
            descriptor("stores-0500", Category::StoreList, None, Some("202501010500")),
            descriptor("stores-0700", Category::StoreList, None, Some("202501010700")),
        ];
        let result = select(&files, &[Category::StoreList], SelectionPolicy::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[&(None, Category::StoreList)].remote_name, "stores-0700");
    }

    #[test]
    fn nothing_listed_selects_nothing() {
        assert!(select(&[], &[Category::PriceFull], SelectionPolicy::default()).is_empty());
    }
}
