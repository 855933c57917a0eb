use serde::{Deserialize, Serialize};

/// Kind of data a published file contains.
///
/// "Full" variants are complete snapshots; the others are incremental updates
/// since the previous publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    StoreList,
    Price,
    PriceFull,
    Promo,
    PromoFull,
    Unknown,
}

impl Category {
    /// Case-insensitive substrings checked against a remote file name, in
    /// precedence order. The first match wins.
    const NAME_MARKERS: [(&'static str, Category); 6] = [
        ("storesfull", Category::StoreList),
        ("pricefull", Category::PriceFull),
        ("promofull", Category::PromoFull),
        ("stores", Category::StoreList),
        ("price", Category::Price),
        ("promo", Category::Promo),
    ];

    /// Classifies a remote file name.
    ///
    /// `PriceFull7290027600007-001-202501010500.gz` is a [`Category::PriceFull`];
    /// names matching no marker are [`Category::Unknown`].
    #[must_use]
    pub fn from_remote_name(name: &str) -> Self {
        let lowered = name.to_ascii_lowercase();
        Self::NAME_MARKERS
            .iter()
            .find(|(marker, _)| lowered.contains(marker))
            .map_or(Category::Unknown, |(_, category)| *category)
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        matches!(self, Category::PriceFull | Category::PromoFull)
    }

    /// Collapses a Full category onto its incremental counterpart.
    #[must_use]
    pub fn family(self) -> Self {
        match self {
            Category::PriceFull => Category::Price,
            Category::PromoFull => Category::Promo,
            other => other,
        }
    }

    #[must_use]
    pub fn is_price(self) -> bool {
        matches!(self, Category::Price | Category::PriceFull)
    }

    #[must_use]
    pub fn is_promo(self) -> bool {
        matches!(self, Category::Promo | Category::PromoFull)
    }

    /// Directory name under `Downloads/<RetailerKey>/`.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::StoreList => "StoreList",
            Category::Price => "Price",
            Category::PriceFull => "PriceFull",
            Category::Promo => "Promo",
            Category::PromoFull => "PromoFull",
            Category::Unknown => "Unknown",
        }
    }

    /// Value of the `fileType` field sent to form-post catalogs.
    #[must_use]
    pub fn form_code(self) -> &'static str {
        match self {
            Category::Price => "1",
            Category::PriceFull => "2",
            Category::Promo => "3",
            Category::PromoFull => "4",
            Category::StoreList => "5",
            Category::Unknown => "0",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// How a retailer publishes its catalog of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogProtocol {
    /// Form-encoded POST to a search endpoint answering with a JSON array.
    FormPost,
    /// GET against a JSON directory service.
    DirectoryApi,
    /// Scraped HTML index of per-date pages.
    HtmlListing,
}

impl std::fmt::Display for CatalogProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogProtocol::FormPost => f.pad("form_post"),
            CatalogProtocol::DirectoryApi => f.pad("directory_api"),
            CatalogProtocol::HtmlListing => f.pad("html_listing"),
        }
    }
}
