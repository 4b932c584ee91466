use std::fmt;

use sha2::{Digest, Sha256};

use crate::{FilterState, SortColumn, SortOrder, TargetId};

/// Everything the listing endpoint needs, derived purely from a [`FilterState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub query: Option<String>,
    pub sort: Option<(SortColumn, SortOrder)>,
    pub page: u32,
    pub limit: u32,
}

impl RequestDescriptor {
    pub fn from_filter(filter: &FilterState) -> Self {
        let query = filter.query.trim();
        let sort = match filter.sort_column {
            SortColumn::None => None,
            column => Some((column, filter.sort_order)),
        };
        Self {
            query: (!query.is_empty()).then(|| query.to_string()),
            sort,
            page: filter.page.max(1),
            limit: filter.page_size.max(1),
        }
    }

    /// Query parameters in the order the listing endpoint documents them.
    /// Empty query and unset sort are omitted; page and limit are always sent.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(query) = &self.query {
            pairs.push(("query", query.clone()));
        }
        if let Some((column, order)) = self.sort {
            if let Some(name) = column.wire_name() {
                pairs.push(("sort_by", name.to_string()));
                pairs.push(("order", order.as_str().to_string()));
            }
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }

    /// Canonical serialization; equal descriptors always produce equal strings.
    pub fn canonical(&self) -> String {
        self.query_pairs()
            .into_iter()
            .map(|(name, value)| format!("{name}={}", escape_component(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::Listing(self.canonical())
    }
}

fn escape_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Identity of one cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// A listing page, keyed by the canonical descriptor.
    Listing(String),
    /// Detail view of a single target.
    Target(TargetId),
    /// Crawl history of a single target.
    TargetCrawls(TargetId),
}

impl CacheKey {
    pub fn is_listing(&self) -> bool {
        matches!(self, CacheKey::Listing(_))
    }

    /// The target this key is scoped to, if any.
    pub fn target(&self) -> Option<&TargetId> {
        match self {
            CacheKey::Listing(_) => None,
            CacheKey::Target(id) | CacheKey::TargetCrawls(id) => Some(id),
        }
    }

    /// Short stable hash, handy in log lines where the full key is noise.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(8);
        for byte in digest.iter().take(4) {
            use std::fmt::Write;
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Listing(canonical) => write!(f, "listing?{canonical}"),
            CacheKey::Target(id) => write!(f, "target/{id}"),
            CacheKey::TargetCrawls(id) => write!(f, "target/{id}/crawls"),
        }
    }
}
