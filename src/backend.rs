// src/backend.rs
//
// =============================================================================
// CNCMARKET: BACKEND PORT (v 0.3 )
// =============================================================================
//
// The Hexagonal Port.
//
// Responsibilities:
// 1. Define the `CatalogBackend` trait (the loader's only I/O boundary).
// 2. Provide `MemoryBackend`, an in-process catalog used for offline
//    browsing (`--fixture`) and for tests.
//
// The REST implementation lives in `client.rs`.

use crate::core::{FilterCriteria, FilterOptions, Product, ProductId, SearchPage, SortDirection, SortKey};
use crate::error::BackendError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// 1. THE BACKEND TRAIT (The Contract)
// ============================================================================

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// One page of entries matching `criteria`, ordered by its sort key,
    /// plus the total match count across all pages.
    /// Must be idempotent and side-effect free.
    async fn search(
        &self,
        criteria: &FilterCriteria,
        page: usize,
        size: usize,
    ) -> std::result::Result<SearchPage, BackendError>;

    /// Distinct values offered for each filter.
    async fn filters(&self) -> std::result::Result<FilterOptions, BackendError>;

    /// Full detail for a single entry.
    async fn product(&self, id: ProductId) -> std::result::Result<Product, BackendError>;
}

// ============================================================================
// 2. IN-MEMORY CATALOG
// ============================================================================

pub struct MemoryBackend {
    products: Vec<Product>,
}

impl MemoryBackend {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Loads a JSON array of products (the backend's wire format).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let products: Vec<Product> =
            serde_json::from_str(&raw).with_context(|| format!("Invalid fixture {}", path.display()))?;
        log::info!("Loaded {} products from {}", products.len(), path.display());
        Ok(Self::new(products))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn matches(p: &Product, c: &FilterCriteria) -> bool {
        fn same(field: &str, wanted: &Option<String>) -> bool {
            wanted.as_deref().map_or(true, |w| field.eq_ignore_ascii_case(w))
        }

        if c.category.is_some() && p.category != c.category {
            return false;
        }
        if c.content_type.is_some() && p.content_type != c.content_type {
            return false;
        }
        if c.machine_type.is_some() && p.machine_type != c.machine_type {
            return false;
        }
        if c.number_of_axes.is_some() && p.number_of_axes != c.number_of_axes {
            return false;
        }
        if !same(&p.machine_manufacturer, &c.machine_manufacturer)
            || !same(&p.controller_manufacturer, &c.controller_manufacturer)
            || !same(&p.product_owner, &c.content_owner)
        {
            return false;
        }

        c.query.as_deref().map_or(true, |q| p.matches_query(q))
    }
}

#[async_trait]
impl CatalogBackend for MemoryBackend {
    async fn search(
        &self,
        criteria: &FilterCriteria,
        page: usize,
        size: usize,
    ) -> std::result::Result<SearchPage, BackendError> {
        if size == 0 {
            return Err(BackendError::Status {
                status: 400,
                body: "page size must be positive".into(),
            });
        }

        let mut hits: Vec<&Product> = self.products.iter().filter(|p| Self::matches(p, criteria)).collect();

        // Id as secondary key keeps page boundaries stable across calls.
        hits.sort_by(|a, b| {
            let primary = match criteria.sort {
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::DownloadCount => a.download_count.cmp(&b.download_count),
            };
            let primary = match criteria.direction {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = hits.len();
        let content = hits
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .cloned()
            .collect();

        Ok(SearchPage {
            content,
            total_elements: total as u64,
            total_pages: total.div_ceil(size) as u64,
            number: page as u64,
            size: size as u64,
        })
    }

    async fn filters(&self) -> std::result::Result<FilterOptions, BackendError> {
        fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
            values
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }
        fn wire<T: serde::Serialize>(v: &T) -> Option<String> {
            serde_json::to_value(v).ok()?.as_str().map(str::to_string)
        }

        let ps = &self.products;
        Ok(FilterOptions {
            machine_manufacturers: distinct(ps.iter().map(|p| p.machine_manufacturer.as_str())),
            controller_manufacturers: distinct(ps.iter().map(|p| p.controller_manufacturer.as_str())),
            content_owners: distinct(ps.iter().map(|p| p.product_owner.as_str())),
            number_of_axes: ps
                .iter()
                .filter_map(|p| p.number_of_axes)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            content_types: ps
                .iter()
                .filter_map(|p| p.content_type.as_ref().and_then(wire))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            machine_types: ps
                .iter()
                .filter_map(|p| p.machine_type.as_ref().and_then(wire))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            categories: ps
                .iter()
                .filter_map(|p| p.category.as_ref().and_then(wire))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        })
    }

    async fn product(&self, id: ProductId) -> std::result::Result<Product, BackendError> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("product {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentType, MachineType};

    fn catalog() -> MemoryBackend {
        let mut a = Product::new(1, "Haas mill post");
        a.content_type = Some(ContentType::PostProcessor);
        a.machine_manufacturer = "Haas".into();
        a.download_count = 10;

        let mut b = Product::new(2, "DMG lathe schema");
        b.content_type = Some(ContentType::MachineSchema);
        b.machine_type = Some(MachineType::Turning);
        b.machine_manufacturer = "DMG Mori".into();
        b.download_count = 30;

        let mut c = Product::new(3, "Haas lathe post");
        c.content_type = Some(ContentType::PostProcessor);
        c.machine_type = Some(MachineType::Turning);
        c.machine_manufacturer = "haas".into();
        c.download_count = 30;

        MemoryBackend::new(vec![a, b, c])
    }

    #[tokio::test]
    async fn filters_sorts_and_pages() {
        let backend = catalog();
        let criteria = FilterCriteria {
            machine_manufacturer: Some("HAAS".into()),
            ..Default::default()
        };
        let page = backend.search(&criteria, 0, 10).await.unwrap();
        let ids: Vec<i64> = page.content.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(page.total_elements, 2);

        // Equal download counts fall back to ascending id.
        let all = backend.search(&FilterCriteria::default(), 0, 2).await.unwrap();
        let ids: Vec<i64> = all.content.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(all.total_pages, 2);

        let tail = backend.search(&FilterCriteria::default(), 1, 2).await.unwrap();
        assert_eq!(tail.content.len(), 1);
        assert_eq!(tail.content[0].id, ProductId(1));
    }

    #[tokio::test]
    async fn free_text_matches_name_and_manufacturer() {
        let backend = catalog();
        let criteria = FilterCriteria {
            query: Some("mori".into()),
            ..Default::default()
        };
        let page = backend.search(&criteria, 0, 10).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].id, ProductId(2));
    }

    #[tokio::test]
    async fn filter_options_are_distinct_and_sorted() {
        let options = catalog().filters().await.unwrap();
        assert_eq!(options.machine_manufacturers, vec!["DMG Mori", "Haas", "haas"]);
        assert_eq!(options.content_types, vec!["MACHINE_SCHEMA", "POST_PROCESSOR"]);
        assert_eq!(options.machine_types, vec!["TURNING"]);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let err = catalog().product(ProductId(99)).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }
}
