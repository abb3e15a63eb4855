use cncmarket::core::{ContentType, FilterCriteria, SortDirection, SortKey};
use cncmarket::{CatalogBackend, CatalogLoader, MemoryBackend};
use std::sync::Arc;

const FIXTURE: &str = "demos/catalog.json";

fn ids(loader: &CatalogLoader) -> Vec<i64> {
    loader.snapshot().entries.iter().map(|p| p.id.0).collect()
}

#[tokio::test]
async fn test_browse_demo_catalog() {
    let backend = MemoryBackend::from_file(FIXTURE).expect("Failed to load demo catalog");
    assert_eq!(backend.len(), 8);

    let loader = CatalogLoader::new(Arc::new(backend), 3);

    // Most downloaded first.
    loader.reset(FilterCriteria::default()).await;
    assert_eq!(ids(&loader), vec![1, 8, 2]);

    loader.load_more().await;
    loader.load_more().await;
    assert_eq!(ids(&loader), vec![1, 8, 2, 3, 4, 5, 6, 7]);
    assert!(!loader.snapshot().has_more);
}

#[tokio::test]
async fn test_demo_catalog_filters() {
    let backend = Arc::new(MemoryBackend::from_file(FIXTURE).expect("Failed to load demo catalog"));
    let loader = CatalogLoader::new(backend.clone(), 10);

    let posts = FilterCriteria {
        content_type: Some(ContentType::PostProcessor),
        machine_manufacturer: Some("HAAS".into()),
        sort: SortKey::CreatedAt,
        direction: SortDirection::Asc,
        ..Default::default()
    };
    loader.reset(posts).await;
    assert_eq!(ids(&loader), vec![1, 8]);

    let options = backend.filters().await.unwrap();
    assert!(options.machine_manufacturers.contains(&"Haas".to_string()));
    assert!(options.number_of_axes.contains(&5));
    assert!(options.content_types.contains(&"DIGITAL_MACHINE_KIT".to_string()));
}

#[tokio::test]
async fn test_demo_catalog_nulls() {
    let backend = MemoryBackend::from_file(FIXTURE).expect("Failed to load demo catalog");
    let p = backend.product(cncmarket::ProductId(1)).await.unwrap();

    assert_eq!(p.price_label(), "Free");
    assert!(p.description.is_empty());
    assert!(p.created_at.is_some());
}
