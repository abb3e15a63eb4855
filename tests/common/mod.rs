// Shared fixtures for the loader tests.
#![allow(dead_code)]

use async_trait::async_trait;
use cncmarket::core::{FilterCriteria, FilterOptions, Product, ProductId, SearchPage};
use cncmarket::error::BackendError;
use cncmarket::{CatalogBackend, MemoryBackend};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// `n` products with ids 1..=n. Popularity falls with the id, so the default
/// sort (most downloaded first) returns them in id order.
pub fn products(n: i64) -> Vec<Product> {
    (1..=n)
        .map(|id| {
            let mut p = Product::new(id, format!("Product {}", id));
            p.download_count = (1000 - id) as u64;
            p.machine_manufacturer = if id % 2 == 0 { "Haas".into() } else { "DMG Mori".into() };
            p
        })
        .collect()
}

pub fn ids(entries: &[Product]) -> Vec<i64> {
    entries.iter().map(|p| p.id.0).collect()
}

pub fn query(q: &str) -> FilterCriteria {
    FilterCriteria {
        query: Some(q.to_string()),
        ..Default::default()
    }
}

pub fn page_of(ids: &[i64], total: u64, size: u64) -> SearchPage {
    SearchPage {
        content: ids.iter().map(|id| Product::new(*id, format!("Product {}", id))).collect(),
        total_elements: total,
        total_pages: total.div_ceil(size.max(1)),
        number: 0,
        size,
    }
}

/// Lets the spawned loader tasks run until `done` holds.
pub async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

// ----------------------------------------------------------------------------
// Gated: every search parks until the test releases it.
// ----------------------------------------------------------------------------

pub struct PendingSearch {
    pub criteria: FilterCriteria,
    pub page: usize,
    pub size: usize,
    release: oneshot::Sender<bool>,
}

pub struct GatedBackend {
    inner: MemoryBackend,
    pending: Mutex<Vec<Option<PendingSearch>>>,
}

impl GatedBackend {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            inner: MemoryBackend::new(products),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Searches issued so far, released or not.
    pub fn issued(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// (query, page) of the i-th issued search.
    pub fn request(&self, i: usize) -> (Option<String>, usize) {
        let pending = self.pending.lock().unwrap();
        let p = pending[i].as_ref().expect("already released");
        (p.criteria.query.clone(), p.page)
    }

    pub fn release(&self, i: usize) {
        self.finish(i, false);
    }

    pub fn fail(&self, i: usize) {
        self.finish(i, true);
    }

    fn finish(&self, i: usize, fail: bool) {
        let p = self.pending.lock().unwrap()[i].take().expect("already released");
        p.release.send(fail).expect("search was dropped");
    }
}

#[async_trait]
impl CatalogBackend for GatedBackend {
    async fn search(&self, criteria: &FilterCriteria, page: usize, size: usize) -> Result<SearchPage, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(Some(PendingSearch {
            criteria: criteria.clone(),
            page,
            size,
            release: tx,
        }));
        match rx.await {
            Ok(false) => self.inner.search(criteria, page, size).await,
            Ok(true) => Err(BackendError::Http("connection reset".into())),
            Err(_) => Err(BackendError::Http("gate dropped".into())),
        }
    }

    async fn filters(&self) -> Result<FilterOptions, BackendError> {
        self.inner.filters().await
    }

    async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        self.inner.product(id).await
    }
}

// ----------------------------------------------------------------------------
// Counting + flaky: yields once per search so concurrent callers interleave.
// ----------------------------------------------------------------------------

pub struct CountingBackend {
    inner: MemoryBackend,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingBackend {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            inner: MemoryBackend::new(products),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogBackend for CountingBackend {
    async fn search(&self, criteria: &FilterCriteria, page: usize, size: usize) -> Result<SearchPage, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        self.inner.search(criteria, page, size).await
    }

    async fn filters(&self) -> Result<FilterOptions, BackendError> {
        self.inner.filters().await
    }

    async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        self.inner.product(id).await
    }
}

// ----------------------------------------------------------------------------
// Scripted: hands out canned pages in order, ignoring the request.
// ----------------------------------------------------------------------------

pub struct ScriptedBackend {
    pages: Mutex<VecDeque<SearchPage>>,
    requested: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    pub fn new(pages: Vec<SearchPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Page indices the loader asked for.
    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogBackend for ScriptedBackend {
    async fn search(&self, _criteria: &FilterCriteria, page: usize, _size: usize) -> Result<SearchPage, BackendError> {
        self.requested.lock().unwrap().push(page);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Http("script exhausted".into()))
    }

    async fn filters(&self) -> Result<FilterOptions, BackendError> {
        Ok(FilterOptions::default())
    }

    async fn product(&self, id: ProductId) -> Result<Product, BackendError> {
        Err(BackendError::NotFound(id.to_string()))
    }
}
