// src/loader.rs
//
// =============================================================================
// CNCMARKET: INCREMENTAL CATALOG LOADER (v 0.3 )
// =============================================================================
//
// The Browsing Session.
//
// Responsibilities:
// 1. Own the list of loaded entries (deduplicated, in fetch order).
// 2. Reset on every criteria / page-size change and fetch page 0.
// 3. Fetch the next page when the view reports it is near the end.
// 4. Drop responses that belong to a superseded criteria generation.
//
// Concurrency model:
// - One `std::sync::Mutex` guards all state; it is never held across `.await`.
// - Every reset bumps `generation`. Fetches carry the generation they were
//   dispatched under and are discarded on completion if it moved on.
// - `in_flight` is the single fetch-more slot. It records the owning
//   generation so a stale completion can never free a newer fetch's slot.
// - The view never mutates; it reads snapshots from a `watch` channel and
//   failure reasons from a `broadcast` channel.

use crate::backend::CatalogBackend;
use crate::core::{FilterCriteria, Product, ProductId};
use crate::error::LoadError;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Rows from the end of the loaded list at which the view asks for more.
pub const SCROLL_PROXIMITY: usize = 5;

/// Largest page the backend serves.
pub const MAX_PAGE_SIZE: usize = 100;

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// 1. PUBLIC STATE (What the view sees)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadState {
    pub entries: Vec<Product>,
    pub has_more: bool,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        self.is_loading_initial || self.is_loading_more
    }
}

/// Failure notification for the view.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEvent {
    pub generation: u64,
    pub error: LoadError,
}

impl LoadEvent {
    /// Human-readable failure reason.
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

/// What a single `reset` / `load_more` call ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The page was merged; `added` new entries survived deduplication.
    Applied { added: usize },
    /// Nothing was fetched (guard held, exhausted, or closed).
    Skipped,
    /// The response arrived after a newer reset and was dropped.
    Stale,
    Failed(LoadError),
}

/// True when the selected row is close enough to the end to fetch more.
pub fn is_near_end(selected: usize, loaded: usize) -> bool {
    loaded == 0 || selected + SCROLL_PROXIMITY >= loaded
}

fn clamp_page_size(requested: usize) -> usize {
    let size = requested.clamp(1, MAX_PAGE_SIZE);
    if size != requested {
        log::warn!("Page size {} out of range; using {}", requested, size);
    }
    size
}

// ============================================================================
// 2. INTERNAL STATE
// ============================================================================

struct Inner {
    state: LoadState,
    seen: HashSet<ProductId>,
    criteria: FilterCriteria,
    page_size: usize,
    generation: u64,
    in_flight: Option<u64>,
    closed: bool,
}

impl Inner {
    /// Appends unseen entries, first occurrence wins. Returns how many stuck.
    fn absorb(&mut self, page: Vec<Product>) -> usize {
        let before = self.state.entries.len();
        for product in page {
            if self.seen.insert(product.id) {
                self.state.entries.push(product);
            }
        }
        self.state.entries.len() - before
    }
}

/// A fetch that has been dispatched but not yet completed.
struct Ticket {
    generation: u64,
    criteria: FilterCriteria,
    page: usize,
    size: usize,
}

// ============================================================================
// 3. THE LOADER
// ============================================================================

#[derive(Clone)]
pub struct CatalogLoader {
    backend: Arc<dyn CatalogBackend>,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<LoadState>>,
    events_tx: broadcast::Sender<LoadEvent>,
}

impl CatalogLoader {
    /// A loader with nothing loaded. `has_more` stays false until the first
    /// `reset`, so scroll triggers before mount do nothing.
    pub fn new(backend: Arc<dyn CatalogBackend>, page_size: usize) -> Self {
        let page_size = clamp_page_size(page_size);
        let (state_tx, _) = watch::channel(LoadState::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            backend,
            inner: Arc::new(Mutex::new(Inner {
                state: LoadState::default(),
                seen: HashSet::new(),
                criteria: FilterCriteria::default(),
                page_size,
                generation: 0,
                in_flight: None,
                closed: false,
            })),
            state_tx: Arc::new(state_tx),
            events_tx,
        }
    }

    // --- Read side ---

    pub fn snapshot(&self) -> LoadState {
        self.lock().state.clone()
    }

    /// Re-emits the state after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<LoadEvent> {
        self.events_tx.subscribe()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.lock().criteria.clone()
    }

    pub fn page_size(&self) -> usize {
        self.lock().page_size
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    // --- Operations ---

    /// Starts a new criteria generation and loads its first page.
    pub async fn reset(&self, criteria: FilterCriteria) -> LoadOutcome {
        match self.begin_reset(criteria) {
            Some(ticket) => self.finish_reset(ticket).await,
            None => LoadOutcome::Skipped,
        }
    }

    /// Re-runs `reset` with the current criteria.
    pub async fn retry(&self) -> LoadOutcome {
        let criteria = self.criteria();
        self.reset(criteria).await
    }

    /// Page-size changes are criteria changes.
    pub async fn set_page_size(&self, page_size: usize) -> LoadOutcome {
        let criteria = self.apply_page_size(page_size);
        self.reset(criteria).await
    }

    /// Fetches the next page, unless a load is running or nothing is left.
    pub async fn load_more(&self) -> LoadOutcome {
        match self.begin_load_more() {
            Some(ticket) => self.finish_load_more(ticket).await,
            None => LoadOutcome::Skipped,
        }
    }

    /// The view went away. In-flight responses are dropped on arrival and
    /// later calls are no-ops.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.generation += 1;
        inner.in_flight = None;
        inner.state.is_loading_initial = false;
        inner.state.is_loading_more = false;
        self.publish(&inner);
        log::debug!("Loader closed at generation {}", inner.generation);
    }

    // --- View triggers ---
    //
    // The generation / guard is taken synchronously, before spawning, so
    // triggers take effect in the order the view fired them.

    pub fn on_criteria_change(&self, criteria: FilterCriteria) -> Option<JoinHandle<LoadOutcome>> {
        let ticket = self.begin_reset(criteria)?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.finish_reset(ticket).await }))
    }

    pub fn on_page_size_change(&self, page_size: usize) -> Option<JoinHandle<LoadOutcome>> {
        let criteria = self.apply_page_size(page_size);
        self.on_criteria_change(criteria)
    }

    pub fn on_scroll_near_end(&self) -> Option<JoinHandle<LoadOutcome>> {
        let ticket = self.begin_load_more()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.finish_load_more(ticket).await }))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the new size and hands back the criteria to reset with.
    fn apply_page_size(&self, page_size: usize) -> FilterCriteria {
        let mut inner = self.lock();
        inner.page_size = clamp_page_size(page_size);
        inner.criteria.clone()
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn emit(&self, generation: u64, error: LoadError) {
        log::warn!("{}", error);
        // No subscribers is fine; the state flags still tell the story.
        let _ = self.events_tx.send(LoadEvent { generation, error });
    }

    fn begin_reset(&self, criteria: FilterCriteria) -> Option<Ticket> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }

        inner.generation += 1;
        inner.criteria = criteria.clone();
        inner.seen.clear();
        inner.in_flight = None;
        inner.state = LoadState {
            entries: Vec::new(),
            has_more: true,
            is_loading_initial: true,
            is_loading_more: false,
        };
        self.publish(&inner);

        log::info!(
            "Catalog reset (generation {}, page size {}, {} filters, sort {})",
            inner.generation,
            inner.page_size,
            criteria.active_filter_count(),
            criteria.sort.label()
        );

        Some(Ticket {
            generation: inner.generation,
            criteria,
            page: 0,
            size: inner.page_size,
        })
    }

    async fn finish_reset(&self, ticket: Ticket) -> LoadOutcome {
        let result = self.backend.search(&ticket.criteria, 0, ticket.size).await;

        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            log::debug!(
                "Dropping page 0 of generation {} (now {})",
                ticket.generation,
                inner.generation
            );
            return LoadOutcome::Stale;
        }
        inner.state.is_loading_initial = false;

        match result {
            Ok(page) => {
                let len = page.content.len();
                let added = inner.absorb(page.content);
                inner.state.has_more = len == ticket.size && (len as u64) < page.total_elements;
                self.publish(&inner);
                log::info!(
                    "Loaded {} of {} entries{}",
                    inner.state.entries.len(),
                    page.total_elements,
                    if inner.state.has_more { "" } else { " (complete)" }
                );
                LoadOutcome::Applied { added }
            }
            Err(e) => {
                inner.state.entries.clear();
                inner.seen.clear();
                inner.state.has_more = false;
                self.publish(&inner);
                let error = LoadError::InitialLoad { reason: e.to_string() };
                self.emit(ticket.generation, error.clone());
                LoadOutcome::Failed(error)
            }
        }
    }

    fn begin_load_more(&self) -> Option<Ticket> {
        let mut inner = self.lock();
        if inner.closed
            || inner.in_flight.is_some()
            || inner.state.is_loading_initial
            || !inner.state.has_more
        {
            return None;
        }

        inner.in_flight = Some(inner.generation);
        inner.state.is_loading_more = true;
        self.publish(&inner);

        let page = inner.state.entries.len() / inner.page_size;
        log::debug!("Fetching page {} (generation {})", page, inner.generation);

        Some(Ticket {
            generation: inner.generation,
            criteria: inner.criteria.clone(),
            page,
            size: inner.page_size,
        })
    }

    async fn finish_load_more(&self, ticket: Ticket) -> LoadOutcome {
        let result = self
            .backend
            .search(&ticket.criteria, ticket.page, ticket.size)
            .await;

        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            // The reset that superseded us already released the slot.
            log::debug!(
                "Dropping page {} of generation {} (now {})",
                ticket.page,
                ticket.generation,
                inner.generation
            );
            return LoadOutcome::Stale;
        }
        inner.in_flight = None;
        inner.state.is_loading_more = false;

        match result {
            Ok(page) => {
                let len = page.content.len();
                let added = inner.absorb(page.content);
                let loaded = inner.state.entries.len() as u64;
                inner.state.has_more = len == ticket.size && loaded < page.total_elements;

                // Page index is derived from the entry count, so a full page of
                // duplicates would be requested again forever.
                if inner.state.has_more && added == 0 {
                    log::warn!(
                        "Page {} contributed no new entries; stopping pagination",
                        ticket.page
                    );
                    inner.state.has_more = false;
                }

                self.publish(&inner);
                if !inner.state.has_more {
                    log::info!("Catalog exhausted at {} entries", loaded);
                }
                LoadOutcome::Applied { added }
            }
            Err(e) => {
                self.publish(&inner);
                let error = LoadError::IncrementalLoad {
                    page: ticket.page,
                    reason: e.to_string(),
                };
                self.emit(ticket.generation, error.clone());
                LoadOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_trigger() {
        assert!(is_near_end(0, 0));
        assert!(!is_near_end(0, 24));
        assert!(is_near_end(19, 24));
        assert!(is_near_end(23, 24));
    }
}
