// src/lib.rs
//
// =============================================================================
// CNCMARKET: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod backend;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod loader;
pub mod logs;
pub mod tui;

mod serde_helpers;

// 2. Re-exports (The Public API)
// These allow `use cncmarket::CatalogLoader` or `use cncmarket::Product` to work elsewhere.

pub use backend::{CatalogBackend, MemoryBackend};
pub use client::HttpBackend;
pub use config::{ClientConfig, Session};
pub use core::{FilterCriteria, FilterOptions, Product, ProductId, SearchPage};
pub use error::{BackendError, LoadError};
pub use loader::{CatalogLoader, LoadEvent, LoadOutcome, LoadState};
pub use logs::LogBuffer;
