//! Blog catalog synchronization and feed polling.
//!
//! - [`catalog`] - refresh cycles that reconcile remote catalogs into the registry
//! - [`feed`] - feed download, parsing, validation and polling
//! - [`storage`] - SQLite blog registry and metadata
//! - [`config`] - TOML configuration

pub mod catalog;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
