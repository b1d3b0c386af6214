//! Storage layer for the saved-set, report log, and local content catalog.
//!
//! # Modules
//!
//! - `backend`: [`Storage`] trait abstraction
//! - `json`: JSON file-based [`Storage`] implementation
//! - `catalog`: JSON catalog file served as a [`crate::feed::ContentStore`]
//! - `models`: Storage record types separate from domain models

pub mod backend;
pub mod catalog;
pub mod json;
pub mod models;

pub use backend::Storage;
pub use catalog::JsonCatalog;
pub use json::JsonStorage;
pub use models::{CatalogRecord, ReportRecord, SavedRecord};
