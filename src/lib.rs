//! Scoring, weighting and consolidation of PPM tool-assessment interviews.

pub mod catalog;
pub mod config;
pub mod csv_codec;
pub mod db;
pub mod error;
pub mod import;
pub mod insights;
pub mod kv_store;
pub mod models;
pub mod normalize;
pub mod report;
pub mod scoring;
pub mod store;
pub mod weights;

pub use error::{Error, Result};
