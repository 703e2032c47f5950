//! Lead Generation API Library
//!
//! Standardizes raw business leads from several producers into one canonical
//! record per organization, merges duplicates, scores completeness and
//! classifies each lead for outreach.
//!
//! # Modules
//!
//! - `classifier`: Keyword-table classification and proposal matching.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `matcher`: Candidate index and match confidence.
//! - `merger`: Trust-ranked lead merging.
//! - `models`: Core data models.
//! - `normalize`: Source payload normalization and contact validation.
//! - `pipeline`: Batch orchestration and batch reports.
//! - `routes`: HTTP router.
//! - `scoring`: Completeness score and collection statistics.
//! - `services`: Single-writer ingestion service.
//! - `store`: Lead persistence (memory or Postgres).

pub mod classifier;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod matcher;
pub mod merger;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod routes;
pub mod scoring;
pub mod services;
pub mod store;
