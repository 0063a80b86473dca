//! Person Enricher Library
//!
//! Stores people by name and infers their age, gender and nationality from three public lookup
//! APIs at creation time.
//!
//! # Modules
//!
//! - `scope`: Cancellable, deadline-bearing execution scope.
//! - `providers`: Age, gender and nationality provider adapters.
//! - `enrichment`: Coordinator that fans out to the providers and reduces their results.
//! - `errors`: Error handling types.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `models`: Core data models.
//! - `validator`: Request validation.
//! - `repository`: Person persistence.
//! - `services`: Person use cases.
//! - `handlers`: HTTP request handlers.

pub mod config;
pub mod db;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod repository;
pub mod scope;
pub mod services;
pub mod validator;
