/// Billing Service Library
///
/// Owns the creator storage-block ledger for the Solstream platform: it
/// converts upload sizes into billable blocks, gates uploads against each
/// creator's capacity, and reconciles asynchronous block purchases from the
/// payment gateway into the ledger.
///
/// # Modules
///
/// - `handlers`: Billing HTTP request handlers
/// - `models`: Ledger, credit, intent and purchase entities
/// - `services`: Business logic layer (admission, purchases, uploads, grants)
/// - `db`: Database access layer and repositories
/// - `clients`: Payment gateway and video host collaborators
/// - `jobs`: Reconciliation and maintenance background jobs
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
