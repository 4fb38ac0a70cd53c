//! PaperLens Common Library
//!
//! Shared code for the PaperLens gateway and client including:
//! - Paper lookup, analysis generation and workspace export clients
//! - Storage traits with Postgres and in-memory implementations
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod analysis;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod papers;
pub mod workspace;

// Re-export commonly used types
pub use analysis::{analyze_and_save, Analysis, AnalysisGenerator};
pub use config::AppConfig;
pub use db::{InMemoryStore, Repository, Store};
pub use errors::{AppError, Result};
pub use papers::{Paper, PaperIndex};
pub use workspace::WorkspaceExporter;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
