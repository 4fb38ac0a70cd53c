//! PaperLens Client Library
//!
//! Typed access to the gateway for front ends:
//! - Session tracking with change notifications
//! - `ResearchApi` trait and its HTTP implementation
//! - Project cache that only reflects acknowledged writes
//! - Batch "already analyzed?" checks and the recents view
//! - Analysis modal state machine and tag colors

pub mod analyses;
pub mod api;
pub mod modal;
pub mod projects;
pub mod session;
pub mod tags;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ProjectDetail, ResearchApi};
pub use session::{Session, SessionState};
