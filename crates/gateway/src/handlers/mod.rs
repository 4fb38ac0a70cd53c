//! API handlers module

pub mod analyses;
pub mod analyze;
pub mod health;
pub mod notion;
pub mod papers;
pub mod projects;
