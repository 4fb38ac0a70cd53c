//! Persistence layer for PaperLens
//!
//! Provides:
//! - SeaORM entity models (`projects`, `paper_analyses`)
//! - Store traits every backend implements with the same invariants
//! - Postgres repository and an in-memory store
//! - Connection pool management and bundled migrations

pub mod models;
mod memory;
mod repository;

pub use memory::InMemoryStore;
pub use repository::Repository;

use crate::analysis::Analysis;
use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use models::{AnalysisRecord, Project};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Migrations shipped with the crate
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Fields of a new analysis row; id and timestamps are assigned by the store
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub paper_id: String,
    pub user_id: Uuid,
    pub title: String,
    pub analysis: Analysis,
    pub project_id: Option<Uuid>,
}

/// Title and description of a project write
#[derive(Debug, Clone)]
pub struct ProjectInput {
    pub title: String,
    pub description: Option<String>,
}

/// Analysis persistence.
///
/// Absence is `Ok(None)`; storage failures are always `Err`.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Point lookup by (paper_id, user_id)
    async fn get_analysis(&self, paper_id: &str, user_id: Uuid) -> Result<Option<AnalysisRecord>>;

    /// Point lookup that sees every committed write, replica lag included
    async fn get_analysis_consistent(
        &self,
        paper_id: &str,
        user_id: Uuid,
    ) -> Result<Option<AnalysisRecord>> {
        self.get_analysis(paper_id, user_id).await
    }

    /// `NotFound` unless the user owns the project
    async fn check_project(&self, project_id: Uuid, user_id: Uuid) -> Result<()>;

    /// Insert one record; a second record for the same pair is `Duplicate`
    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord>;

    /// All of the user's records, newest first
    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>>;

    /// Repoint (or clear) the record's project; the only mutation path
    async fn set_project(
        &self,
        analysis_id: Uuid,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<AnalysisRecord>;
}

/// Ownership-scoped project CRUD. Another user's project is `NotFound`.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// The user's projects, newest first
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>>;

    async fn get_project(&self, id: Uuid, user_id: Uuid) -> Result<Project>;

    /// Records assigned to the project, newest first
    async fn list_project_analyses(&self, id: Uuid, user_id: Uuid) -> Result<Vec<AnalysisRecord>>;

    async fn create_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project>;

    async fn update_project(&self, id: Uuid, user_id: Uuid, input: ProjectInput) -> Result<Project>;

    /// Delete the project; its analyses become unassigned
    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()>;
}

/// Everything the gateway needs from storage
#[async_trait]
pub trait Store: AnalysisStore + ProjectStore {
    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Self::connect(&config.url, config)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e)
            })?;

        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Self::connect(read_url, config)
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e)
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    async fn connect(url: &str, config: &DatabaseConfig) -> std::result::Result<DatabaseConnection, sea_orm::DbErr> {
        let mut opts = ConnectOptions::new(url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        Database::connect(opts).await
    }

    /// Apply bundled migrations to the primary
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(self.primary.get_postgres_connection_pool())
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Migration failed: {}", e),
            })?;

        info!("Database migrations applied");
        Ok(())
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}
