//! Postgres repository
//!
//! SeaORM-backed implementation of the store traits. Every query carries
//! the owner predicate, so another user's rows read as missing.

use crate::db::models::*;
use crate::db::{AnalysisStore, DbPool, NewAnalysis, ProjectInput, ProjectStore, Store};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    async fn find_owned_project(&self, id: Uuid, user_id: Uuid) -> Result<Option<Project>> {
        ProjectEntity::find_by_id(id)
            .filter(ProjectColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn require_owned_project(&self, id: Uuid, user_id: Uuid) -> Result<Project> {
        self.find_owned_project(id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("project", id))
    }
}

fn map_insert_error(err: DbErr, paper_id: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Duplicate {
            message: format!("analysis for paper {} already exists", paper_id),
        },
        _ => err.into(),
    }
}

#[async_trait]
impl AnalysisStore for Repository {
    // ========================================================================
    // Analysis Operations
    // ========================================================================

    async fn get_analysis(&self, paper_id: &str, user_id: Uuid) -> Result<Option<AnalysisRecord>> {
        AnalysisEntity::find()
            .filter(AnalysisColumn::PaperId.eq(paper_id))
            .filter(AnalysisColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_analysis_consistent(
        &self,
        paper_id: &str,
        user_id: Uuid,
    ) -> Result<Option<AnalysisRecord>> {
        AnalysisEntity::find()
            .filter(AnalysisColumn::PaperId.eq(paper_id))
            .filter(AnalysisColumn::UserId.eq(user_id))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn check_project(&self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        self.require_owned_project(project_id, user_id).await.map(|_| ())
    }

    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord> {
        if let Some(project_id) = new.project_id {
            self.require_owned_project(project_id, new.user_id).await?;
        }

        let now = chrono::Utc::now();
        let paper_id = new.paper_id.clone();

        let record = AnalysisActiveModel {
            id: Set(Uuid::new_v4()),
            paper_id: Set(new.paper_id),
            user_id: Set(new.user_id),
            project_id: Set(new.project_id),
            title: Set(new.title),
            analysis: Set(new.analysis),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        record
            .insert(self.write_conn())
            .await
            .map_err(|e| map_insert_error(e, &paper_id))
    }

    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        AnalysisEntity::find()
            .filter(AnalysisColumn::UserId.eq(user_id))
            .order_by_desc(AnalysisColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn set_project(
        &self,
        analysis_id: Uuid,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<AnalysisRecord> {
        if let Some(project_id) = project_id {
            self.require_owned_project(project_id, user_id).await?;
        }

        let record = AnalysisEntity::find_by_id(analysis_id)
            .filter(AnalysisColumn::UserId.eq(user_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("analysis", analysis_id))?;

        let mut active: AnalysisActiveModel = record.into();
        active.project_id = Set(project_id);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }
}

#[async_trait]
impl ProjectStore for Repository {
    // ========================================================================
    // Project Operations
    // ========================================================================

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>> {
        ProjectEntity::find()
            .filter(ProjectColumn::UserId.eq(user_id))
            .order_by_desc(ProjectColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_project(&self, id: Uuid, user_id: Uuid) -> Result<Project> {
        self.require_owned_project(id, user_id).await
    }

    async fn list_project_analyses(&self, id: Uuid, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        self.require_owned_project(id, user_id).await?;

        AnalysisEntity::find()
            .filter(AnalysisColumn::ProjectId.eq(id))
            .filter(AnalysisColumn::UserId.eq(user_id))
            .order_by_desc(AnalysisColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn create_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let now = chrono::Utc::now();

        let project = ProjectActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            description: Set(input.description),
            user_id: Set(user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        project.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn update_project(&self, id: Uuid, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let project = ProjectEntity::find_by_id(id)
            .filter(ProjectColumn::UserId.eq(user_id))
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("project", id))?;

        let mut active: ProjectActiveModel = project.into();
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let now: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();
        let txn = self.write_conn().begin().await?;

        AnalysisEntity::update_many()
            .col_expr(AnalysisColumn::ProjectId, Expr::value(Option::<Uuid>::None))
            .col_expr(AnalysisColumn::UpdatedAt, Expr::value(now))
            .filter(AnalysisColumn::ProjectId.eq(id))
            .filter(AnalysisColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let result = ProjectEntity::delete_many()
            .filter(ProjectColumn::Id.eq(id))
            .filter(ProjectColumn::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::not_found("project", id));
        }

        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
