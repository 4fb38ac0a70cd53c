//! In-memory store
//!
//! Same invariants as the Postgres repository: (paper_id, user_id)
//! uniqueness, owner scoping, newest-first ordering and unassign-on-delete.
//! Used by the `memory` storage provider and throughout the tests.

use crate::db::models::{AnalysisRecord, Project};
use crate::db::{AnalysisStore, NewAnalysis, ProjectInput, ProjectStore, Store};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    projects: Vec<Project>,
    analyses: Vec<AnalysisRecord>,
}

impl State {
    fn owned_project(&self, id: Uuid, user_id: Uuid) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .ok_or_else(|| AppError::not_found("project", id))
    }
}

/// Newest first; later inserts win ties
fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> DateTime<FixedOffset>) -> Vec<T> {
    let mut out: Vec<T> = items.iter().rev().cloned().collect();
    out.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    out
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn get_analysis(&self, paper_id: &str, user_id: Uuid) -> Result<Option<AnalysisRecord>> {
        let state = self.state.read().await;
        Ok(state
            .analyses
            .iter()
            .find(|a| a.paper_id == paper_id && a.user_id == user_id)
            .cloned())
    }

    async fn check_project(&self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        self.state.read().await.owned_project(project_id, user_id).map(|_| ())
    }

    async fn create_analysis(&self, new: NewAnalysis) -> Result<AnalysisRecord> {
        let mut state = self.state.write().await;

        if let Some(project_id) = new.project_id {
            state.owned_project(project_id, new.user_id)?;
        }

        if state
            .analyses
            .iter()
            .any(|a| a.paper_id == new.paper_id && a.user_id == new.user_id)
        {
            return Err(AppError::Duplicate {
                message: format!("analysis for paper {} already exists", new.paper_id),
            });
        }

        let now = now();
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            paper_id: new.paper_id,
            user_id: new.user_id,
            project_id: new.project_id,
            title: new.title,
            analysis: new.analysis,
            created_at: now,
            updated_at: now,
        };

        state.analyses.push(record.clone());
        Ok(record)
    }

    async fn list_analyses(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let state = self.state.read().await;
        let owned: Vec<AnalysisRecord> = state
            .analyses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&owned, |a| a.created_at))
    }

    async fn set_project(
        &self,
        analysis_id: Uuid,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<AnalysisRecord> {
        let mut state = self.state.write().await;

        if let Some(project_id) = project_id {
            state.owned_project(project_id, user_id)?;
        }

        let record = state
            .analyses
            .iter_mut()
            .find(|a| a.id == analysis_id && a.user_id == user_id)
            .ok_or_else(|| AppError::not_found("analysis", analysis_id))?;

        record.project_id = project_id;
        record.updated_at = now();
        Ok(record.clone())
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let state = self.state.read().await;
        let owned: Vec<Project> = state
            .projects
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&owned, |p| p.created_at))
    }

    async fn get_project(&self, id: Uuid, user_id: Uuid) -> Result<Project> {
        let state = self.state.read().await;
        state.owned_project(id, user_id).cloned()
    }

    async fn list_project_analyses(&self, id: Uuid, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let state = self.state.read().await;
        state.owned_project(id, user_id)?;

        let linked: Vec<AnalysisRecord> = state
            .analyses
            .iter()
            .filter(|a| a.user_id == user_id && a.project_id == Some(id))
            .cloned()
            .collect();
        Ok(newest_first(&linked, |a| a.created_at))
    }

    async fn create_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let mut state = self.state.write().await;

        let now = now();
        let project = Project {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            user_id,
            created_at: now,
            updated_at: now,
        };

        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: Uuid, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let mut state = self.state.write().await;

        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == id && p.user_id == user_id)
            .ok_or_else(|| AppError::not_found("project", id))?;

        project.title = input.title;
        project.description = input.description;
        project.updated_at = now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.owned_project(id, user_id)?;

        let now = now();
        for record in state
            .analyses
            .iter_mut()
            .filter(|a| a.user_id == user_id && a.project_id == Some(id))
        {
            record.project_id = None;
            record.updated_at = now;
        }

        state.projects.retain(|p| p.id != id);
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
