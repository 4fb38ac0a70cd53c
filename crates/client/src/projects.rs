//! Local project cache
//!
//! Holds the caller's projects for list views. Writes go to the server
//! first; the cache changes only after the server acknowledges, so a failed
//! write leaves it exactly as it was.

use crate::api::ResearchApi;
use paperlens_common::{db::models::Project, errors::Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct ProjectsCache {
    api: Arc<dyn ResearchApi>,
    projects: RwLock<Vec<Project>>,
}

impl ProjectsCache {
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self {
            api,
            projects: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot, newest first
    pub async fn projects(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }

    /// Replace the cache with the server's list
    pub async fn refresh(&self) -> Result<Vec<Project>> {
        let projects = self.api.list_projects().await?;
        *self.projects.write().await = projects.clone();
        Ok(projects)
    }

    pub async fn create(&self, title: &str, description: Option<&str>) -> Result<Project> {
        let project = self.api.create_project(title, description).await?;
        self.projects.write().await.insert(0, project.clone());

        tracing::debug!(project_id = %project.id, "Project cached");
        Ok(project)
    }

    pub async fn update(&self, id: Uuid, title: &str, description: Option<&str>) -> Result<Project> {
        let project = self.api.update_project(id, title, description).await?;

        let mut projects = self.projects.write().await;
        match projects.iter_mut().find(|p| p.id == id) {
            Some(cached) => *cached = project.clone(),
            None => projects.insert(0, project.clone()),
        }
        Ok(project)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.api.delete_project(id).await?;
        self.projects.write().await.retain(|p| p.id != id);
        Ok(())
    }
}
