//! In-process `ResearchApi` for view-state tests

use crate::api::{ProjectDetail, ResearchApi};
use async_trait::async_trait;
use paperlens_common::{
    analysis::{analyze_and_save, Analysis, MockAnalyzer},
    db::{models::{AnalysisRecord, Project}, AnalysisStore, InMemoryStore, ProjectInput, ProjectStore},
    errors::{AppError, Result, Upstream},
    papers::{Author, Paper, PaperIndex, SearchResponse, StaticPaperIndex},
    workspace::{InMemoryWorkspace, WorkspaceDatabase, WorkspaceExporter, WorkspaceRecord},
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn paper(id: &str, title: &str) -> Paper {
    Paper {
        paper_id: id.into(),
        title: title.into(),
        abstract_text: None,
        authors: vec![Author { name: "A. Author".into(), author_id: None }],
        year: Some(2020),
        citation_count: 1,
        url: None,
        venue: None,
        publication_date: None,
        fields_of_study: Some(vec!["Computer Science".into()]),
    }
}

/// Backed by the shared in-memory implementations, scoped to one user
pub struct FakeApi {
    pub user_id: Uuid,
    pub store: InMemoryStore,
    pub analyzer: MockAnalyzer,
    pub workspace: InMemoryWorkspace,
    papers: StaticPaperIndex,
    failing_papers: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
}

impl FakeApi {
    pub fn new(papers: Vec<Paper>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            store: InMemoryStore::new(),
            analyzer: MockAnalyzer::new(),
            workspace: InMemoryWorkspace::new(),
            papers: StaticPaperIndex::new(papers),
            failing_papers: Mutex::new(HashSet::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Lookups of this paper fail with a server error
    pub fn fail_paper(&self, paper_id: &str) {
        self.failing_papers.lock().unwrap().insert(paper_id.to_string());
    }

    /// Project writes fail with a server error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_paper(&self, paper_id: &str) -> Result<()> {
        if self.failing_papers.lock().unwrap().contains(paper_id) {
            return Err(AppError::Internal {
                message: "Storage operation failed".into(),
            });
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal {
                message: "Storage operation failed".into(),
            });
        }
        Ok(())
    }

    fn input(title: &str, description: Option<&str>) -> ProjectInput {
        ProjectInput {
            title: title.to_string(),
            description: description.map(String::from),
        }
    }
}

#[async_trait]
impl ResearchApi for FakeApi {
    async fn search_papers(&self, query: &str) -> Result<SearchResponse> {
        self.papers.search(query).await
    }

    async fn get_paper(&self, paper_id: &str) -> Result<Paper> {
        self.check_paper(paper_id)?;
        self.papers.get_paper(paper_id).await
    }

    async fn get_analysis(&self, paper_id: &str) -> Result<Option<AnalysisRecord>> {
        self.check_paper(paper_id)?;
        self.store.get_analysis(paper_id, self.user_id).await
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>> {
        self.store.list_analyses(self.user_id).await
    }

    async fn analyze_and_save(&self, paper: &Paper, project_id: Option<Uuid>) -> Result<AnalysisRecord> {
        if self.failing_papers.lock().unwrap().contains(&paper.paper_id) {
            return Err(AppError::upstream(Upstream::Completion, "boom"));
        }
        let outcome =
            analyze_and_save(&self.store, &self.analyzer, self.user_id, paper, project_id).await?;
        Ok(outcome.record)
    }

    async fn set_project(&self, analysis_id: Uuid, project_id: Option<Uuid>) -> Result<AnalysisRecord> {
        self.store.set_project(analysis_id, self.user_id, project_id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.store.list_projects(self.user_id).await
    }

    async fn get_project(&self, id: Uuid) -> Result<ProjectDetail> {
        Ok(ProjectDetail {
            project: self.store.get_project(id, self.user_id).await?,
            paper_analyses: self.store.list_project_analyses(id, self.user_id).await?,
        })
    }

    async fn create_project(&self, title: &str, description: Option<&str>) -> Result<Project> {
        self.check_write()?;
        self.store
            .create_project(self.user_id, Self::input(title, description))
            .await
    }

    async fn update_project(&self, id: Uuid, title: &str, description: Option<&str>) -> Result<Project> {
        self.check_write()?;
        self.store
            .update_project(id, self.user_id, Self::input(title, description))
            .await
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.check_write()?;
        self.store.delete_project(id, self.user_id).await
    }

    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>> {
        self.workspace.list_databases(credential).await
    }

    async fn create_database(&self, credential: &str, title: &str, page_id: &str) -> Result<WorkspaceDatabase> {
        self.workspace.create_database(credential, title, page_id).await
    }

    async fn add_to_database(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord> {
        self.workspace
            .add_record(credential, database_id, paper, analysis)
            .await
    }
}
