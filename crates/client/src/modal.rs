//! Analysis modal state
//!
//! `Idle -> Loading -> Loaded | Failed`, plus a two-way toggle between the
//! analysis view and the export view. Nothing here is persisted.

use crate::api::ResearchApi;
use paperlens_common::{
    db::models::AnalysisRecord,
    errors::{AppError, Result},
    papers::Paper,
    workspace::WorkspaceRecord,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ModalState {
    Idle,
    Loading,
    Loaded(AnalysisRecord),
    /// Public error message for the inline notice
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalView {
    Analysis,
    Export,
}

impl ModalView {
    pub fn toggled(self) -> Self {
        match self {
            ModalView::Analysis => ModalView::Export,
            ModalView::Export => ModalView::Analysis,
        }
    }
}

#[derive(Debug)]
pub struct AnalysisModal {
    state: ModalState,
    view: ModalView,
    paper: Option<Paper>,
}

impl Default for AnalysisModal {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisModal {
    pub fn new() -> Self {
        Self {
            state: ModalState::Idle,
            view: ModalView::Analysis,
            paper: None,
        }
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn view(&self) -> ModalView {
        self.view
    }

    pub fn paper(&self) -> Option<&Paper> {
        self.paper.as_ref()
    }

    /// Start showing a paper. Returns true when the analysis still has to
    /// be fetched.
    pub fn begin(&mut self, paper: Paper, cached: Option<AnalysisRecord>) -> bool {
        self.paper = Some(paper);
        self.view = ModalView::Analysis;

        match cached {
            Some(record) => {
                self.state = ModalState::Loaded(record);
                false
            }
            None => {
                self.state = ModalState::Loading;
                true
            }
        }
    }

    /// Settle a pending load; ignored unless loading
    pub fn complete(&mut self, result: Result<AnalysisRecord>) {
        if self.state != ModalState::Loading {
            return;
        }

        self.state = match result {
            Ok(record) => ModalState::Loaded(record),
            Err(e) => {
                tracing::warn!(error = %e, "Analysis failed");
                ModalState::Failed(e.public_message())
            }
        };
    }

    /// Show the cached record if there is one, otherwise analyze and save
    pub async fn open(
        &mut self,
        api: &dyn ResearchApi,
        paper: Paper,
        cached: Option<AnalysisRecord>,
        project_id: Option<Uuid>,
    ) -> &ModalState {
        if self.begin(paper.clone(), cached) {
            let result = api.analyze_and_save(&paper, project_id).await;
            self.complete(result);
        }
        &self.state
    }

    /// Switch between analysis and export; only once loaded
    pub fn toggle_view(&mut self) -> ModalView {
        if matches!(self.state, ModalState::Loaded(_)) {
            self.view = self.view.toggled();
        }
        self.view
    }

    pub fn close(&mut self) {
        self.state = ModalState::Idle;
        self.view = ModalView::Analysis;
        self.paper = None;
    }

    /// Push the loaded analysis into a workspace database
    pub async fn export(
        &self,
        api: &dyn ResearchApi,
        credential: &str,
        database_id: &str,
    ) -> Result<WorkspaceRecord> {
        let (paper, record) = match (&self.paper, &self.state) {
            (Some(paper), ModalState::Loaded(record)) => (paper, record),
            _ => {
                return Err(AppError::InvalidFormat {
                    message: "No analysis loaded".to_string(),
                })
            }
        };

        api.add_to_database(credential, database_id, paper, &record.analysis)
            .await
    }
}
