//! Analyze-and-save
//!
//! Lookup, generate on miss, persist. The (paper_id, user_id) uniqueness
//! constraint settles concurrent misses: the losing insert reads back the
//! winner's record instead of surfacing an error.

use super::AnalysisGenerator;
use crate::db::models::AnalysisRecord;
use crate::db::{AnalysisStore, NewAnalysis};
use crate::errors::{AppError, Result};
use crate::metrics::record_analysis;
use crate::papers::Paper;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Stored record plus whether this call generated it
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub record: AnalysisRecord,
    pub created: bool,
}

/// Return the user's stored analysis for the paper, generating and storing
/// one first if none exists. A generation failure stores nothing.
#[instrument(skip(store, generator, paper), fields(paper_id = %paper.paper_id))]
pub async fn analyze_and_save<S, G>(
    store: &S,
    generator: &G,
    user_id: Uuid,
    paper: &Paper,
    project_id: Option<Uuid>,
) -> Result<AnalyzeOutcome>
where
    S: AnalysisStore + ?Sized,
    G: AnalysisGenerator + ?Sized,
{
    if let Some(record) = store.get_analysis(&paper.paper_id, user_id).await? {
        debug!("Reusing stored analysis");
        record_analysis(false);
        return Ok(AnalyzeOutcome { record, created: false });
    }

    if let Some(project_id) = project_id {
        store.check_project(project_id, user_id).await?;
    }

    let analysis = generator.analyze(paper).await?;

    let new = NewAnalysis {
        paper_id: paper.paper_id.clone(),
        user_id,
        title: paper.title.clone(),
        analysis,
        project_id,
    };

    match store.create_analysis(new).await {
        Ok(record) => {
            info!(analysis_id = %record.id, model = generator.model_name(), "Analysis stored");
            record_analysis(true);
            Ok(AnalyzeOutcome { record, created: true })
        }
        Err(AppError::Duplicate { .. }) => {
            debug!("Lost insert race, reading back stored analysis");
            let record = store
                .get_analysis_consistent(&paper.paper_id, user_id)
                .await?
                .ok_or_else(|| AppError::not_found("analysis", &paper.paper_id))?;
            record_analysis(false);
            Ok(AnalyzeOutcome { record, created: false })
        }
        Err(e) => Err(e),
    }
}
