//! One-off analysis handler
//!
//! Generates a fresh analysis for the posted paper without storing it.
//! Saved analyses go through `POST /analyses`.

use axum::extract::State;

use crate::extract::Json;
use crate::AppState;
use paperlens_common::{analysis::{Analysis, AnalysisGenerator}, errors::Result, papers::Paper};

pub async fn analyze(
    State(state): State<AppState>,
    Json(paper): Json<Paper>,
) -> Result<Json<Analysis>> {
    let analysis = state.analyzer.analyze(&paper).await?;

    tracing::info!(
        paper_id = %paper.paper_id,
        model = state.analyzer.model_name(),
        tags = analysis.tags.len(),
        "Paper analyzed"
    );

    Ok(Json(analysis))
}
