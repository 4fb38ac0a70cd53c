//! Analysis views: search result status and recents

use crate::api::ResearchApi;
use futures::future::join_all;
use paperlens_common::{db::models::AnalysisRecord, errors::Result, papers::Paper};
use std::collections::HashMap;

/// A saved analysis with its paper's current details
#[derive(Debug, Clone)]
pub struct RecentAnalysis {
    pub record: AnalysisRecord,
    /// None when the detail lookup failed
    pub paper: Option<Paper>,
}

/// Which of these papers the caller has already analyzed.
///
/// Lookups run concurrently. A failed lookup marks that paper as not
/// analyzed and never fails the batch.
pub async fn analysis_status_batch(
    api: &dyn ResearchApi,
    paper_ids: &[String],
) -> HashMap<String, Option<AnalysisRecord>> {
    let lookups = paper_ids.iter().map(|paper_id| async move {
        let record = match api.get_analysis(paper_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(paper_id = %paper_id, error = %e, "Analysis lookup failed");
                None
            }
        };
        (paper_id.clone(), record)
    });

    join_all(lookups).await.into_iter().collect()
}

/// The caller's analyses, newest first, each with fresh paper details
pub async fn recent_analyses(api: &dyn ResearchApi) -> Result<Vec<RecentAnalysis>> {
    let records = api.list_analyses().await?;

    let enriched = records.into_iter().map(|record| async move {
        let paper = match api.get_paper(&record.paper_id).await {
            Ok(paper) => Some(paper),
            Err(e) => {
                tracing::warn!(paper_id = %record.paper_id, error = %e, "Paper details unavailable");
                None
            }
        };
        RecentAnalysis { record, paper }
    });

    Ok(join_all(enriched).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paper, FakeApi};

    #[tokio::test]
    async fn test_batch_degrades_failed_lookups() {
        let papers = vec![paper("a", "Alpha"), paper("b", "Beta"), paper("c", "Gamma")];
        let api = FakeApi::new(papers.clone());

        api.analyze_and_save(&papers[0], None).await.unwrap();
        api.analyze_and_save(&papers[1], None).await.unwrap();
        api.fail_paper("b");

        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let status = analysis_status_batch(&api, &ids).await;

        assert_eq!(status.len(), 3);
        assert!(status["a"].is_some());
        assert!(status["b"].is_none());
        assert!(status["c"].is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let api = FakeApi::new(vec![]);
        assert!(analysis_status_batch(&api, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_recents_enrich_with_paper_details() {
        let papers = vec![paper("a", "Alpha"), paper("b", "Beta")];
        let api = FakeApi::new(papers.clone());

        api.analyze_and_save(&papers[0], None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        api.analyze_and_save(&papers[1], None).await.unwrap();
        api.fail_paper("a");

        let recents = recent_analyses(&api).await.unwrap();
        assert_eq!(recents.len(), 2);
        assert_eq!(recents[0].record.paper_id, "b");
        assert_eq!(recents[0].paper.as_ref().map(|p| p.title.as_str()), Some("Beta"));
        assert_eq!(recents[1].record.paper_id, "a");
        assert!(recents[1].paper.is_none());
    }
}
