//! Turns raw search candidates into classified leads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use leadscope_core::{Candidate, Category, Confidence, Lead, SearchQuery};
use tracing::debug;
use uuid::Uuid;

use crate::scoring::CategoryScorer;
use crate::title::parse_title;

/// Builds leads for one batch. Ids combine the batch token, a per-builder
/// sequence and the candidate position, so they are unique within the batch
/// even when positions repeat across queries.
#[derive(Debug)]
pub struct LeadBuilder {
    scorer: Arc<CategoryScorer>,
    batch_token: String,
    seq: AtomicU64,
}

impl LeadBuilder {
    pub fn new(scorer: Arc<CategoryScorer>) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self::with_batch_token(scorer, &token[..8])
    }

    pub fn with_batch_token(scorer: Arc<CategoryScorer>, batch_token: &str) -> Self {
        Self {
            scorer,
            batch_token: batch_token.to_string(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn batch_token(&self) -> &str {
        &self.batch_token
    }

    pub fn build(
        &self,
        candidate: &Candidate,
        query_category: Category,
        query_label: &str,
    ) -> Lead {
        self.build_at(candidate, query_category, query_label, Utc::now())
    }

    pub fn build_at(
        &self,
        candidate: &Candidate,
        query_category: Category,
        query_label: &str,
        scraped_at: DateTime<Utc>,
    ) -> Lead {
        let parsed = parse_title(&candidate.title);
        let classification = self.scorer.score(&candidate.title, &candidate.snippet);

        // the query category is only a fallback for unclassified text
        let (category, confidence) = if classification.category == Category::Uncategorized {
            (query_category, Confidence::Low)
        } else {
            (classification.category, classification.confidence)
        };

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{}-{}", self.batch_token, seq, candidate.position);
        debug!(%id, %category, %confidence, link = %candidate.link, "built lead");

        Lead {
            id,
            name: parsed.name,
            headline: parsed.headline,
            profile_url: candidate.link.clone(),
            snippet: candidate.snippet.clone(),
            category,
            confidence,
            source: query_label.to_string(),
            scraped_at,
        }
    }

    pub fn build_for_query(&self, candidates: &[Candidate], query: &SearchQuery) -> Vec<Lead> {
        let scraped_at = Utc::now();
        candidates
            .iter()
            .map(|c| self.build_at(c, query.category, &query.label, scraped_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn builder() -> LeadBuilder {
        LeadBuilder::with_batch_token(Arc::new(CategoryScorer::default()), "batch")
    }

    fn candidate(title: &str, snippet: &str, link: &str, position: u32) -> Candidate {
        Candidate {
            title: title.to_string(),
            snippet: snippet.to_string(),
            link: link.to_string(),
            position,
        }
    }

    #[test]
    fn jane_doe_caterer_is_high_confidence_kitchen_tenant() {
        let lead = builder().build(
            &candidate(
                "Jane Doe - Owner, Baltimore Catering Co | LinkedIn",
                "catering owner serving Baltimore weddings",
                "https://linkedin.com/in/janedoe/",
                1,
            ),
            Category::KitchenTenant,
            "Baltimore caterers",
        );
        assert_eq!(lead.name, "Jane Doe");
        assert_eq!(lead.headline, "Owner, Baltimore Catering Co");
        assert_eq!(lead.category, Category::KitchenTenant);
        assert_eq!(lead.confidence, Confidence::High);
        assert_eq!(lead.source, "Baltimore caterers");
        assert_eq!(lead.profile_url, "https://linkedin.com/in/janedoe/");
    }

    #[test]
    fn unclassified_text_falls_back_to_query_category_at_low() {
        let lead = builder().build(
            &candidate(
                "Alex Morgan - Software Engineer",
                "distributed systems",
                "https://linkedin.com/in/am",
                2,
            ),
            Category::EventClient,
            "Event planners",
        );
        assert_eq!(lead.category, Category::EventClient);
        assert_eq!(lead.confidence, Confidence::Low);
    }

    #[test]
    fn confident_scorer_result_wins_over_query_category() {
        let lead = builder().build(
            &candidate(
                "Ana Ruiz - Coworking community manager",
                "",
                "https://linkedin.com/in/ar",
                3,
            ),
            Category::KitchenTenant,
            "Kitchen search",
        );
        assert_eq!(lead.category, Category::OfficeTenant);
        assert_eq!(lead.confidence, Confidence::Medium);
    }

    #[test]
    fn ids_are_unique_even_when_positions_repeat() {
        let b = builder();
        let c = candidate("A - B", "", "https://linkedin.com/in/a", 1);
        let ids = (0..5)
            .map(|_| b.build(&c, Category::OfficeTenant, "q").id)
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains("batch-0-1"));
    }

    #[test]
    fn build_for_query_uses_label_and_shared_timestamp() {
        let query = SearchQuery {
            query_id: "q1".into(),
            label: "Food trucks".into(),
            category: Category::KitchenTenant,
            query: "food truck owner".into(),
            num_results: None,
        };
        let leads = builder().build_for_query(
            &[
                candidate("A - Food truck owner", "", "https://linkedin.com/in/a", 1),
                candidate("B", "", "https://linkedin.com/in/b", 2),
            ],
            &query,
        );
        assert_eq!(leads.len(), 2);
        assert!(leads.iter().all(|l| l.source == "Food trucks"));
        assert_eq!(leads[0].scraped_at, leads[1].scraped_at);
        assert_eq!(leads[1].category, Category::KitchenTenant);
        assert_eq!(leads[1].confidence, Confidence::Low);
    }
}
