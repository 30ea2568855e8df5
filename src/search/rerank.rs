//! Language-model re-ranking in fixed-size batches

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::within;
use crate::llm::parse::parse_scores;
use crate::llm::LanguageModel;
use crate::models::{RankedScheme, SchemeCandidate, UserProfile};

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Descending by llm score, ties broken by similarity. Stable.
pub fn rank_order(a: &RankedScheme, b: &RankedScheme) -> Ordering {
    b.llm_score
        .cmp(&a.llm_score)
        .then_with(|| b.pinecone_score.total_cmp(&a.pinecone_score))
}

fn profile_json(profile: &UserProfile) -> String {
    let mut shown = profile.clone();
    shown.caste = profile.resolved_caste().map(str::to_string);
    serde_json::to_string_pretty(&shown).unwrap_or_else(|_| "{}".to_string())
}

fn batch_prompt(profile_json: &str, batch: &[SchemeCandidate]) -> String {
    let schemes = batch
        .iter()
        .enumerate()
        .map(|(j, c)| {
            let meta = serde_json::to_string_pretty(&c.metadata).unwrap_or_default();
            format!("Scheme {}: {}", j + 1, meta)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Score the relevance of each government scheme for the user (0-100).\n\
         User profile: {}.\n\
         Schemes: {}.\n\
         Consider state, gender, caste (if specified), occupation, income, and additional details.\n\
         If caste is not specified, assume all castes are eligible.\n\
         Return a JSON array of integer scores (0-100) in the same order as the schemes, e.g., [95, 80, 70, 60, 12].",
        profile_json, schemes
    )
}

pub struct Reranker {
    model: Arc<dyn LanguageModel>,
    batch_size: usize,
    timeout: Duration,
}

impl Reranker {
    pub fn new(model: Arc<dyn LanguageModel>, batch_size: usize, timeout: Duration) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    async fn score_batch(&self, profile_json: &str, batch: &[SchemeCandidate], first: usize) -> Vec<u8> {
        let prompt = batch_prompt(profile_json, batch);
        let last = first + batch.len() - 1;
        match within("re-rank", self.timeout, self.model.invoke(&prompt)).await {
            Ok(reply) => match parse_scores(&reply, batch.len()) {
                Ok(scores) => {
                    info!("Re-ranked batch {}-{}", first, last);
                    scores
                }
                Err(e) => {
                    warn!("Unusable scores for batch {}-{}: {}", first, last, e);
                    vec![0; batch.len()]
                }
            },
            Err(e) => {
                warn!("Failed to re-rank batch {}-{}: {}", first, last, e);
                vec![0; batch.len()]
            }
        }
    }

    /// Score every candidate, sort, keep the best `top_k`. Never fails.
    pub async fn rerank(
        &self,
        candidates: Vec<SchemeCandidate>,
        profile: &UserProfile,
        top_k: usize,
    ) -> Vec<RankedScheme> {
        info!(
            count = candidates.len(),
            batch_size = self.batch_size,
            "Re-ranking schemes"
        );
        let profile_json = profile_json(profile);
        let mut ranked = Vec::with_capacity(candidates.len());

        for (n, batch) in candidates.chunks(self.batch_size).enumerate() {
            let scores = self
                .score_batch(&profile_json, batch, n * self.batch_size + 1)
                .await;
            ranked.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(scores)
                    .map(|(c, s)| RankedScheme::from_candidate(c, s)),
            );
        }

        ranked.sort_by(rank_order);
        ranked.truncate(top_k);
        ranked
    }
}
