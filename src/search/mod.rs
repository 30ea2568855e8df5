//! Recommendation pipeline
//!
//! profile → query synthesis → vector retrieval → geo filter → LLM re-rank.
//! Every stage past validation degrades instead of failing: a dead model
//! yields the fallback query or zero scores, a dead index yields no schemes.

pub mod artifacts;
pub mod geo;
pub mod query;
pub mod rerank;
pub mod retriever;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::embedding::Embedder;
use crate::error::SchemeError;
use crate::llm::LanguageModel;
use crate::models::{RankedScheme, UserProfile, SEARCH_REQUIRED_FIELDS};
use crate::vector::VectorIndex;
use crate::Result;

pub use artifacts::ArtifactStore;
pub use geo::filter_by_state;
pub use query::{sanitize_input, QuerySynthesizer};
pub use rerank::Reranker;
pub use retriever::{synthesize_scheme_id, Retriever};

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub top_k: usize,
    pub batch_size: usize,
    pub llm_timeout: Duration,
    pub embedding_timeout: Duration,
    pub vector_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: 20,
            batch_size: rerank::DEFAULT_BATCH_SIZE,
            llm_timeout: Duration::from_secs(60),
            embedding_timeout: Duration::from_secs(30),
            vector_timeout: Duration::from_secs(15),
        }
    }
}

fn check_search_fields(profile: &UserProfile) -> Result<()> {
    let missing: Vec<&str> = SEARCH_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| profile.filled(f).is_none())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    error!(?missing, "Profile is missing search fields");
    Err(SchemeError::validation(missing))
}

pub struct SchemeSearch {
    synthesizer: QuerySynthesizer,
    retriever: Retriever,
    reranker: Reranker,
    top_k: usize,
}

impl SchemeSearch {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            synthesizer: QuerySynthesizer::new(model.clone(), settings.llm_timeout),
            retriever: Retriever::new(
                embedder,
                index,
                settings.embedding_timeout,
                settings.vector_timeout,
            ),
            reranker: Reranker::new(model, settings.batch_size, settings.llm_timeout),
            top_k: settings.top_k,
        }
    }

    /// Ranked schemes for `profile`; empty when nothing survives filtering.
    /// Only a profile lacking state, gender, occupation or income is an error.
    pub async fn search(&self, profile: &UserProfile) -> Result<Vec<RankedScheme>> {
        check_search_fields(profile)?;

        // Geo matching uses the state as given; sanitizing strips '&' from "Jammu & Kashmir"
        let user_state = profile.state.clone().unwrap_or_default();
        let profile = query::sanitize_profile(profile);

        let query = self.synthesizer.synthesize(&profile).await;
        let candidates = self.retriever.retrieve(&query, self.top_k).await;
        if candidates.is_empty() {
            warn!("No schemes found in vector search");
            return Ok(Vec::new());
        }

        let filtered = filter_by_state(candidates, &user_state);
        info!(count = filtered.len(), state = %user_state, "Filtered to matching state or nationwide");
        if filtered.is_empty() {
            warn!("No schemes left after state filtering");
            return Ok(Vec::new());
        }

        Ok(self.reranker.rerank(filtered, &profile, self.top_k).await)
    }

    /// Persist the profile, search, persist the ranked list.
    /// A failed profile write aborts; a failed list write is only logged.
    pub async fn search_and_persist(
        &self,
        profile: &UserProfile,
        artifacts: &ArtifactStore,
    ) -> Result<Vec<RankedScheme>> {
        check_search_fields(profile)?;
        artifacts.write_profile(profile).await?;
        let ranked = self.search(profile).await?;
        if let Err(e) = artifacts.write_recommendations(&ranked).await {
            error!("Failed to save recommended schemes: {}", e);
        }
        Ok(ranked)
    }
}
