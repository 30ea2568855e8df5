//! Retrieval: query → embedding → top-k index matches → scheme candidates

use md5::{Digest, Md5};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::embedding::Embedder;
use crate::error::within;
use crate::models::{SchemeCandidate, SchemeMetadata};
use crate::vector::{VectorIndex, VectorMatch};
use crate::Result;

/// Metadata keys that may carry the scheme identifier, in lookup order
pub const SCHEME_ID_KEYS: [&str; 5] = ["scheme_id", "schemeId", "SchemeID", "id", "scheme_id "];

/// Placeholder identifier `SCH-{STA}-{NNNN}` for schemes indexed without one.
/// Deterministic in `(name, state)`.
pub fn synthesize_scheme_id(name: &str, state: &str) -> String {
    let digest = Md5::digest(format!("{}_{}", name, state).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    let bucket = u128::from_be_bytes(bytes) % 10_000;
    let prefix: String = state.chars().take(3).collect::<String>().to_uppercase();
    format!("SCH-{}-{:04}", prefix, bucket)
}

/// Text form of a metadata value; lists are joined with ", "
fn metadata_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(metadata_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn text_field(metadata: &Map<String, Value>, key: &str) -> String {
    metadata.get(key).map(metadata_text).unwrap_or_default()
}

fn resolve_scheme_id(metadata: &Map<String, Value>) -> Option<String> {
    SCHEME_ID_KEYS.iter().find_map(|key| {
        let id = metadata_text(metadata.get(*key)?);
        let id = id.trim();
        (!id.is_empty()).then(|| id.to_string())
    })
}

/// Turn one raw index match into a candidate. `None` when it has no scheme name.
pub fn normalize_match(m: VectorMatch) -> Option<SchemeCandidate> {
    let name = text_field(&m.metadata, "scheme_name");
    if name.trim().is_empty() {
        warn!(id = %m.id, "Skipping match with missing scheme_name");
        return None;
    }

    let scheme_id = match resolve_scheme_id(&m.metadata) {
        Some(id) => id,
        None => {
            let state = match m.metadata.get("state") {
                Some(v) => metadata_text(v),
                None => "unknown".to_string(),
            };
            let id = synthesize_scheme_id(&name, &state);
            warn!(scheme = %name, state = %state, generated = %id, "No scheme_id in metadata, generated placeholder");
            id
        }
    };

    Some(SchemeCandidate {
        metadata: SchemeMetadata {
            scheme_id,
            scheme_name: name,
            brief_description: text_field(&m.metadata, "brief_description"),
            eligibility_criteria: text_field(&m.metadata, "eligibility_criteria"),
            state: text_field(&m.metadata, "state"),
            tags: text_field(&m.metadata, "tags"),
            category: text_field(&m.metadata, "category"),
        },
        id: m.id,
        score: m.score,
    })
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    embedding_timeout: Duration,
    vector_timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        embedding_timeout: Duration,
        vector_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            embedding_timeout,
            vector_timeout,
        }
    }

    /// Up to `top_k` named candidates in index order; empty on any failure
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Vec<SchemeCandidate> {
        match self.try_retrieve(query, top_k).await {
            Ok(candidates) => {
                info!(count = candidates.len(), "Retrieved schemes from vector index");
                candidates
            }
            Err(e) => {
                error!("Vector search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SchemeCandidate>> {
        debug!(query = %query, top_k, "Searching vector index");
        let embedding = within("query embedding", self.embedding_timeout, self.embedder.encode(query)).await?;
        let matches = within(
            "vector query",
            self.vector_timeout,
            self.index.query(&embedding, top_k, true),
        )
        .await?;

        Ok(matches
            .into_iter()
            .take(top_k)
            .filter_map(normalize_match)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StaticEmbedder;
    use crate::vector::InMemoryIndex;
    use serde_json::json;

    fn vector_match(id: &str, metadata: Value) -> VectorMatch {
        VectorMatch {
            id: id.to_string(),
            score: 0.5,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_synthesized_id_is_deterministic() {
        let a = synthesize_scheme_id("Kalia", "Odisha");
        let b = synthesize_scheme_id("Kalia", "Odisha");
        assert_eq!(a, b);
        assert!(a.starts_with("SCH-ODI-"));
        assert_eq!(a.len(), "SCH-ODI-0000".len());
        assert_ne!(a, synthesize_scheme_id("Kalia", "Kerala"));
        assert!(synthesize_scheme_id("X", "unknown").starts_with("SCH-UNK-"));
    }

    #[test]
    fn test_id_resolution_order() {
        let m = vector_match(
            "vec-1",
            json!({"scheme_name": "PM-KISAN", "schemeId": 42, "id": "other", "state": "All India"}),
        );
        let c = normalize_match(m).unwrap();
        assert_eq!(c.metadata.scheme_id, "42");
        assert_eq!(c.id, "vec-1");

        let trailing = vector_match("vec-2", json!({"scheme_name": "Kalia", "scheme_id ": "KAL-7"}));
        assert_eq!(normalize_match(trailing).unwrap().metadata.scheme_id, "KAL-7");
    }

    #[test]
    fn test_missing_id_is_synthesized() {
        let m = vector_match("v", json!({"scheme_name": "Kalia", "state": "Odisha"}));
        let c = normalize_match(m).unwrap();
        assert_eq!(c.metadata.scheme_id, synthesize_scheme_id("Kalia", "Odisha"));
    }

    #[test]
    fn test_nameless_matches_are_skipped() {
        assert!(normalize_match(vector_match("v", json!({"state": "Goa"}))).is_none());
        assert!(normalize_match(vector_match("v", json!({"scheme_name": "  "}))).is_none());
    }

    #[test]
    fn test_list_metadata_is_joined() {
        let m = vector_match(
            "v",
            json!({"scheme_name": "Stand-Up India", "scheme_id": "SUI", "tags": ["Women", "SC", "Loan"]}),
        );
        assert_eq!(normalize_match(m).unwrap().metadata.tags, "Women, SC, Loan");
    }

    #[tokio::test]
    async fn test_retrieve_preserves_index_order() {
        let mut index = InMemoryIndex::new();
        let meta = |name: &str| json!({"scheme_name": name, "scheme_id": name}).as_object().cloned().unwrap();
        index.insert("far", vec![1.0, 0.0], meta("Far"));
        index.insert("near", vec![0.0, 1.0], meta("Near"));
        index.insert("blank", vec![0.1, 1.0], Map::new());

        let retriever = Retriever::new(
            Arc::new(StaticEmbedder::new(vec![0.0, 1.0])),
            Arc::new(index),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let hits = retriever.retrieve("farmer", 3).await;
        let names: Vec<_> = hits.iter().map(|c| c.metadata.scheme_name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Far"]);
    }

    #[tokio::test]
    async fn test_retrieve_failure_is_empty() {
        let mut index = InMemoryIndex::new();
        index.insert("a", vec![1.0, 0.0, 0.0], Map::new());
        let retriever = Retriever::new(
            Arc::new(StaticEmbedder::new(vec![0.0, 1.0])),
            Arc::new(index),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(retriever.retrieve("anything", 20).await.is_empty());
    }
}
