//! In-process cosine index
//!
//! Loads the `[{id, values, metadata}]` file produced by the offline embedding
//! step and answers queries by brute force. Fine for a few thousand schemes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use crate::error::SchemeError;
use crate::vector::{VectorIndex, VectorMatch};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct StoredVector {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    vectors: Vec<StoredVector>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vectors(vectors: Vec<StoredVector>) -> Self {
        Self { vectors }
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let vectors: Vec<StoredVector> = serde_json::from_slice(&raw)?;
        info!(count = vectors.len(), path = %path.display(), "Loaded embeddings file");
        Ok(Self { vectors })
    }

    pub fn insert(&mut self, id: impl Into<String>, values: Vec<f32>, metadata: Map<String, Value>) {
        self.vectors.push(StoredVector {
            id: id.into(),
            values,
            metadata,
        });
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let mut scored = Vec::with_capacity(self.vectors.len());
        for stored in &self.vectors {
            if stored.values.len() != embedding.len() {
                return Err(SchemeError::ExternalService(format!(
                    "dimension mismatch: index has {}, query has {}",
                    stored.values.len(),
                    embedding.len()
                )));
            }
            scored.push((cosine(embedding, &stored.values), stored));
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, stored)| VectorMatch {
                id: stored.id.clone(),
                score,
                metadata: if include_metadata {
                    stored.metadata.clone()
                } else {
                    Map::new()
                },
            })
            .collect())
    }
}
