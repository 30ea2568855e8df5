//! Vector index seam
//!
//! The hosted index is the production backend; the in-process index loads the
//! embeddings file written by the offline embedding step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub mod memory;
pub mod pinecone;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

/// One nearest-neighbour hit, in index order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `top_k` matches by cosine similarity, best first
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>>;
}
