//! Query embedding
//!
//! The retriever needs one unit-length vector per query, produced by the same
//! sentence-embedding model that built the index (BAAI/bge-large-en-v1.5 by
//! default). The model is served over HTTP, either by a
//! text-embeddings-inference server or an OpenAI-compatible endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::SchemeError;
use crate::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into an L2-normalized vector
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Supported embedding server APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingApi {
    /// text-embeddings-inference `POST /embed`
    Tei,
    /// OpenAI-compatible `POST /v1/embeddings`
    OpenAi,
}

impl FromStr for EmbeddingApi {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tei" | "hf" | "huggingface" => Ok(EmbeddingApi::Tei),
            "openai" | "open_ai" => Ok(EmbeddingApi::OpenAi),
            other => Err(SchemeError::Config(format!(
                "unknown EMBEDDING_API '{}', expected tei or openai",
                other
            ))),
        }
    }
}

pub struct HttpEmbedder {
    api: EmbeddingApi,
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(
        api: EmbeddingApi,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            api,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchemeError::ExternalService(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SchemeError::ExternalService(format!(
                "embedding server returned {}: {}",
                status, text
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| SchemeError::ExternalService(format!("invalid embedding response: {}", e)))
    }

    async fn encode_tei(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct TeiRequest<'a> {
            inputs: &'a str,
            normalize: bool,
        }

        let vectors: Vec<Vec<f32>> = self
            .post("/embed", &TeiRequest { inputs: text, normalize: true })
            .await?;

        vectors
            .into_iter()
            .next()
            .ok_or_else(|| SchemeError::ExternalService("embedding server returned no vectors".into()))
    }

    async fn encode_openai(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            input: &'a str,
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let response: OpenAiResponse = self
            .post(
                "/v1/embeddings",
                &OpenAiRequest {
                    input: text,
                    model: &self.model,
                },
            )
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SchemeError::ExternalService("embedding server returned no data".into()))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        debug!(api = ?self.api, model = %self.model, "Encoding query");
        let raw = match self.api {
            EmbeddingApi::Tei => self.encode_tei(text).await?,
            EmbeddingApi::OpenAi => self.encode_openai(text).await?,
        };
        normalize(raw)
    }
}

/// Returns the same vector for every query. Development & testing only.
pub struct StaticEmbedder {
    vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        normalize(self.vector.clone())
    }
}

/// Scale `v` to unit length; cosine search assumes it
pub fn normalize(mut v: Vec<f32>) -> Result<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(SchemeError::ExternalService(
            "embedding has zero or non-finite norm".to_string(),
        ));
    }
    for x in &mut v {
        *x /= norm;
    }
    Ok(v)
}
