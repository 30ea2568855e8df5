//! Pinecone data-plane client (`POST {host}/query`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::SchemeError;
use crate::vector::{VectorIndex, VectorMatch};
use crate::Result;

const API_VERSION: &str = "2024-07";

pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: String, namespace: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(SchemeError::Config("PINECONE_API_KEY not configured".to_string()));
        }
        if host.trim().is_empty() {
            return Err(SchemeError::Config("PINECONE_HOST not configured".to_string()));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            host: normalize_host(host),
            api_key,
            namespace: namespace.filter(|n| !n.is_empty()),
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl From<PineconeMatch> for VectorMatch {
    fn from(m: PineconeMatch) -> Self {
        VectorMatch {
            id: m.id,
            score: m.score,
            metadata: m.metadata.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let url = format!("{}/query", self.host);
        let body = QueryRequest {
            vector: embedding,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        debug!(top_k, dimension = embedding.len(), "Querying Pinecone");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| SchemeError::ExternalService(format!("Pinecone request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Pinecone returned {}: {}", status, text);
            return Err(SchemeError::ExternalService(format!(
                "Pinecone returned {}: {}",
                status, text
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| SchemeError::ExternalService(format!("invalid Pinecone response: {}", e)))?;

        Ok(parsed.matches.into_iter().map(VectorMatch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_wire_names() {
        let vector = [0.1_f32, 0.2];
        let body = QueryRequest {
            vector: &vector,
            top_k: 20,
            include_metadata: true,
            include_values: false,
            namespace: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["topK"], 20);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("namespace").is_none());
    }

    #[test]
    fn test_response_without_metadata() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"matches":[{"id":"v1","score":0.82},{"id":"v2","score":0.7,"metadata":{"scheme_name":"PM-KISAN"}}],"namespace":""}"#,
        )
        .unwrap();
        let matches: Vec<VectorMatch> = parsed.matches.into_iter().map(Into::into).collect();
        assert!(matches[0].metadata.is_empty());
        assert_eq!(matches[1].metadata["scheme_name"], "PM-KISAN");
    }

    #[test]
    fn test_host_normalization_and_key_check() {
        assert_eq!(normalize_host("scheme-data-abc.svc.pinecone.io/"), "https://scheme-data-abc.svc.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080"), "http://localhost:5080");
        assert!(PineconeIndex::new("host", String::new(), None).is_err());
    }
}
