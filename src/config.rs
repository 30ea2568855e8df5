//! Environment configuration
//!
//! `.env` is loaded by [`AppConfig::from_env`]; every setting has a default
//! except provider keys, which are only checked when the component that
//! needs them is built.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::AssistantSettings;
use crate::catalog::{DetailStore, SqliteDetailStore};
use crate::disclosure::DisclosureSettings;
use crate::embedding::{Embedder, EmbeddingApi, HttpEmbedder};
use crate::error::SchemeError;
use crate::llm::{GeminiClient, GroqClient, LanguageModel};
use crate::search::SearchSettings;
use crate::vector::{InMemoryIndex, PineconeIndex, VectorIndex};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    Gemini,
}

impl FromStr for LlmProvider {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(LlmProvider::Groq),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(SchemeError::Config(format!(
                "unknown LLM_PROVIDER '{}', expected groq or gemini",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Pinecone,
    File,
}

impl FromStr for VectorBackend {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pinecone" => Ok(VectorBackend::Pinecone),
            "file" | "memory" => Ok(VectorBackend::File),
            other => Err(SchemeError::Config(format!(
                "unknown VECTOR_BACKEND '{}', expected pinecone or file",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_provider: LlmProvider,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub llm_temperature: f32,

    pub vector_backend: VectorBackend,
    pub pinecone_api_key: Option<String>,
    pub pinecone_host: Option<String>,
    pub pinecone_namespace: Option<String>,
    pub embeddings_file: PathBuf,

    pub embedding_url: String,
    pub embedding_api: EmbeddingApi,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,

    pub database_url: String,
    pub artifact_dir: PathBuf,
    pub port: u16,

    pub top_k: usize,
    pub batch_size: usize,
    pub llm_timeout: Duration,
    pub embedding_timeout: Duration,
    pub vector_timeout: Duration,
    pub detail_timeout: Duration,
    pub session_idle: Duration,
}

fn parse_number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| SchemeError::Config(format!("{} must be a number, got '{}'", key, value))),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| parse_number(key, get(key), default).map(Duration::from_secs);

        Ok(Self {
            llm_provider: or("LLM_PROVIDER", "groq").parse()?,
            groq_api_key: get("GROQ_API_KEY"),
            groq_model: or("GROQ_MODEL", "llama3-70b-8192"),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL", "gemini-1.5-flash"),
            llm_temperature: parse_number("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), 0.7)?,

            vector_backend: or("VECTOR_BACKEND", "pinecone").parse()?,
            pinecone_api_key: get("PINECONE_API_KEY"),
            pinecone_host: get("PINECONE_HOST"),
            pinecone_namespace: get("PINECONE_NAMESPACE"),
            embeddings_file: PathBuf::from(or("EMBEDDINGS_FILE", "scheme_embeddings.json")),

            embedding_url: or("EMBEDDING_URL", "http://localhost:8081"),
            embedding_api: or("EMBEDDING_API", "tei").parse()?,
            embedding_model: or("EMBEDDING_MODEL", "BAAI/bge-large-en-v1.5"),
            embedding_api_key: get("EMBEDDING_API_KEY"),

            database_url: or("DATABASE_URL", "sqlite://new_schemes.db"),
            artifact_dir: PathBuf::from(or("ARTIFACT_DIR", "data")),
            port: parse_number("PORT", get("PORT").or_else(|| get("API_PORT")), 8080)?,

            top_k: parse_number("SEARCH_TOP_K", get("SEARCH_TOP_K"), 20)?,
            batch_size: parse_number("RERANK_BATCH_SIZE", get("RERANK_BATCH_SIZE"), 5)?,
            llm_timeout: secs("LLM_TIMEOUT_SECS", 60)?,
            embedding_timeout: secs("EMBEDDING_TIMEOUT_SECS", 30)?,
            vector_timeout: secs("VECTOR_TIMEOUT_SECS", 15)?,
            detail_timeout: secs("DETAIL_TIMEOUT_SECS", 5)?,
            session_idle: secs("SESSION_IDLE_SECS", 3600)?,
        })
    }

    pub fn build_model(&self) -> Result<Arc<dyn LanguageModel>> {
        match self.llm_provider {
            LlmProvider::Groq => {
                let key = self
                    .groq_api_key
                    .clone()
                    .ok_or_else(|| SchemeError::Config("GROQ_API_KEY is not set".to_string()))?;
                info!(model = %self.groq_model, "Using Groq language model");
                Ok(Arc::new(GroqClient::new(key, self.groq_model.clone(), self.llm_temperature)?))
            }
            LlmProvider::Gemini => {
                let key = self
                    .gemini_api_key
                    .clone()
                    .ok_or_else(|| SchemeError::Config("GEMINI_API_KEY is not set".to_string()))?;
                info!(model = %self.gemini_model, "Using Gemini language model");
                Ok(Arc::new(GeminiClient::new(key, &self.gemini_model, self.llm_temperature)?))
            }
        }
    }

    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        if self.embedding_api == EmbeddingApi::OpenAi && self.embedding_api_key.is_none() {
            warn!("EMBEDDING_API is openai but EMBEDDING_API_KEY is not set");
        }
        Ok(Arc::new(HttpEmbedder::new(
            self.embedding_api,
            self.embedding_url.clone(),
            self.embedding_model.clone(),
            self.embedding_api_key.clone(),
        )?))
    }

    pub async fn build_index(&self) -> Result<Arc<dyn VectorIndex>> {
        match self.vector_backend {
            VectorBackend::Pinecone => {
                let host = self
                    .pinecone_host
                    .as_deref()
                    .ok_or_else(|| SchemeError::Config("PINECONE_HOST is not set".to_string()))?;
                let key = self
                    .pinecone_api_key
                    .clone()
                    .ok_or_else(|| SchemeError::Config("PINECONE_API_KEY is not set".to_string()))?;
                Ok(Arc::new(PineconeIndex::new(host, key, self.pinecone_namespace.clone())?))
            }
            VectorBackend::File => Ok(Arc::new(InMemoryIndex::from_json_file(&self.embeddings_file).await?)),
        }
    }

    pub async fn build_store(&self) -> Result<Arc<dyn DetailStore>> {
        Ok(Arc::new(SqliteDetailStore::connect(&self.database_url, false).await?))
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            top_k: self.top_k,
            batch_size: self.batch_size,
            llm_timeout: self.llm_timeout,
            embedding_timeout: self.embedding_timeout,
            vector_timeout: self.vector_timeout,
        }
    }

    pub fn assistant_settings(&self) -> AssistantSettings {
        AssistantSettings {
            search: self.search_settings(),
            disclosure: DisclosureSettings {
                llm_timeout: self.llm_timeout,
                detail_timeout: self.detail_timeout,
            },
            artifact_root: self.artifact_dir.clone(),
            session_idle: self.session_idle,
        }
    }
}
