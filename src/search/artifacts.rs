//! Persisted hand-off files: the submitted profile and the ranked list
//!
//! Each session gets its own directory (SHA-256 of the session id) under the
//! artifact root so concurrent sessions never overwrite each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{RankedScheme, RecommendedScheme, SchemeMetadata, UserProfile};
use crate::Result;

pub const PROFILE_FILE: &str = "user_details.json";
pub const RECOMMENDATIONS_FILE: &str = "recommended_schemes.json";

/// Record produced by the search step before flattening
#[derive(Debug, Clone, Deserialize)]
pub struct WrappedScheme {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub pinecone_score: Option<f32>,
    #[serde(default)]
    pub llm_score: Option<f64>,
    pub metadata: SchemeMetadata,
}

/// Either shape found in a recommendations file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredScheme {
    Wrapped(WrappedScheme),
    Flat(RecommendedScheme),
}

fn clamp_score(score: Option<f64>) -> u8 {
    score
        .filter(|s| s.is_finite())
        .map(|s| s.trunc().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

/// Normalize a stored record into the in-memory ranked form
pub fn normalize_stored(stored: StoredScheme) -> RankedScheme {
    match stored {
        StoredScheme::Flat(record) => record.into(),
        StoredScheme::Wrapped(w) => {
            let mut metadata = w.metadata;
            let id = match w.id {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            if metadata.scheme_id.trim().is_empty() {
                metadata.scheme_id = id.clone();
            }
            RankedScheme {
                id: if id.is_empty() { metadata.scheme_id.clone() } else { id },
                llm_score: clamp_score(w.llm_score),
                pinecone_score: w.pinecone_score.or(w.score).unwrap_or(0.0),
                metadata,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Per-session directory `root/<sha256(session_id)>`
    pub fn for_session(root: impl AsRef<Path>, session_id: &str) -> Self {
        let digest = Sha256::digest(session_id.as_bytes());
        Self::new(root.as_ref().join(hex::encode(digest)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    pub fn recommendations_path(&self) -> PathBuf {
        self.dir.join(RECOMMENDATIONS_FILE)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    pub async fn write_profile(&self, profile: &UserProfile) -> Result<()> {
        let path = self.profile_path();
        self.write_json(&path, profile).await?;
        info!(path = %path.display(), "Saved user profile");
        Ok(())
    }

    pub async fn read_profile(&self) -> Result<UserProfile> {
        let raw = tokio::fs::read(self.profile_path()).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Overwrites any earlier list; an empty slice writes `[]`
    pub async fn write_recommendations(&self, schemes: &[RankedScheme]) -> Result<()> {
        let path = self.recommendations_path();
        let records: Vec<RecommendedScheme> = schemes.iter().map(RankedScheme::to_record).collect();
        self.write_json(&path, &records).await?;
        info!(count = records.len(), path = %path.display(), "Saved recommended schemes");
        Ok(())
    }

    pub async fn read_recommendations(&self) -> Result<Vec<RankedScheme>> {
        let raw = tokio::fs::read(self.recommendations_path()).await?;
        let stored: Vec<StoredScheme> = serde_json::from_slice(&raw)?;
        Ok(stored.into_iter().map(normalize_stored).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ranked(id: &str, llm: u8, sim: f32) -> RankedScheme {
        RankedScheme {
            id: format!("vec-{}", id),
            llm_score: llm,
            pinecone_score: sim,
            metadata: SchemeMetadata {
                scheme_id: id.to_string(),
                scheme_name: format!("Scheme {}", id),
                state: "Kerala".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_recommendations_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let list = vec![ranked("KL-1", 92, 0.8123), ranked("KL-2", 40, 0.77)];

        store.write_recommendations(&list).await.unwrap();
        let back = store.read_recommendations().await.unwrap();

        assert_eq!(back.len(), 2);
        for (a, b) in list.iter().zip(&back) {
            assert_eq!(a.scheme_id(), b.scheme_id());
            assert_eq!(a.llm_score, b.llm_score);
            assert_eq!(a.pinecone_score, b.pinecone_score);
        }
    }

    #[tokio::test]
    async fn test_empty_list_writes_empty_array() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nested"));
        store.write_recommendations(&[]).await.unwrap();
        let raw = std::fs::read_to_string(store.recommendations_path()).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let profile = UserProfile {
            name: Some("Anil".into()),
            state: Some("Punjab".into()),
            ..Default::default()
        };
        store.write_profile(&profile).await.unwrap();
        assert_eq!(store.read_profile().await.unwrap(), profile);
    }

    #[test]
    fn test_wrapped_and_flat_normalize_identically() {
        let flat: StoredScheme = serde_json::from_value(json!({
            "scheme_id": "TS-9", "scheme_name": "Rythu Bima", "state": "Telangana",
            "llm_score": 85, "pinecone_score": 0.66
        }))
        .unwrap();
        let wrapped: StoredScheme = serde_json::from_value(json!({
            "id": "TS-9", "score": 0.66, "llm_score": 85,
            "metadata": {"scheme_id": "TS-9", "scheme_name": "Rythu Bima", "state": "Telangana"}
        }))
        .unwrap();

        assert!(matches!(wrapped, StoredScheme::Wrapped(_)));
        assert_eq!(normalize_stored(flat), normalize_stored(wrapped));
    }

    #[test]
    fn test_wrapped_without_scheme_id_uses_vector_id() {
        let wrapped: StoredScheme = serde_json::from_value(json!({
            "id": 17, "pinecone_score": 0.5, "llm_score": 130.7,
            "metadata": {"scheme_name": "NSAP"}
        }))
        .unwrap();
        let r = normalize_stored(wrapped);
        assert_eq!(r.scheme_id(), "17");
        assert_eq!(r.llm_score, 100);
    }

    #[test]
    fn test_session_dirs_are_distinct_and_stable() {
        let a = ArtifactStore::for_session("data", "session-a");
        let b = ArtifactStore::for_session("data", "session-b");
        assert_ne!(a.dir(), b.dir());
        assert_eq!(a.dir(), ArtifactStore::for_session("data", "session-a").dir());
        assert_eq!(a.dir().file_name().unwrap().len(), 64);
    }
}
