//! Government Scheme Finder
//!
//! Recommends government welfare schemes for a citizen profile and walks the
//! user through the results conversationally:
//! - Collects the profile (form or chat)
//! - Synthesizes a search query and retrieves candidates by vector similarity
//! - Drops schemes for other states, re-ranks the rest with a language model
//! - Discloses grounded scheme details one at a time
//!
//! PIPELINE:
//! PROFILE → QUERY → RETRIEVE → GEO FILTER → RE-RANK → PERSIST → DISCLOSE

pub mod agent;
pub mod api;
pub mod catalog;
pub mod config;
pub mod disclosure;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod profile;
pub mod search;
pub mod session;
pub mod transcript;
pub mod vector;

pub use error::{Result, SchemeError};

// Re-export common types
pub use models::*;
pub use agent::SchemeAssistant;
