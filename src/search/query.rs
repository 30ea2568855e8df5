//! Query synthesis: profile → one search string for the vector index

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::within;
use crate::llm::LanguageModel;
use crate::models::UserProfile;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\s.,-]").expect("static pattern");
}

/// Strip everything except word characters, whitespace and `.,-`
pub fn sanitize_input(text: &str) -> String {
    UNSAFE_CHARS.replace_all(text, "").into_owned()
}

/// Copy of `profile` with every field passed through [`sanitize_input`]
pub fn sanitize_profile(profile: &UserProfile) -> UserProfile {
    let clean = |v: &Option<String>| v.as_deref().map(sanitize_input);
    UserProfile {
        name: clean(&profile.name),
        state: clean(&profile.state),
        gender: clean(&profile.gender),
        caste: clean(&profile.caste),
        occupation: clean(&profile.occupation),
        category: clean(&profile.category),
        income: clean(&profile.income),
        additional_details: clean(&profile.additional_details),
    }
}

fn build_prompt(profile: &UserProfile) -> String {
    let get = |name: &str| profile.field(name).unwrap_or("");
    format!(
        "Generate a concise search query for government schemes, styled like: \
         'Scheme Name. Tags: [tags]. State: [state]. Eligibility: [criteria].' \
         Use the following user details: State: {}, Gender: {}, Caste: {}, \
         Occupation: {}, Income: {}, Additional Details: {}. \
         If caste is empty, include schemes for all castes, including SC.",
        get("state"),
        get("gender"),
        profile.resolved_caste().unwrap_or(""),
        get("occupation"),
        get("income"),
        get("additional_details"),
    )
}

/// Deterministic query used whenever the model cannot produce one.
/// An absent caste reads "all castes"; an empty one is left out.
pub fn fallback_query(profile: &UserProfile) -> String {
    let caste = match profile.resolved_caste() {
        Some(c) => c.trim(),
        None => "all castes",
    };
    [
        profile.field("state").unwrap_or("").trim(),
        profile.field("gender").unwrap_or("").trim(),
        caste,
        profile.field("occupation").unwrap_or("").trim(),
        profile.field("income").unwrap_or("").trim(),
        profile.field("additional_details").unwrap_or("").trim(),
    ]
    .iter()
    .filter(|f| !f.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(". ")
}

pub struct QuerySynthesizer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl QuerySynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Never fails: provider errors, timeouts and blank replies all fall back
    pub async fn synthesize(&self, profile: &UserProfile) -> String {
        let prompt = build_prompt(profile);
        match within("query synthesis", self.timeout, self.model.invoke(&prompt)).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let query = reply.trim().to_string();
                info!(query = %query, "Generated search query");
                query
            }
            Ok(_) => {
                error!("Query synthesis returned an empty reply, using fallback");
                fallback_query(profile)
            }
            Err(e) => {
                error!("Failed to generate query with {}: {}", self.model.name(), e);
                fallback_query(profile)
            }
        }
    }
}
