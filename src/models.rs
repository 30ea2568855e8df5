//! Core data models for the scheme finder

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for detail columns the catalog leaves empty
pub const NOT_AVAILABLE: &str = "Not available";

/// Fields a profile must carry before recommendation may run
pub const REQUIRED_PROFILE_FIELDS: [&str; 7] = [
    "name",
    "state",
    "gender",
    "caste",
    "occupation",
    "category",
    "income",
];

/// Fields the search pipeline itself cannot do without
pub const SEARCH_REQUIRED_FIELDS: [&str; 4] = ["state", "gender", "occupation", "income"];

//
// ================= Profile =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
    pub caste: Option<String>,
    pub occupation: Option<String>,
    pub category: Option<String>,
    pub income: Option<String>,
    pub additional_details: Option<String>,
}

impl UserProfile {
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "state" => &self.state,
            "gender" => &self.gender,
            "caste" => &self.caste,
            "occupation" => &self.occupation,
            "category" => &self.category,
            "income" => &self.income,
            "additional_details" => &self.additional_details,
            _ => return None,
        };
        value.as_deref()
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "name" => Some(&mut self.name),
            "state" => Some(&mut self.state),
            "gender" => Some(&mut self.gender),
            "caste" => Some(&mut self.caste),
            "occupation" => Some(&mut self.occupation),
            "category" => Some(&mut self.category),
            "income" => Some(&mut self.income),
            "additional_details" => Some(&mut self.additional_details),
            _ => None,
        }
    }

    /// Value of a field, treating whitespace-only as absent
    pub fn filled(&self, name: &str) -> Option<&str> {
        self.field(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Required fields that are null or empty, in declaration order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_PROFILE_FIELDS
            .iter()
            .copied()
            .filter(|f| self.filled(f).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Reject the profile unless all seven required fields are present
    pub fn validate(&self) -> crate::Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::error::SchemeError::validation(missing))
        }
    }

    /// Merge a model-extracted fragment. Only known keys with non-empty
    /// values overwrite; returns how many fields changed.
    pub fn merge_fragment(&mut self, fragment: &Map<String, Value>) -> usize {
        let mut changed = 0;
        for (key, value) in fragment {
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if text.is_empty() {
                continue;
            }
            if let Some(slot) = self.field_mut(key) {
                if slot.as_deref() != Some(text.as_str()) {
                    *slot = Some(text);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Append free text to `additional_details`, comma separated
    pub fn append_details(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.additional_details = Some(match self.additional_details.as_deref() {
            Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, text),
            _ => text.to_string(),
        });
    }

    /// Caste for prompting; falls back to category only when caste was never given
    pub fn resolved_caste(&self) -> Option<&str> {
        self.caste.as_deref().or(self.category.as_deref())
    }
}

//
// ================= Schemes =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemeMetadata {
    pub scheme_id: String,
    pub scheme_name: String,
    pub brief_description: String,
    pub eligibility_criteria: String,
    pub state: String,
    pub tags: String,
    pub category: String,
}

impl SchemeMetadata {
    pub fn has_name(&self) -> bool {
        !self.scheme_name.trim().is_empty()
    }
}

/// A retrieval hit, normalized from whatever shape the index returned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemeCandidate {
    /// Vector id as stored in the index
    pub id: String,
    pub score: f32,
    pub metadata: SchemeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedScheme {
    pub id: String,
    pub llm_score: u8,
    pub pinecone_score: f32,
    pub metadata: SchemeMetadata,
}

impl RankedScheme {
    pub fn from_candidate(candidate: SchemeCandidate, llm_score: u8) -> Self {
        Self {
            id: candidate.id,
            llm_score: llm_score.min(100),
            pinecone_score: candidate.score,
            metadata: candidate.metadata,
        }
    }

    pub fn scheme_id(&self) -> &str {
        &self.metadata.scheme_id
    }

    pub fn to_record(&self) -> RecommendedScheme {
        RecommendedScheme {
            scheme_id: self.metadata.scheme_id.clone(),
            scheme_name: self.metadata.scheme_name.clone(),
            brief_description: self.metadata.brief_description.clone(),
            eligibility_criteria: self.metadata.eligibility_criteria.clone(),
            state: self.metadata.state.clone(),
            tags: self.metadata.tags.clone(),
            category: self.metadata.category.clone(),
            llm_score: self.llm_score,
            pinecone_score: self.pinecone_score,
        }
    }
}

/// Flat record written to the ranked-list hand-off file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedScheme {
    #[serde(default)]
    pub scheme_id: String,
    #[serde(default)]
    pub scheme_name: String,
    #[serde(default)]
    pub brief_description: String,
    #[serde(default)]
    pub eligibility_criteria: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub llm_score: u8,
    #[serde(default)]
    pub pinecone_score: f32,
}

impl From<RecommendedScheme> for RankedScheme {
    fn from(record: RecommendedScheme) -> Self {
        RankedScheme {
            id: record.scheme_id.clone(),
            llm_score: record.llm_score.min(100),
            pinecone_score: record.pinecone_score,
            metadata: SchemeMetadata {
                scheme_id: record.scheme_id,
                scheme_name: record.scheme_name,
                brief_description: record.brief_description,
                eligibility_criteria: record.eligibility_criteria,
                state: record.state,
                tags: record.tags,
                category: record.category,
            },
        }
    }
}

//
// ================= Detail =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemeDetail {
    pub scheme_name: String,
    pub detailed_description: String,
    pub eligibility_criteria: String,
    pub application_process: String,
    pub documents_required: String,
}

impl SchemeDetail {
    /// Build from nullable catalog columns; null or blank becomes "Not available"
    pub fn from_columns(
        scheme_name: Option<String>,
        detailed_description: Option<String>,
        eligibility_criteria: Option<String>,
        application_process: Option<String>,
        documents_required: Option<String>,
    ) -> Self {
        fn or_placeholder(value: Option<String>) -> String {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }

        Self {
            scheme_name: or_placeholder(scheme_name),
            detailed_description: or_placeholder(detailed_description),
            eligibility_criteria: or_placeholder(eligibility_criteria),
            application_process: or_placeholder(application_process),
            documents_required: or_placeholder(documents_required),
        }
    }

    /// Labelled text block handed to grounded generation
    pub fn as_prompt_block(&self) -> String {
        format!(
            "Scheme Name: {}\nDetailed Description: {}\nEligibility Criteria: {}\nApplication Process: {}\nDocuments Required: {}",
            self.scheme_name,
            self.detailed_description,
            self.eligibility_criteria,
            self.application_process,
            self.documents_required,
        )
    }
}

//
// ================= Chat surface =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    None,
    ShowSchemes,
    ShowDetails,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub action: ChatAction,
    pub details: Option<SchemeDetail>,
}

impl ChatReply {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            action: ChatAction::None,
            details: None,
        }
    }

    pub fn with_action(response: impl Into<String>, action: ChatAction) -> Self {
        Self {
            response: response.into(),
            action,
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_profile() -> UserProfile {
        UserProfile {
            name: Some("Priya".into()),
            state: Some("Tamil Nadu".into()),
            gender: Some("Female".into()),
            caste: Some("SC".into()),
            occupation: Some("Weaver".into()),
            category: Some("SC".into()),
            income: Some("90000".into()),
            additional_details: None,
        }
    }

    #[test]
    fn test_validate_names_missing_fields() {
        let mut profile = complete_profile();
        profile.caste = Some("  ".into());
        profile.income = None;

        let err = profile.validate().unwrap_err();
        match err {
            crate::error::SchemeError::Validation { missing } => {
                assert_eq!(missing, vec!["caste".to_string(), "income".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(complete_profile().validate().is_ok());
    }

    #[test]
    fn test_merge_fragment_ignores_empty_values() {
        let mut profile = UserProfile {
            state: Some("Kerala".into()),
            ..Default::default()
        };
        let fragment = json!({
            "name": "Ravi",
            "state": "",
            "income": 50000,
            "caste": null,
            "favourite_colour": "blue"
        });

        let changed = profile.merge_fragment(fragment.as_object().unwrap());

        assert_eq!(changed, 2);
        assert_eq!(profile.name.as_deref(), Some("Ravi"));
        assert_eq!(profile.state.as_deref(), Some("Kerala"));
        assert_eq!(profile.income.as_deref(), Some("50000"));
        assert_eq!(profile.caste, None);
    }

    #[test]
    fn test_append_details_joins_with_commas() {
        let mut profile = UserProfile::default();
        profile.append_details("owns 2 acres");
        profile.append_details("  ");
        profile.append_details("widow");
        assert_eq!(
            profile.additional_details.as_deref(),
            Some("owns 2 acres, widow")
        );
    }

    #[test]
    fn test_resolved_caste_prefers_given_caste() {
        let mut profile = UserProfile {
            category: Some("OBC".into()),
            ..Default::default()
        };
        assert_eq!(profile.resolved_caste(), Some("OBC"));

        profile.caste = Some(String::new());
        assert_eq!(profile.resolved_caste(), Some(""));
    }

    #[test]
    fn test_detail_placeholders() {
        let detail = SchemeDetail::from_columns(
            Some("Rythu Bandhu".into()),
            None,
            Some("".into()),
            Some("Apply at the Mandal office".into()),
            None,
        );
        assert_eq!(detail.scheme_name, "Rythu Bandhu");
        assert_eq!(detail.detailed_description, NOT_AVAILABLE);
        assert_eq!(detail.eligibility_criteria, NOT_AVAILABLE);
        assert!(detail.as_prompt_block().contains("Application Process: Apply at the Mandal office"));
    }

    #[test]
    fn test_chat_action_wire_names() {
        let reply = ChatReply::with_action("ok", ChatAction::ShowSchemes);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["action"], "show_schemes");
        assert!(json["details"].is_null());
    }
}
