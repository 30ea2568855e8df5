//! Conversational profile intake
//!
//! Asks for the seven required fields one at a time through the language
//! model, then offers to record free-text extras before handing the profile
//! to the search pipeline.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::within;
use crate::llm::parse::{extract_json_object, strip_json_object};
use crate::llm::LanguageModel;
use crate::models::UserProfile;
use crate::transcript::Transcript;
use crate::Result;

pub const WELCOME: &str = "👋 Welcome to the Government Scheme Finder chatbot!\n\
Let's get to know you. You can say something like: 'I'm Priya from Tamil Nadu, my income is under 1 lakh.'";

const ACK: &str = "Got it! ✅";
const ASK_EXTRAS: &str = "Thanks! I've collected everything I need for the basic recommendation.\n\
Would you like to add any additional details (like education, land, family background, etc.)? (yes/no)";
const START_EXTRAS: &str =
    "Great! Go ahead and tell me more. You can add as much as you want, and say 'no' when done.";
const MORE_EXTRAS: &str = "Got it! ✅ You can add more, or say 'no' to finish.";
const ASK_YES_NO: &str = "Please say 'yes' or 'no' (or something like 'not' or 'I don't want to') to let me know if you want to add more details.";
pub const DONE: &str = "You're a star! I've got all I need to find you awesome schemes!";

const YES_WORDS: [&str; 3] = ["yes", "y", "sure"];
const NO_WORDS: [&str; 6] = ["no", "nah", "nope", "not", "dont want", "i dont want to"];

fn is_no(input: &str) -> bool {
    let normalized = input.replace(['\'', '’'], "");
    NO_WORDS.contains(&normalized.as_str())
}

fn collection_prompt(history: &str, input: &str) -> String {
    format!(
        r#"You're a friendly chatbot helping collect user details for government scheme recommendations.

Instructions:
- Ask questions one by one conversationally to collect: name, state, gender, caste, occupation, category (like SC/ST/OBC), income.
- Be warm and friendly.
- At the end, respond with a JSON like:
{{
    "name": "...",
    "state": "...",
    "gender": "...",
    "caste": "...",
    "occupation": "...",
    "category": "...",
    "income": "...",
    "additional_details": "..."
}}
  (additional_details is optional)

Conversation so far:
{history}
User: {input}
Bot:
"#,
        history = history,
        input = input,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStage {
    Collecting,
    ConfirmingExtras,
    AddingExtras,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTurn {
    pub reply: String,
    /// True on the turn the profile became final
    pub completed: bool,
}

impl ProfileTurn {
    fn say(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            completed: false,
        }
    }
}

pub struct ProfileCollector {
    profile: UserProfile,
    stage: ProfileStage,
    transcript: Transcript,
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ProfileCollector {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            profile: UserProfile::default(),
            stage: ProfileStage::Collecting,
            transcript: Transcript::new(),
            model,
            timeout,
        }
    }

    pub fn stage(&self) -> ProfileStage {
        self.stage
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn into_profile(self) -> UserProfile {
        self.profile
    }

    /// One user turn. A model failure while collecting is returned as-is
    /// and changes nothing.
    pub async fn handle_input(&mut self, raw: &str) -> Result<ProfileTurn> {
        let text = raw.trim();
        let lowered = text.to_lowercase();

        match self.stage {
            ProfileStage::Collecting => self.collect(text).await,
            ProfileStage::ConfirmingExtras => {
                if YES_WORDS.contains(&lowered.as_str()) {
                    self.stage = ProfileStage::AddingExtras;
                    Ok(ProfileTurn::say(START_EXTRAS))
                } else if is_no(&lowered) {
                    Ok(self.finish())
                } else {
                    Ok(ProfileTurn::say(ASK_YES_NO))
                }
            }
            ProfileStage::AddingExtras => {
                if is_no(&lowered) {
                    Ok(self.finish())
                } else {
                    self.profile.append_details(text);
                    Ok(ProfileTurn::say(MORE_EXTRAS))
                }
            }
            // Keeps reporting completion until the caller moves the session on
            ProfileStage::Complete => Ok(self.finish()),
        }
    }

    async fn collect(&mut self, input: &str) -> Result<ProfileTurn> {
        let prompt = collection_prompt(&self.transcript.formatted(), input);
        let reply = within("profile collection", self.timeout, self.model.invoke(&prompt)).await?;

        match extract_json_object(&reply) {
            Ok(fragment) => {
                let changed = self.profile.merge_fragment(&fragment);
                debug!(changed, "Merged profile fragment");
            }
            Err(e) => debug!("No profile fragment in reply: {}", e),
        }
        self.transcript.record_exchange(input, reply.trim());

        let shown = strip_json_object(&reply);
        let mut out = if shown.is_empty() { ACK.to_string() } else { shown };

        if self.profile.is_complete() {
            info!("All required profile fields collected");
            self.stage = ProfileStage::ConfirmingExtras;
            out.push_str("\n\n");
            out.push_str(ASK_EXTRAS);
        }
        Ok(ProfileTurn::say(out))
    }

    fn finish(&mut self) -> ProfileTurn {
        self.stage = ProfileStage::Complete;
        info!("Profile collection complete");
        ProfileTurn {
            reply: DONE.to_string(),
            completed: true,
        }
    }
}
