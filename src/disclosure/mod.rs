//! Disclosure agent
//!
//! Walks the user through a ranked scheme list: pick a number to see grounded
//! details, ask follow-ups about eligibility, go back, or quit. Driven one
//! input at a time by [`DisclosureAgent::handle_input`]; the transport (console,
//! HTTP) lives elsewhere.
//!
//! ```text
//! Listing --N--> DetailSelected --back--> Listing
//!    |                 |
//!    +------quit-------+-----> Terminated
//! ```

pub mod prompt;

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::{fetch_detail, DetailStore};
use crate::error::{within, SchemeError};
use crate::llm::LanguageModel;
use crate::models::{RankedScheme, SchemeDetail};
use crate::search::synthesize_scheme_id;
use crate::transcript::Transcript;
use crate::Result;

use prompt::{grounded_prompt, CLARIFY_INPUT, FOLLOW_UP, SHOW_DETAILS_INPUT};

pub const FAREWELL: &str = "Goodbye! If you need help later, feel free to come back.";

const EXIT_WORDS: [&str; 2] = ["quit", "exit"];
const BACK_WORDS: [&str; 3] = ["back", "go back", "return"];
const ELIGIBILITY_WORDS: [&str; 3] = ["eligible", "eligibility", "caste"];

lazy_static! {
    // Whole words only, so "scheme" or "first" do not read as SC/ST
    static ref CATEGORY_CODE: Regex = Regex::new(r"\b(oc|sc|st|obc)\b").expect("static pattern");
}

fn asks_about_eligibility(input: &str) -> bool {
    ELIGIBILITY_WORDS.iter().any(|w| input.contains(w)) || CATEGORY_CODE.is_match(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureState {
    Listing,
    DetailSelected,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// 1-based position in the list
    pub number: usize,
    pub scheme_id: String,
    pub detail: SchemeDetail,
}

/// What a turn did, for callers that surface actions
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    None,
    ListShown,
    DetailShown(SchemeDetail),
    Exited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub reply: String,
    pub event: TurnEvent,
}

impl Turn {
    fn say(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            event: TurnEvent::None,
        }
    }

    fn farewell() -> Self {
        Self {
            reply: FAREWELL.to_string(),
            event: TurnEvent::Exited,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisclosureSettings {
    pub llm_timeout: Duration,
    pub detail_timeout: Duration,
}

impl Default for DisclosureSettings {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(60),
            detail_timeout: Duration::from_secs(5),
        }
    }
}

pub struct DisclosureAgent {
    schemes: Vec<RankedScheme>,
    state: DisclosureState,
    selection: Option<Selection>,
    transcript: Transcript,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DetailStore>,
    settings: DisclosureSettings,
}

impl DisclosureAgent {
    /// Nameless schemes are dropped and missing identifiers synthesized.
    /// Fails when nothing displayable remains.
    pub fn new(
        schemes: Vec<RankedScheme>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn DetailStore>,
        settings: DisclosureSettings,
    ) -> Result<Self> {
        let schemes: Vec<RankedScheme> = schemes
            .into_iter()
            .filter(|s| s.metadata.has_name())
            .map(|mut s| {
                if s.metadata.scheme_id.trim().is_empty() {
                    s.metadata.scheme_id =
                        synthesize_scheme_id(&s.metadata.scheme_name, &s.metadata.state);
                }
                s
            })
            .collect();

        if schemes.is_empty() {
            return Err(SchemeError::NotFound(
                "no valid schemes provided with required metadata".to_string(),
            ));
        }

        info!(count = schemes.len(), "Disclosure agent ready");
        Ok(Self {
            schemes,
            state: DisclosureState::Listing,
            selection: None,
            transcript: Transcript::new(),
            model,
            store,
            settings,
        })
    }

    pub fn state(&self) -> DisclosureState {
        self.state
    }

    pub fn schemes(&self) -> &[RankedScheme] {
        &self.schemes
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn render_list(&self) -> String {
        let mut out = String::from("Here are the recommended schemes I found for you:\n");
        for (i, s) in self.schemes.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, s.metadata.scheme_name));
            out.push_str(&format!("   Brief Description: {}\n", s.metadata.brief_description));
            out.push_str(&format!("   State: {}\n\n", s.metadata.state));
        }
        out.push_str(
            "Which scheme would you like to learn more about? Please enter its number, or you can say 'quit' to exit.",
        );
        out
    }

    /// Leave any selected scheme and show the list again
    pub fn show_list(&mut self, preface: &str) -> Turn {
        if self.state == DisclosureState::Terminated {
            return Turn::farewell();
        }
        self.selection = None;
        self.state = DisclosureState::Listing;
        Turn {
            reply: format!("{}{}", preface, self.render_list()),
            event: TurnEvent::ListShown,
        }
    }

    async fn grounded(&self, input: &str, detail: &SchemeDetail) -> Result<String> {
        let prompt = grounded_prompt(&self.transcript.formatted(), input, detail);
        let reply = within("grounded generation", self.settings.llm_timeout, self.model.invoke(&prompt)).await?;
        Ok(reply.trim().to_string())
    }

    /// Select scheme `number` (1-based) and render its details
    pub async fn select(&mut self, number: i64, said: &str) -> Result<Turn> {
        if self.state == DisclosureState::Terminated {
            return Ok(Turn::farewell());
        }
        let len = self.schemes.len();
        let index = match usize::try_from(number) {
            Ok(n) if (1..=len).contains(&n) => n - 1,
            _ => {
                return Ok(Turn::say(format!(
                    "Hmm, please enter a number between 1 and {}.\n\n{}",
                    len,
                    self.render_list()
                )))
            }
        };

        let scheme_id = self.schemes[index].metadata.scheme_id.clone();
        debug!(number = index + 1, scheme_id = %scheme_id, "Scheme selected");
        let Some(detail) = fetch_detail(self.store.as_ref(), &scheme_id, self.settings.detail_timeout).await
        else {
            return Ok(Turn::say(format!(
                "Sorry, I couldn't find more details for scheme ID '{}' in the database.\n\nLet's try another one. {}",
                scheme_id,
                self.render_list()
            )));
        };

        let reply = self.grounded(SHOW_DETAILS_INPUT, &detail).await?;

        self.transcript.record_exchange(said, &reply);
        self.selection = Some(Selection {
            number: index + 1,
            scheme_id,
            detail: detail.clone(),
        });
        self.state = DisclosureState::DetailSelected;
        Ok(Turn {
            reply,
            event: TurnEvent::DetailShown(detail),
        })
    }

    /// Advance the machine by one user input. Only a failed grounded
    /// generation is an error, and it leaves the state untouched.
    pub async fn handle_input(&mut self, raw: &str) -> Result<Turn> {
        let input = raw.trim().to_lowercase();

        match self.state {
            DisclosureState::Terminated => Ok(Turn::farewell()),
            _ if EXIT_WORDS.contains(&input.as_str()) => {
                self.state = DisclosureState::Terminated;
                self.selection = None;
                info!("Disclosure conversation ended");
                Ok(Turn::farewell())
            }
            DisclosureState::Listing => match input.parse::<i64>() {
                Ok(number) => self.select(number, &input).await,
                Err(_) => Ok(Turn::say(format!(
                    "I didn't understand that. Please enter the number of the scheme you'd like to learn more about, or say 'quit' to exit.\n\n{}",
                    self.render_list()
                ))),
            },
            DisclosureState::DetailSelected => {
                if BACK_WORDS.contains(&input.as_str()) {
                    return Ok(self.show_list("Sure, let's go back to the scheme list.\n\n"));
                }

                let prompt_input = if asks_about_eligibility(&input) {
                    input.as_str()
                } else if input == "tell me" {
                    CLARIFY_INPUT
                } else {
                    return Ok(Turn::say(format!("I'm not sure what you'd like to do. {}", FOLLOW_UP)));
                };

                let Some(detail) = self.selection.as_ref().map(|s| s.detail.clone()) else {
                    return Ok(self.show_list(""));
                };
                let reply = self.grounded(prompt_input, &detail).await?;
                self.transcript.record_exchange(&input, &reply);
                Ok(Turn::say(reply))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryDetailStore;
    use crate::llm::ScriptedModel;
    use crate::models::SchemeMetadata;

    fn scheme(id: &str, name: &str) -> RankedScheme {
        RankedScheme {
            id: id.to_string(),
            llm_score: 80,
            pinecone_score: 0.7,
            metadata: SchemeMetadata {
                scheme_id: id.to_string(),
                scheme_name: name.to_string(),
                brief_description: format!("About {}", name),
                state: "Odisha".into(),
                ..Default::default()
            },
        }
    }

    fn five() -> Vec<RankedScheme> {
        (1..=5).map(|i| scheme(&format!("OD-{}", i), &format!("Scheme {}", i))).collect()
    }

    fn detail(name: &str) -> SchemeDetail {
        SchemeDetail::from_columns(
            Some(name.into()),
            Some("Support".into()),
            Some("SC and ST households".into()),
            None,
            None,
        )
    }

    fn agent_with(
        schemes: Vec<RankedScheme>,
        model: Arc<ScriptedModel>,
        store: Arc<InMemoryDetailStore>,
    ) -> DisclosureAgent {
        DisclosureAgent::new(schemes, model, store, DisclosureSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_quit_terminates_and_stays_terminated() {
        let model = Arc::new(ScriptedModel::failing());
        let mut agent = agent_with(five(), model.clone(), Arc::new(InMemoryDetailStore::new()));

        let turn = agent.handle_input("  QUIT ").await.unwrap();
        assert_eq!(turn.reply, FAREWELL);
        assert_eq!(turn.event, TurnEvent::Exited);
        assert_eq!(agent.state(), DisclosureState::Terminated);

        for later in ["1", "back", "hello"] {
            assert_eq!(agent.handle_input(later).await.unwrap().reply, FAREWELL);
            assert_eq!(agent.state(), DisclosureState::Terminated);
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_number_selects_with_one_lookup() {
        let store = Arc::new(InMemoryDetailStore::new().with_detail("OD-3", detail("Scheme 3")));
        let model = Arc::new(ScriptedModel::new(["**Scheme 3**\n- Support"]));
        let mut agent = agent_with(five(), model.clone(), store.clone());

        let turn = agent.handle_input("3").await.unwrap();

        assert_eq!(agent.state(), DisclosureState::DetailSelected);
        assert_eq!(store.lookups(), vec!["OD-3".to_string()]);
        assert_eq!(turn.event, TurnEvent::DetailShown(detail("Scheme 3")));
        assert_eq!(agent.selection().map(|s| s.number), Some(3));
        assert!(model.prompts()[0].contains("User Input: Show the details of the selected scheme"));
        assert_eq!(agent.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_numbers() {
        let store = Arc::new(InMemoryDetailStore::new());
        let mut agent = agent_with(five(), Arc::new(ScriptedModel::failing()), store.clone());

        for input in ["0", "6", "-2"] {
            let turn = agent.handle_input(input).await.unwrap();
            assert!(turn.reply.starts_with("Hmm, please enter a number between 1 and 5."));
            assert!(turn.reply.contains("5. Scheme 5"));
            assert_eq!(agent.state(), DisclosureState::Listing);
        }
        assert!(store.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_non_number_in_listing() {
        let mut agent = agent_with(five(), Arc::new(ScriptedModel::failing()), Arc::new(InMemoryDetailStore::new()));
        let turn = agent.handle_input("the second one").await.unwrap();
        assert!(turn.reply.starts_with("I didn't understand that."));
        assert_eq!(agent.state(), DisclosureState::Listing);
    }

    #[tokio::test]
    async fn test_missing_detail_stays_in_listing() {
        let model = Arc::new(ScriptedModel::failing());
        let mut agent = agent_with(five(), model.clone(), Arc::new(InMemoryDetailStore::new()));

        let turn = agent.handle_input("2").await.unwrap();
        assert!(turn
            .reply
            .starts_with("Sorry, I couldn't find more details for scheme ID 'OD-2' in the database."));
        assert_eq!(agent.state(), DisclosureState::Listing);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_detail_state_dispatch() {
        let store = Arc::new(InMemoryDetailStore::new().with_detail("OD-1", detail("Scheme 1")));
        let model = Arc::new(ScriptedModel::new(["details", "Yes, SC households qualify.", "Eligibility summary"]));
        let mut agent = agent_with(five(), model.clone(), store);
        agent.handle_input("1").await.unwrap();

        let answer = agent.handle_input("Am I eligible as SC?").await.unwrap();
        assert_eq!(answer.reply, "Yes, SC households qualify.");
        assert!(model.prompts()[1].contains("User Input: am i eligible as sc?"));

        agent.handle_input("tell me").await.unwrap();
        assert!(model.prompts()[2].contains(CLARIFY_INPUT));

        let unclear = agent.handle_input("what about the weather").await.unwrap();
        assert!(unclear.reply.starts_with("I'm not sure what you'd like to do."));
        assert_eq!(model.calls(), 3);
        assert_eq!(agent.state(), DisclosureState::DetailSelected);

        let back = agent.handle_input("go back").await.unwrap();
        assert!(back.reply.starts_with("Sure, let's go back to the scheme list."));
        assert_eq!(back.event, TurnEvent::ListShown);
        assert_eq!(agent.state(), DisclosureState::Listing);
        assert!(agent.selection().is_none());
    }

    #[tokio::test]
    async fn test_category_codes_match_whole_words_only() {
        assert!(asks_about_eligibility("what if i am obc"));
        assert!(asks_about_eligibility("st category?"));
        assert!(!asks_about_eligibility("how do i register"));
        assert!(!asks_about_eligibility("documents list"));
        assert!(!asks_about_eligibility("how do i apply for this scheme"));
        assert!(asks_about_eligibility("which castes"));
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_state() {
        let store = Arc::new(InMemoryDetailStore::new().with_detail("OD-4", detail("Scheme 4")));
        let model = Arc::new(ScriptedModel::failing());
        let mut agent = agent_with(five(), model, store);

        assert!(agent.handle_input("4").await.is_err());
        assert_eq!(agent.state(), DisclosureState::Listing);
        assert!(agent.selection().is_none());
        assert!(agent.transcript().is_empty());
    }

    #[test]
    fn test_nameless_dropped_and_ids_synthesized() {
        let mut unnamed = scheme("X", "");
        unnamed.metadata.scheme_name = "  ".into();
        let mut no_id = scheme("", "Kalia");
        no_id.metadata.scheme_id.clear();

        let agent = agent_with(
            vec![unnamed, no_id],
            Arc::new(ScriptedModel::failing()),
            Arc::new(InMemoryDetailStore::new()),
        );
        assert_eq!(agent.schemes().len(), 1);
        assert_eq!(agent.schemes()[0].metadata.scheme_id, synthesize_scheme_id("Kalia", "Odisha"));
        assert!(!agent.render_list().contains("2."));

        assert!(DisclosureAgent::new(
            vec![scheme("Y", "")],
            Arc::new(ScriptedModel::failing()),
            Arc::new(InMemoryDetailStore::new()),
            DisclosureSettings::default(),
        )
        .is_err());
    }
}
