//! Scheme assistant - the per-session conversation loop
//!
//! PROFILE → SEARCH → LIST → DETAIL ⇄ FOLLOW-UP → EXIT
//!
//! Owns the shared collaborators (model, embedder, index, detail store) and
//! routes each message to whatever phase its session is in.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::DetailStore;
use crate::disclosure::{DisclosureAgent, DisclosureSettings, Turn, TurnEvent, FAREWELL};
use crate::embedding::Embedder;
use crate::llm::LanguageModel;
use crate::models::{ChatAction, ChatReply, RankedScheme, RecommendedScheme, UserProfile};
use crate::profile::{ProfileCollector, ProfileStage, ProfileTurn};
use crate::search::{ArtifactStore, SchemeSearch, SearchSettings};
use crate::session::{ChatSession, SessionManager, SessionPhase};
use crate::vector::VectorIndex;
use crate::Result;

/// Attempts per grounded turn before apologizing
const MAX_ATTEMPTS: u32 = 2;

pub const EMPTY_MESSAGE: &str = "Please provide a message.";
pub const PROFILE_FIRST: &str = "Please submit your profile first.";
pub const APOLOGY: &str = "Sorry, something went wrong on my side. Please try that again in a moment.";
pub const NO_SCHEMES: &str = "Sorry, I couldn't find any valid schemes matching your profile right now. Try again later or with different details.";
const BAD_SCHEME_NUMBER: &str = "Please specify a valid scheme number (e.g., 'show scheme 3').";

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub search: SearchSettings,
    pub disclosure: DisclosureSettings,
    pub artifact_root: PathBuf,
    pub session_idle: Duration,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            disclosure: DisclosureSettings::default(),
            artifact_root: PathBuf::from("data"),
            session_idle: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub session_id: String,
    pub schemes: Vec<RecommendedScheme>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: ChatReply,
}

/// Browsing commands recognised ahead of the disclosure agent
enum Command {
    ShowSchemes,
    ShowScheme(Option<i64>),
    Other,
}

fn parse_command(message: &str) -> Command {
    let lowered = message.trim().to_lowercase();
    if lowered == "show schemes" {
        Command::ShowSchemes
    } else if let Some(rest) = lowered.strip_prefix("show scheme") {
        Command::ShowScheme(rest.split_whitespace().last().and_then(|n| n.parse().ok()))
    } else {
        Command::Other
    }
}

fn to_reply(turn: Turn) -> ChatReply {
    match turn.event {
        TurnEvent::None => ChatReply::text(turn.reply),
        TurnEvent::ListShown => ChatReply::with_action(turn.reply, ChatAction::ShowSchemes),
        TurnEvent::DetailShown(detail) => ChatReply {
            response: turn.reply,
            action: ChatAction::ShowDetails,
            details: Some(detail),
        },
        TurnEvent::Exited => ChatReply::with_action(turn.reply, ChatAction::Exit),
    }
}

/// Run one agent turn, retrying a failed generation once
async fn agent_turn(agent: &mut DisclosureAgent, message: &str, select: Option<i64>) -> Option<Turn> {
    for attempt in 1..=MAX_ATTEMPTS {
        let result = match select {
            Some(n) => agent.select(n, message.trim()).await,
            None => agent.handle_input(message).await,
        };
        match result {
            Ok(turn) => return Some(turn),
            Err(e) => warn!(attempt, "Disclosure turn failed: {}", e),
        }
    }
    None
}

async fn profile_turn(collector: &mut ProfileCollector, message: &str) -> Option<ProfileTurn> {
    for attempt in 1..=MAX_ATTEMPTS {
        match collector.handle_input(message).await {
            Ok(turn) => return Some(turn),
            Err(e) => warn!(attempt, "Profile turn failed: {}", e),
        }
    }
    None
}

pub struct SchemeAssistant {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DetailStore>,
    search: SchemeSearch,
    sessions: Arc<SessionManager>,
    settings: AssistantSettings,
}

impl SchemeAssistant {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DetailStore>,
        settings: AssistantSettings,
    ) -> Self {
        let search = SchemeSearch::new(model.clone(), embedder, index, settings.search.clone());
        Self {
            model,
            store,
            search,
            sessions: Arc::new(SessionManager::new(settings.session_idle)),
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    fn new_session(&self, id: String) -> ChatSession {
        ChatSession::new(
            id,
            ProfileCollector::new(self.model.clone(), self.settings.search.llm_timeout),
        )
    }

    fn artifacts(&self, session_id: &str) -> ArtifactStore {
        ArtifactStore::for_session(&self.settings.artifact_root, session_id)
    }

    /// Search for `profile` and move the session to browsing (or back to
    /// profiling when nothing matched). Returns the ranked list.
    async fn recommend(&self, session: &mut ChatSession, profile: UserProfile) -> Result<Vec<RankedScheme>> {
        let artifacts = self.artifacts(&session.session_id);
        let ranked = self.search.search_and_persist(&profile, &artifacts).await?;
        session.profile = Some(profile);
        session.schemes = ranked.clone();

        if ranked.is_empty() {
            warn!(session_id = %session.session_id, "No schemes found for profile");
            session.phase = SessionPhase::Profiling(ProfileCollector::new(
                self.model.clone(),
                self.settings.search.llm_timeout,
            ));
            return Ok(ranked);
        }

        match DisclosureAgent::new(
            ranked.clone(),
            self.model.clone(),
            self.store.clone(),
            self.settings.disclosure.clone(),
        ) {
            Ok(agent) => {
                info!(session_id = %session.session_id, count = ranked.len(), "Recommendations ready");
                session.phase = SessionPhase::Browsing(agent);
                Ok(ranked)
            }
            Err(e) => {
                warn!("No displayable schemes: {}", e);
                session.schemes.clear();
                session.phase = SessionPhase::Profiling(ProfileCollector::new(
                    self.model.clone(),
                    self.settings.search.llm_timeout,
                ));
                Ok(Vec::new())
            }
        }
    }

    /// Validate, persist and search a form-submitted profile
    pub async fn submit_profile(&self, session_id: Option<&str>, profile: UserProfile) -> Result<SubmitOutcome> {
        profile.validate()?;

        let (id, handle) = self
            .sessions
            .get_or_create(session_id, |id| self.new_session(id))
            .await;
        let mut session = handle.lock().await;
        session.touch();

        let ranked = self.recommend(&mut session, profile).await?;
        let message = if ranked.is_empty() {
            NO_SCHEMES.to_string()
        } else {
            format!("Great news! I found {} schemes that might work for you.", ranked.len())
        };

        Ok(SubmitOutcome {
            session_id: id,
            schemes: ranked.iter().map(RankedScheme::to_record).collect(),
            message,
        })
    }

    /// One chat message for a session; unknown or absent ids start a new one
    pub async fn chat(&self, session_id: Option<&str>, message: &str) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            let id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
                Some(id) => id.to_string(),
                None => Uuid::new_v4().to_string(),
            };
            return Ok(ChatOutcome {
                session_id: id,
                reply: ChatReply::text(EMPTY_MESSAGE),
            });
        }

        let (id, handle) = self
            .sessions
            .get_or_create(session_id, |id| self.new_session(id))
            .await;

        let mut session = handle.lock().await;
        session.touch();

        let reply = match &mut session.phase {
            SessionPhase::Closed => ChatReply::with_action(FAREWELL, ChatAction::Exit),
            SessionPhase::Profiling(collector) => {
                let retrying = collector.stage() == ProfileStage::Complete;
                if !retrying && !matches!(parse_command(message), Command::Other) {
                    ChatReply::text(PROFILE_FIRST)
                } else {
                    match profile_turn(collector, message).await {
                        None => ChatReply::text(APOLOGY),
                        Some(turn) if turn.completed => {
                            let profile = collector.profile().clone();
                            self.finish_profile(&mut session, profile, turn.reply).await
                        }
                        Some(turn) => ChatReply::text(turn.reply),
                    }
                }
            }
            SessionPhase::Browsing(agent) => {
                let turn = match parse_command(message) {
                    Command::ShowSchemes => Some(agent.show_list("")),
                    Command::ShowScheme(None) => Some(Turn {
                        reply: BAD_SCHEME_NUMBER.to_string(),
                        event: TurnEvent::None,
                    }),
                    Command::ShowScheme(Some(n)) => agent_turn(agent, message, Some(n)).await,
                    Command::Other => agent_turn(agent, message, None).await,
                };

                match turn {
                    Some(turn) => {
                        let exited = turn.event == TurnEvent::Exited;
                        let reply = to_reply(turn);
                        if exited {
                            session.phase = SessionPhase::Closed;
                            session.schemes.clear();
                        }
                        reply
                    }
                    None => ChatReply::text(APOLOGY),
                }
            }
        };

        Ok(ChatOutcome {
            session_id: id,
            reply,
        })
    }

    async fn finish_profile(&self, session: &mut ChatSession, profile: UserProfile, lead: String) -> ChatReply {
        if let Err(e) = profile.validate() {
            error!("Collected profile is incomplete: {}", e);
            return ChatReply::text(APOLOGY);
        }

        match self.recommend(session, profile).await {
            Ok(ranked) if ranked.is_empty() => ChatReply::text(format!("{}\n\n{}", lead, NO_SCHEMES)),
            Ok(ranked) => {
                let list = match &session.phase {
                    SessionPhase::Browsing(agent) => agent.render_list(),
                    _ => String::new(),
                };
                ChatReply::with_action(
                    format!(
                        "{}\n\nGreat news! I found {} schemes that might work for you.\n\n{}",
                        lead,
                        ranked.len(),
                        list
                    ),
                    ChatAction::ShowSchemes,
                )
            }
            Err(e) => {
                error!("Recommendation failed: {}", e);
                ChatReply::text(APOLOGY)
            }
        }
    }

    /// Current ranked list of a session, if the session exists
    pub async fn schemes(&self, session_id: &str) -> Option<Vec<RecommendedScheme>> {
        let handle = self.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Some(session.schemes.iter().map(RankedScheme::to_record).collect())
    }
}
