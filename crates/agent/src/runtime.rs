//! One classify → act → respond cycle per query.
//!
//! [`AgentRuntime::handle`] walks a turn through
//! `Start → Classified → Dispatched → Synthesized → Appended → Done`, or ends
//! it in `Failed` with a fixed assistant reply. Either way the transcript gains
//! the user query plus exactly one assistant message, and the caller receives
//! that delta.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gamedex_core::config::OrchestratorConfig;
use gamedex_core::domain::intent::{IntentAction, IntentDecision};
use gamedex_core::domain::message::Message;
use gamedex_core::errors::FailureKind;
use gamedex_core::tooling::NO_DOCUMENTATION_FOUND;
use gamedex_core::transcript::Transcript;
use serde::Serialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{ClassificationError, IntentClassifier};
use crate::llm::{CompletionRequest, LlmClient};
use crate::retrieval::Retriever;
use crate::tools::{ToolInvoker, GET_DOCS_TOOL, NO_RESULT, SEARCH_GAME_INFO_TOOL};

pub const DEFAULT_SESSION: &str = "default";

pub const CLASSIFICATION_APOLOGY: &str = "❌ Sorry, I couldn't understand your request.";
pub const GENERIC_FAILURE: &str = "❌ Something went wrong.";
pub const DOCUMENTATION_UNAVAILABLE: &str =
    "❌ Sorry, I couldn't find documentation for that request.";

pub const NO_TOOL_INFO: &str = "No IGDB info found.";
pub const NO_RETRIEVED_CONTEXT: &str = "No additional info.";

const GAME_DIRECTIVE: &str =
    "Use the info below to answer user's game question. Combine both IGDB and game database context.";
const DOCS_DIRECTIVE: &str = "Use the documentation excerpt below to answer the user's programming question. Prefer the APIs it names and say so when it does not cover the question.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Start,
    Classified,
    Dispatched,
    Synthesized,
    Appended,
    Done,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub correlation_id: String,
    /// Messages appended to the transcript by this turn, oldest first.
    pub messages: Vec<Message>,
    pub state: TurnState,
    pub failure: Option<FailureKind>,
    /// Context sources that failed and were replaced by a sentinel.
    pub degraded: Vec<FailureKind>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub call_timeout: Duration,
    pub retrieval_top_k: u32,
    pub classifier_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub docs_context_chars: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(90),
            retrieval_top_k: 5,
            classifier_max_tokens: 150,
            answer_max_tokens: 700,
            chat_max_tokens: 500,
            docs_context_chars: 12_000,
        }
    }
}

impl From<&OrchestratorConfig> for RuntimeSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            retrieval_top_k: config.retrieval_top_k,
            classifier_max_tokens: config.classifier_max_tokens,
            answer_max_tokens: config.answer_max_tokens,
            chat_max_tokens: config.chat_max_tokens,
            docs_context_chars: config.docs_context_chars,
        }
    }
}

pub struct AgentRuntime {
    classifier: IntentClassifier,
    llm: Arc<dyn LlmClient>,
    retriever: Retriever,
    tools: ToolInvoker,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Retriever,
        tools: ToolInvoker,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone(), settings.classifier_max_tokens),
            llm,
            retriever,
            tools,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolInvoker {
        &self.tools
    }

    pub async fn handle(&self, query: &str, transcript: &mut Transcript) -> TurnOutcome {
        self.handle_in_session(DEFAULT_SESSION, query, transcript).await
    }

    pub async fn handle_in_session(
        &self,
        session_id: &str,
        query: &str,
        transcript: &mut Transcript,
    ) -> TurnOutcome {
        let mut turn = Turn::new(session_id);
        let start = transcript.len();
        info!(
            event_name = "turn.started",
            correlation_id = %turn.correlation_id,
            session_id,
            query_chars = query.chars().count(),
            "processing query"
        );

        transcript.append(Message::user(query));
        let result = self.run(&mut turn, query, transcript).await;

        let failure = match result {
            Ok(reply) => {
                transcript.append(Message::assistant(reply));
                turn.advance(TurnState::Appended);
                turn.advance(TurnState::Done);
                None
            }
            Err(failure) => {
                transcript.append(Message::assistant(failure.reply));
                turn.advance(TurnState::Failed);
                Some(failure.kind)
            }
        };

        info!(
            event_name = "turn.finished",
            correlation_id = %turn.correlation_id,
            session_id,
            failure = failure.map(|kind| kind.as_str()).unwrap_or("none"),
            degraded = turn.degraded.len(),
            "query processed"
        );

        TurnOutcome {
            correlation_id: turn.correlation_id,
            messages: transcript.messages()[start..].to_vec(),
            state: turn.state,
            failure,
            degraded: turn.degraded,
        }
    }

    async fn run(
        &self,
        turn: &mut Turn<'_>,
        query: &str,
        transcript: &Transcript,
    ) -> Result<String, Failure> {
        let decision = self.classify(turn, query).await?;
        turn.advance(TurnState::Classified);

        let reply = match decision.action {
            IntentAction::GameInfo { game_name } => {
                self.answer_game_question(turn, query, &game_name, transcript).await?
            }
            IntentAction::GetDocs { query: docs_query, library } => {
                self.answer_docs_question(turn, query, &docs_query, library.as_deref(), transcript)
                    .await?
            }
            IntentAction::General => {
                turn.advance(TurnState::Dispatched);
                let messages = transcript.messages().to_vec();
                self.synthesize(turn, messages, self.settings.chat_max_tokens).await?
            }
        };

        turn.advance(TurnState::Synthesized);
        Ok(reply)
    }

    async fn classify(&self, turn: &Turn<'_>, query: &str) -> Result<IntentDecision, Failure> {
        match bounded(self.settings.call_timeout, self.classifier.classify(query)).await {
            Ok(decision) => Ok(decision),
            Err(CallError::Failed(ClassificationError::Unparseable { .. })) => {
                Err(Failure { kind: FailureKind::ClassificationFailed, reply: CLASSIFICATION_APOLOGY })
            }
            Err(other) => {
                error!(
                    event_name = "turn.classification.failed",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    error = %other,
                    "classification call failed"
                );
                Err(Failure { kind: FailureKind::ModelUnavailable, reply: GENERIC_FAILURE })
            }
        }
    }

    async fn answer_game_question(
        &self,
        turn: &mut Turn<'_>,
        query: &str,
        game_name: &str,
        transcript: &Transcript,
    ) -> Result<String, Failure> {
        let limit = self.settings.call_timeout;
        let args = json!({ "game_name": game_name });

        let (tool_result, retrieval_result) = tokio::join!(
            bounded(limit, self.tools.invoke(SEARCH_GAME_INFO_TOOL, args)),
            bounded(limit, self.retriever.retrieve(query, self.settings.retrieval_top_k)),
        );
        turn.advance(TurnState::Dispatched);

        let tool_text = match tool_result {
            Ok(text) if text != NO_RESULT => text,
            Ok(_) => {
                warn!(
                    event_name = "turn.tool.empty",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    tool = SEARCH_GAME_INFO_TOOL,
                    game_name,
                    "game lookup returned no content, continuing without it"
                );
                turn.degraded.push(FailureKind::ToolInvocationFailed);
                NO_TOOL_INFO.to_string()
            }
            Err(error) => {
                warn!(
                    event_name = "turn.tool.failed",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    tool = SEARCH_GAME_INFO_TOOL,
                    game_name,
                    error = %error,
                    "game lookup failed, continuing without it"
                );
                turn.degraded.push(FailureKind::ToolInvocationFailed);
                NO_TOOL_INFO.to_string()
            }
        };

        let context = match retrieval_result {
            Ok(context) => {
                debug!(
                    event_name = "turn.retrieval.completed",
                    correlation_id = %turn.correlation_id,
                    passages = context.len(),
                    "retrieval finished"
                );
                context.render_or(NO_RETRIEVED_CONTEXT)
            }
            Err(error) => {
                warn!(
                    event_name = "turn.retrieval.failed",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    error = %error,
                    "retrieval failed, continuing without it"
                );
                turn.degraded.push(FailureKind::RetrievalFailed);
                NO_RETRIEVED_CONTEXT.to_string()
            }
        };

        let mut messages = transcript.messages().to_vec();
        messages.push(Message::system(GAME_DIRECTIVE));
        messages.push(Message::user(format!(
            "IGDB Info:\n{tool_text}\n\nOther Context:\n{context}\n\nQuestion: {query}"
        )));

        self.synthesize(turn, messages, self.settings.answer_max_tokens).await
    }

    async fn answer_docs_question(
        &self,
        turn: &mut Turn<'_>,
        query: &str,
        docs_query: &str,
        library: Option<&str>,
        transcript: &Transcript,
    ) -> Result<String, Failure> {
        let Some(library) = library else {
            warn!(
                event_name = "turn.docs.missing_library",
                correlation_id = %turn.correlation_id,
                session_id = turn.session_id,
                docs_query,
                "documentation request named no library"
            );
            return Err(Failure::documentation_unavailable());
        };

        let args = json!({ "query": docs_query, "library": library });
        let docs = match bounded(self.settings.call_timeout, self.tools.invoke(GET_DOCS_TOOL, args))
            .await
        {
            Ok(docs) => docs,
            Err(error) => {
                warn!(
                    event_name = "turn.tool.failed",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    tool = GET_DOCS_TOOL,
                    library,
                    docs_query,
                    error = %error,
                    "documentation lookup failed"
                );
                return Err(Failure::documentation_unavailable());
            }
        };
        turn.advance(TurnState::Dispatched);

        let docs = docs.trim();
        if docs.is_empty() || docs == NO_DOCUMENTATION_FOUND || docs == NO_RESULT {
            warn!(
                event_name = "turn.docs.empty",
                correlation_id = %turn.correlation_id,
                session_id = turn.session_id,
                library,
                docs_query,
                "documentation lookup returned nothing"
            );
            return Err(Failure::documentation_unavailable());
        }

        let excerpt = truncate_chars(docs, self.settings.docs_context_chars);
        let mut messages = transcript.messages().to_vec();
        messages.push(Message::system(DOCS_DIRECTIVE));
        messages.push(Message::user(format!(
            "Documentation ({library}):\n{excerpt}\n\nQuestion: {query}"
        )));

        self.synthesize(turn, messages, self.settings.answer_max_tokens).await
    }

    async fn synthesize(
        &self,
        turn: &Turn<'_>,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> Result<String, Failure> {
        let request = CompletionRequest::new(messages, max_tokens);
        match bounded(self.settings.call_timeout, self.llm.complete(request)).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                error!(
                    event_name = "turn.synthesis.failed",
                    correlation_id = %turn.correlation_id,
                    session_id = turn.session_id,
                    error = %error,
                    "answer synthesis failed"
                );
                Err(Failure { kind: FailureKind::SynthesisFailed, reply: GENERIC_FAILURE })
            }
        }
    }
}

struct Turn<'a> {
    correlation_id: String,
    session_id: &'a str,
    state: TurnState,
    degraded: Vec<FailureKind>,
}

impl<'a> Turn<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            session_id,
            state: TurnState::Start,
            degraded: Vec::new(),
        }
    }

    fn advance(&mut self, next: TurnState) {
        debug!(
            event_name = "turn.state",
            correlation_id = %self.correlation_id,
            session_id = self.session_id,
            from = ?self.state,
            to = ?next,
            "turn state changed"
        );
        self.state = next;
    }
}

struct Failure {
    kind: FailureKind,
    reply: &'static str,
}

impl Failure {
    fn documentation_unavailable() -> Self {
        Self { kind: FailureKind::DocumentationUnavailable, reply: DOCUMENTATION_UNAVAILABLE }
    }
}

enum CallError<E> {
    TimedOut(Duration),
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(limit) => write!(formatter, "timed out after {}ms", limit.as_millis()),
            Self::Failed(error) => error.fmt(formatter),
        }
    }
}

async fn bounded<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, CallError<E>> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(CallError::Failed(error)),
        Err(_) => Err(CallError::TimedOut(limit)),
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
