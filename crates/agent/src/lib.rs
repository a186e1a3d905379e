//! Agent runtime: classifies a query and orchestrates the answer.
//!
//! The runtime follows a constrained loop per query:
//! 1. **Classification** (`classifier`) - route the query to one intent
//! 2. **Dispatch** (`runtime`) - call the game lookup and the vector index in
//!    parallel, or the documentation tool, or nothing
//! 3. **Synthesis** (`llm`) - one completion over the gathered context
//!
//! Every collaborator sits behind a trait (`LlmClient`, `Embedder`,
//! `VectorIndex`, `ToolServer`) so bootstrap can inject HTTP clients and tests
//! can inject scripted doubles.

pub mod classifier;
pub mod llm;
pub mod retrieval;
pub mod runtime;
pub mod tools;

pub use classifier::{ClassificationError, IntentClassifier};
pub use llm::{CompletionRequest, LlmClient, LlmError, OpenAiCompatibleClient};
pub use retrieval::{Embedder, HttpEmbedder, PineconeIndex, RetrievalError, Retriever, VectorIndex};
pub use runtime::{AgentRuntime, RuntimeSettings, TurnOutcome, TurnState};
pub use tools::{ToolError, ToolInvoker};
