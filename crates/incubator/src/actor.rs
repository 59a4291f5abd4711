//! Actor capability — the engine's only external dependency.
//!
//! An actor is a named participant backed by a generation capability. The
//! engine never constructs actor internals, it only orders calls. Transport
//! concerns (HTTP retries, backoff, timeouts) live entirely inside the actor;
//! the engine's own retry layer ([`crate::call`]) only retries on JSON parse
//! and contract failures.
//!
//! Every request carries a typed [`CallKind`] tag alongside the prompt, so a
//! canned-response actor selects its output with a typed branch instead of
//! sniffing prompt text. Real backends ignore the tag.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::{AnthropicActor, HttpActorConfig, OpenAiChatActor, RetryPolicy};
pub use mock::{MockActor, MockBehavior};

/// Shared handle to an actor. Actors are cheap to clone into worker tasks.
pub type ActorRef = Arc<dyn Actor>;

/// Raised when an actor's generation call fails after its own transport
/// retries are exhausted.
#[derive(Debug, Clone, Error)]
#[error("{actor}: {message}")]
pub struct ActorError {
    pub actor: String,
    pub message: String,
}

impl ActorError {
    pub fn new(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            message: message.into(),
        }
    }
}

/// Which engine operation a generation call belongs to.
///
/// Carried alongside the prompt so response selection in test actors is a
/// typed branch over this enumeration, never keyword matching on template
/// wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Minimal reachability probe used by preflight.
    Probe,
    /// Stage 1: founder proposes `count` ideas.
    IdeaGeneration { count: usize },
    /// Stage 1: advisor reviews one idea.
    IdeaFeedback,
    /// Stage 1: founder picks the best of its own ideas.
    IdeaSelection,
    /// Stage 2: founder builds plan version 0.
    PlanBuild,
    /// Stage 2: advisor reviews the current plan in a given round.
    PlanReview { round: u32 },
    /// Stage 2: lead advisor synthesizes one round of reviews.
    Deliberation { round: u32 },
    /// Stage 2: founder revises the plan after a round.
    PlanRevision { round: u32 },
    /// Stage 3: founder turns the final plan into a pitch.
    Pitch,
    /// Stage 3: investor evaluates a pitch.
    InvestorDecision,
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub kind: CallKind,
    /// System / persona prompt. Empty when the backend has no use for one.
    pub system: String,
    pub prompt: String,
    /// Idea id the call is about, when one exists. Real backends ignore it;
    /// canned actors echo it into their records so references stay consistent.
    pub subject: Option<String>,
}

impl GenerateRequest {
    pub fn new(kind: CallKind, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            prompt: prompt.into(),
            subject: None,
        }
    }

    pub fn about(mut self, idea_id: impl Into<String>) -> Self {
        self.subject = Some(idea_id.into());
        self
    }

    /// The probe request used by preflight.
    pub fn probe() -> Self {
        Self::new(CallKind::Probe, "", "Reply with the single word: ok")
    }
}

/// A named participant backed by a generation capability.
#[async_trait]
pub trait Actor: Send + Sync {
    /// Unique name within a run.
    fn name(&self) -> &str;

    /// Model identifier, for external cost accounting.
    fn model(&self) -> &str;

    /// Generation calls made so far.
    fn calls_made(&self) -> u64;

    /// Preflight-exempt actors pass the probe without a network call.
    fn preflight_exempt(&self) -> bool {
        false
    }

    /// Generate text from a prompt. May contain JSON plus surrounding noise;
    /// extraction and validation are the caller's concern.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ActorError>;
}
