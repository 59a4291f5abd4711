//! Multi-actor startup incubator engine.
//!
//! A fixed three-stage workflow over a pool of named LLM-backed actors:
//!
//! ```text
//!   Stage 1 — Ideate & Select   ideas → cross-review → per-founder selection
//!   Stage 2 — Build & Iterate   plan v0 → review/deliberate/revise rounds
//!   Stage 3 — Pitch & Evaluate  pitch → investor decisions → ranked portfolio
//! ```
//!
//! Every actor call goes through the retry-validate layer ([`call`]): the raw
//! response is JSON-extracted ([`extract`]), contract-checked ([`contract`]),
//! and decoded into a typed record ([`record`]) before any stage logic sees
//! it. Fan-out points share one bounded runner ([`runner`]); all artifacts
//! land as JSONL in a per-run directory ([`store`]) with crash-resilient
//! checkpoints ([`checkpoint`]) so an interrupted run resumes instead of
//! re-spending its budget.

pub mod actor;
pub mod call;
pub mod checkpoint;
pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod preflight;
pub mod prompt;
pub mod record;
pub mod roles;
pub mod runner;
pub mod stage1;
pub mod stage2;
pub mod stage3;
pub mod store;

pub use actor::{Actor, ActorRef, CallKind, GenerateRequest, MockActor, MockBehavior};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use pipeline::{run_pipeline, PipelineOutcome, RunContext};
pub use roles::RolesConfig;
