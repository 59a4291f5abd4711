//! Run-wide engine configuration.
//!
//! Defaults come from the environment where set, mirroring the knobs the
//! original pipeline exposed. One concurrency integer governs every fan-out
//! point; `1` means strictly sequential, deterministic execution.

use std::path::PathBuf;
use std::str::FromStr;

/// Stage-2 convergence requires the mean readiness score to reach this value.
pub const READINESS_THRESHOLD: f64 = 7.0;

/// Convergence is never declared before this round, so a lucky first pass
/// cannot skip substantive review.
pub const MIN_ROUNDS_BEFORE_CONVERGENCE: u32 = 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum in-flight actor calls per fan-out batch.
    pub concurrency: usize,
    /// Attempt budget for each retry-validate call.
    pub max_attempts: u32,
    /// Maximum Stage-2 review/revise rounds per founder.
    pub max_rounds: u32,
    /// Floor below which convergence is not declared.
    pub min_rounds: u32,
    /// Mean readiness score required for convergence.
    pub readiness_threshold: f64,
    /// Ideas each founder generates in Stage 1.
    pub ideas_per_founder: usize,
    /// Synthesize each round's reviews through a rotating lead advisor.
    pub deliberation: bool,
    /// Optional sector constraint folded into the ideation prompt.
    pub sector_focus: String,
    /// Base directory under which fresh run directories are created.
    pub out_dir: PathBuf,
    /// Resume from an existing run directory instead of starting fresh.
    pub resume: Option<PathBuf>,
    pub skip_preflight: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: env_parse("CONCURRENCY", 1),
            max_attempts: env_parse("RETRY_MAX", 3),
            max_rounds: env_parse("MAX_ROUNDS", 3),
            min_rounds: MIN_ROUNDS_BEFORE_CONVERGENCE,
            readiness_threshold: READINESS_THRESHOLD,
            ideas_per_founder: env_parse("IDEAS_PER_FOUNDER", 5),
            deliberation: env_parse::<u8>("DELIBERATION", 0) == 1,
            sector_focus: std::env::var("SECTOR_FOCUS").unwrap_or_default(),
            out_dir: PathBuf::from("out"),
            resume: None,
            skip_preflight: false,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
