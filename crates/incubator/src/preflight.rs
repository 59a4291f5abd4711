//! Preflight validator: probe every actor once before committing to a
//! multi-hour run.
//!
//! Probes run concurrently and failures are collected, not fail-fast: the
//! aggregate error names every failing actor with a truncated detail so one
//! bad key does not hide another. Preflight-exempt actors (canned/test kinds)
//! skip the network call entirely.

use tracing::{debug, info};

use crate::actor::{ActorRef, GenerateRequest};
use crate::error::{EngineError, EngineResult};
use crate::runner::map_bounded;

const DETAIL_LIMIT: usize = 200;

/// Probe all actors. Returns `Ok(())` only when every actor is reachable.
pub async fn preflight(actors: &[ActorRef], concurrency: usize) -> EngineResult<()> {
    let probes: Vec<ActorRef> = actors.to_vec();
    let outcomes = map_bounded(probes, concurrency, |actor| async move {
        if actor.preflight_exempt() {
            debug!(actor = actor.name(), "preflight exempt");
            return Ok(None);
        }
        match actor.generate(&GenerateRequest::probe()).await {
            Ok(_) => {
                debug!(actor = actor.name(), "preflight probe passed");
                Ok(None)
            }
            Err(e) => Ok(Some((
                actor.name().to_string(),
                truncate(&e.message, DETAIL_LIMIT),
            ))),
        }
    })
    .await?;

    let failures: Vec<(String, String)> = outcomes.into_iter().flatten().collect();
    if failures.is_empty() {
        info!(actors = actors.len(), "preflight passed");
        return Ok(());
    }

    let detail = failures
        .iter()
        .map(|(name, message)| format!("  - {name}: {message}"))
        .collect::<Vec<_>>()
        .join("\n");
    Err(EngineError::Preflight(detail))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
