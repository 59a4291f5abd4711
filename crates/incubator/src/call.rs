//! Retry-validate wrapper around the actor capability.
//!
//! One attempt = generate, extract the structured payload, parse, normalize,
//! contract-check, deserialize into the typed record. Any failure in that
//! chain burns an attempt; transport failures inside the actor do not reach
//! this layer (the actor owns its own retries) but surface the same way when
//! the actor gives up. The final attempt's failure is wrapped into a terminal
//! error carrying the call's label.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::actor::{ActorRef, GenerateRequest};
use crate::contract::{self, Contract};
use crate::error::{CallError, EngineError, EngineResult};
use crate::extract::extract_json;
use crate::runner::Gate;

/// Call an actor and parse/validate its response, retrying parse and
/// contract failures up to `max_attempts`. Every attempt is admitted through
/// the run-wide gate, so in-flight generation calls never exceed the
/// concurrency bound no matter how fan-outs nest. Pure given its inputs
/// apart from the actor call itself.
pub async fn call_typed<T: DeserializeOwned>(
    actor: &ActorRef,
    request: &GenerateRequest,
    contract: Option<&'static Contract>,
    label: &str,
    max_attempts: u32,
    gate: &Gate,
) -> EngineResult<T> {
    let attempts = max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let outcome = {
            let _permit = gate.admit().await;
            attempt_once::<T>(actor, request, contract).await
        };
        match outcome {
            Ok(value) => {
                debug!(label, attempt, actor = actor.name(), "call succeeded");
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    label,
                    attempt,
                    max = attempts,
                    actor = actor.name(),
                    error = %e,
                    "call attempt failed"
                );
                last_error = e.to_string();
            }
        }
    }

    Err(EngineError::CallExhausted {
        label: label.to_string(),
        attempts,
        last_error,
    })
}

/// Untyped variant for call sites that post-process the raw value.
pub async fn call_validated(
    actor: &ActorRef,
    request: &GenerateRequest,
    contract: Option<&'static Contract>,
    label: &str,
    max_attempts: u32,
    gate: &Gate,
) -> EngineResult<Value> {
    call_typed(actor, request, contract, label, max_attempts, gate).await
}

async fn attempt_once<T: DeserializeOwned>(
    actor: &ActorRef,
    request: &GenerateRequest,
    contract: Option<&'static Contract>,
) -> Result<T, CallError> {
    let raw = actor.generate(request).await?;
    let payload = extract_json(&raw);

    let mut value: Value = serde_json::from_str(payload)
        .map_err(|e| CallError::Parse(format!("{e}; snippet: {}", snippet(&raw))))?;

    if let Some(c) = contract {
        contract::normalize(&mut value, c);
        contract::validate(&value, c).map_err(|message| CallError::Contract {
            contract: c.name,
            message,
        })?;
    }

    serde_json::from_value(value).map_err(|e| CallError::Parse(e.to_string()))
}

fn snippet(raw: &str) -> String {
    let flat: String = raw.chars().take(200).collect();
    flat.replace('\n', " ")
}
