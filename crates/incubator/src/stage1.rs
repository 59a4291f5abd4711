//! Stage 1 — Ideate & Select. Three steps, no loop.
//!
//! 1. Generate: every founder proposes ideas, concurrently.
//! 2. Cross-review: the {idea × advisor} product, minus self-review, fanned
//!    out concurrently.
//! 3. Select: each founder picks its best idea; a founder with exactly one
//!    idea gets a synthesized selection without an actor call.
//!
//! Any unrecovered call failure aborts the stage and the run.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

use crate::actor::{ActorRef, CallKind, GenerateRequest};
use crate::call::{call_typed, call_validated};
use crate::contract;
use crate::error::{EngineError, EngineResult};
use crate::pipeline::RunContext;
use crate::prompt;
use crate::record::{Feedback, Idea, Selection};
use crate::runner::map_bounded;
use crate::store;

pub async fn run_stage1(ctx: &RunContext) -> EngineResult<BTreeMap<String, Selection>> {
    info!("=== STAGE 1: Ideate & Select ===");

    let all_ideas = generate_ideas(ctx).await?;
    let flat: Vec<&Idea> = all_ideas.values().flatten().collect();
    ctx.store.append_jsonl(store::STAGE1_IDEAS, &flat)?;

    let feedback = cross_review(ctx, &all_ideas).await?;
    ctx.store.append_jsonl(store::STAGE1_FEEDBACK, &feedback)?;
    info!(count = feedback.len(), "collected cross-review feedback");

    let selections = select(ctx, &all_ideas, &feedback).await?;
    let rows: Vec<&Selection> = selections.values().collect();
    ctx.store.append_jsonl(store::STAGE1_SELECTIONS, &rows)?;

    Ok(selections)
}

/// Step 1: per-founder idea generation.
///
/// The batch call itself is retried on parse failure; a batch that parses but
/// contains a malformed idea card is a stage-fatal contract problem, not a
/// transient one.
async fn generate_ideas(ctx: &RunContext) -> EngineResult<BTreeMap<String, Vec<Idea>>> {
    let count = ctx.config.ideas_per_founder;
    let sector = ctx.config.sector_focus.clone();
    let max_attempts = ctx.config.max_attempts;
    info!(
        founders = ctx.roles.founders.len(),
        ideas_per_founder = count,
        "generating ideas"
    );

    let founders = ctx.roles.founders.clone();
    let gate = ctx.gate.clone();
    let batches = map_bounded(founders, ctx.config.concurrency, move |founder| {
        let sector = sector.clone();
        let gate = gate.clone();
        async move {
            let name = founder.name().to_string();
            let request = GenerateRequest::new(
                CallKind::IdeaGeneration { count },
                prompt::founder_system(&name),
                prompt::ideation(&name, count, &sector),
            );
            let label = format!("idea generation ({name})");
            let batch: Value =
                call_validated(&founder, &request, None, &label, max_attempts, &gate).await?;

            let items = batch
                .get("ideas")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    EngineError::Stage(format!("{label} did not return an ideas array"))
                })?;

            let mut ideas = Vec::with_capacity(items.len());
            for item in items {
                let mut card = item.clone();
                contract::normalize(&mut card, &contract::IDEA_CARD);
                contract::validate(&card, &contract::IDEA_CARD).map_err(|e| {
                    EngineError::Stage(format!("invalid idea card from {name}: {e}"))
                })?;
                let mut idea: Idea = serde_json::from_value(card)?;
                idea.proposer = name.clone();
                ideas.push(idea);
            }
            info!(founder = %name, count = ideas.len(), "ideas generated");
            Ok((name, ideas))
        }
    })
    .await?;

    Ok(batches.into_iter().collect())
}

/// Step 2: every idea reviewed by every advisor except its own founder.
async fn cross_review(
    ctx: &RunContext,
    all_ideas: &BTreeMap<String, Vec<Idea>>,
) -> EngineResult<Vec<Feedback>> {
    let mut tasks: Vec<(Idea, ActorRef)> = Vec::new();
    for (proposer, ideas) in all_ideas {
        for idea in ideas {
            for advisor in &ctx.roles.advisors {
                if advisor.name() != proposer {
                    tasks.push((idea.clone(), advisor.clone()));
                }
            }
        }
    }
    info!(reviews = tasks.len(), "running cross-review");

    let max_attempts = ctx.config.max_attempts;
    let gate = ctx.gate.clone();
    map_bounded(tasks, ctx.config.concurrency, move |(idea, advisor)| {
        let gate = gate.clone();
        async move {
            let reviewer = advisor.name().to_string();
            let idea_json = serde_json::to_string_pretty(&idea)?;
            let request = GenerateRequest::new(
                CallKind::IdeaFeedback,
                prompt::founder_system(&reviewer),
                prompt::idea_feedback(&reviewer, &idea_json),
            )
            .about(&idea.idea_id);
            let label = format!("feedback ({reviewer}/{})", idea.idea_id);

            let mut feedback: Feedback = call_typed(
                &advisor,
                &request,
                Some(&contract::FEEDBACK),
                &label,
                max_attempts,
                &gate,
            )
            .await?;
            // Attribution is engine-owned.
            feedback.reviewer = reviewer;
            feedback.idea_id = idea.idea_id.clone();
            Ok(feedback)
        }
    })
    .await
}

/// Step 3: per-founder selection, synthesized without a call when the
/// founder produced exactly one idea.
async fn select(
    ctx: &RunContext,
    all_ideas: &BTreeMap<String, Vec<Idea>>,
    feedback: &[Feedback],
) -> EngineResult<BTreeMap<String, Selection>> {
    let mut selections = BTreeMap::new();

    for founder in &ctx.roles.founders {
        let name = founder.name();
        let ideas = all_ideas
            .get(name)
            .ok_or_else(|| EngineError::Stage(format!("no ideas recorded for {name}")))?;
        let my_feedback: Vec<&Feedback> = feedback
            .iter()
            .filter(|f| ideas.iter().any(|i| i.idea_id == f.idea_id))
            .collect();

        let selection = if let [only] = ideas.as_slice() {
            let mean = mean_score(&my_feedback);
            info!(founder = name, idea = %only.idea_id, "auto-selecting single idea");
            Selection::auto(name, only.clone(), mean)
        } else {
            let mut grouped: BTreeMap<&str, Vec<&Feedback>> = BTreeMap::new();
            for f in &my_feedback {
                grouped.entry(f.idea_id.as_str()).or_default().push(f);
            }
            let request = GenerateRequest::new(
                CallKind::IdeaSelection,
                prompt::founder_system(name),
                prompt::selection(
                    name,
                    &serde_json::to_string_pretty(ideas)?,
                    &serde_json::to_string_pretty(&grouped)?,
                ),
            );
            let label = format!("selection ({name})");
            let mut selection: Selection = call_typed(
                founder,
                &request,
                Some(&contract::SELECTION),
                &label,
                ctx.config.max_attempts,
                &ctx.gate,
            )
            .await?;
            selection.founder = name.to_string();
            if !ideas.iter().any(|i| i.idea_id == selection.selected_idea_id) {
                return Err(EngineError::Stage(format!(
                    "{label}: selected unknown idea '{}'",
                    selection.selected_idea_id
                )));
            }
            selection
        };

        info!(founder = name, idea = %selection.selected_idea_id, "idea selected");
        selections.insert(name.to_string(), selection);
    }

    Ok(selections)
}

fn mean_score(feedback: &[&Feedback]) -> f64 {
    if feedback.is_empty() {
        return 0.0;
    }
    feedback.iter().map(|f| f.score).sum::<f64>() / feedback.len() as f64
}
