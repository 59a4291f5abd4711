//! Stage 2 — Build & Iterate. The heart of the engine.
//!
//! Each founder independently builds a plan (version 0) and then cycles
//! review → converge-check → revise for up to `max_rounds` rounds. Founders
//! run concurrently; within one founder's round the advisor panel also fans
//! out concurrently. Advisors rotate through three defined role-slots so a
//! plan is examined from a different angle each round.
//!
//! Convergence requires all three at once: the round floor has been reached,
//! the panel (or the deliberation verdict) says ready, and the readiness
//! score clears the threshold. Hitting `max_rounds` ends iteration without
//! convergence; the plan proceeds to Stage 3 regardless.
//!
//! A founder is checkpointed as done the moment its loop finishes, so a crash
//! mid-stage only costs the founders still in flight.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::actor::{ActorRef, CallKind, GenerateRequest};
use crate::call::call_typed;
use crate::contract;
use crate::error::{EngineError, EngineResult};
use crate::pipeline::RunContext;
use crate::prompt;
use crate::record::{AdvisorRole, Deliberation, Plan, Review, Selection};
use crate::runner::map_bounded;
use crate::store::{self, RunStore};

/// Run Stage 2 for every founder, honoring per-founder checkpoints. Returns
/// final plans in founder order.
pub async fn run_stage2(
    ctx: &RunContext,
    selections: &BTreeMap<String, Selection>,
) -> EngineResult<Vec<Plan>> {
    info!("=== STAGE 2: Build & Iterate ===");
    let done = ctx.checkpoint.snapshot().await.stage2_founders_done;

    let mut preloaded: BTreeMap<String, Plan> = BTreeMap::new();
    let mut pending: Vec<(ActorRef, Selection)> = Vec::new();
    for founder in &ctx.roles.founders {
        let name = founder.name();
        let selection = selections.get(name).ok_or_else(|| {
            EngineError::Stage(format!("no Stage-1 selection recorded for {name}"))
        })?;
        if done.iter().any(|f| f == name) {
            match ctx.store.latest_plan(name)? {
                Some(plan) => {
                    info!(founder = name, version = plan.version, "reusing checkpointed plan");
                    preloaded.insert(name.to_string(), plan);
                    continue;
                }
                None => {
                    warn!(
                        founder = name,
                        "checkpoint says done but no plan file found; re-running"
                    );
                }
            }
        }
        pending.push((founder.clone(), selection.clone()));
    }

    let ctx_owned = ctx.clone();
    let produced = map_bounded(
        pending,
        ctx.config.concurrency,
        move |(founder, selection)| {
            let ctx = ctx_owned.clone();
            async move {
                let plan = iterate_founder(&ctx, &founder, &selection).await?;
                let name = founder.name().to_string();
                ctx.checkpoint
                    .update(|cp| cp.mark_founder_done(&name))
                    .await?;
                Ok((name, plan))
            }
        },
    )
    .await?;
    preloaded.extend(produced);

    ctx.roles
        .founders
        .iter()
        .map(|founder| {
            preloaded
                .remove(founder.name())
                .ok_or_else(|| EngineError::Stage(format!("no plan for {}", founder.name())))
        })
        .collect()
}

/// One founder's full build/iterate loop.
async fn iterate_founder(
    ctx: &RunContext,
    founder: &ActorRef,
    selection: &Selection,
) -> EngineResult<Plan> {
    let name = founder.name();
    let advisors = ctx.roles.advisors_for(name);
    if advisors.is_empty() {
        return Err(EngineError::Stage(format!(
            "founder {name} has no advisors to review its plan"
        )));
    }

    let mut plan = build_plan(ctx, founder, selection).await?;
    let mut history: Vec<Review> = Vec::new();

    for round in 1..=ctx.config.max_rounds {
        let reviews = review_round(ctx, &advisors, &plan, &history, round).await?;
        ctx.store
            .append_jsonl(&RunStore::reviews_file(name, round), &reviews)?;
        ctx.store.append_jsonl(store::STAGE2_ALL_REVIEWS, &reviews)?;

        // What the founder consumes next round, plus the convergence signal.
        let (ready, score, revision_input) = if ctx.config.deliberation {
            let verdict = deliberate(ctx, &advisors, &plan, &reviews, round).await?;
            ctx.store
                .append_jsonl(store::STAGE2_DELIBERATIONS, &[&verdict])?;
            let input = serde_json::to_string_pretty(&verdict)?;
            (verdict.ready_for_pitch, verdict.readiness_score, input)
        } else {
            let ready = reviews.iter().all(|r| r.ready_for_pitch);
            let score = mean_readiness(&reviews);
            (ready, score, serde_json::to_string_pretty(&reviews)?)
        };
        history.extend(reviews);

        if converged(round, ready, score, ctx.config.min_rounds, ctx.config.readiness_threshold) {
            info!(founder = name, round, score, "plan converged");
            return Ok(plan);
        }
        if round == ctx.config.max_rounds {
            info!(
                founder = name,
                round, score, "max rounds reached without convergence"
            );
            return Ok(plan);
        }

        plan = revise_plan(ctx, founder, &plan, &revision_input, round).await?;
    }

    Ok(plan)
}

fn converged(round: u32, ready: bool, score: f64, min_rounds: u32, threshold: f64) -> bool {
    round >= min_rounds && ready && score >= threshold
}

fn mean_readiness(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    reviews.iter().map(|r| r.readiness_score).sum::<f64>() / reviews.len() as f64
}

/// Initial plan build (version 0).
async fn build_plan(
    ctx: &RunContext,
    founder: &ActorRef,
    selection: &Selection,
) -> EngineResult<Plan> {
    let name = founder.name();
    let idea_json = serde_json::to_string_pretty(&selection.refined_idea)?;
    let request = GenerateRequest::new(
        CallKind::PlanBuild,
        prompt::founder_system(name),
        prompt::plan_build(&idea_json),
    )
    .about(&selection.selected_idea_id);
    let label = format!("plan build ({name})");

    let mut plan: Plan = call_typed(
        founder,
        &request,
        Some(&contract::STARTUP_PLAN),
        &label,
        ctx.config.max_attempts,
        &ctx.gate,
    )
    .await?;
    plan.founder = name.to_string();
    plan.idea_id = selection.selected_idea_id.clone();
    plan.version = 0;
    ctx.store.write_plan_version(&plan)?;
    info!(founder = name, idea = %plan.idea_id, "initial plan built");
    Ok(plan)
}

/// One advisor panel round, fanned out concurrently. Each advisor sees its
/// own previous feedback and the founder's changelog so it can check what was
/// actually addressed.
async fn review_round(
    ctx: &RunContext,
    advisors: &[ActorRef],
    plan: &Plan,
    history: &[Review],
    round: u32,
) -> EngineResult<Vec<Review>> {
    let plan_json = serde_json::to_string_pretty(plan)?;
    let changelog_json = if plan.changelog.is_empty() {
        None
    } else {
        Some(serde_json::to_string_pretty(&plan.changelog)?)
    };

    let mut tasks = Vec::with_capacity(advisors.len());
    for (position, advisor) in advisors.iter().enumerate() {
        let previous: Vec<&Review> = history
            .iter()
            .filter(|r| r.reviewer == advisor.name())
            .collect();
        let previous_json = if previous.is_empty() {
            None
        } else {
            Some(serde_json::to_string_pretty(&previous)?)
        };
        tasks.push((position, advisor.clone(), previous_json));
    }

    let max_attempts = ctx.config.max_attempts;
    let idea_id = plan.idea_id.clone();
    let gate = ctx.gate.clone();
    map_bounded(
        tasks,
        ctx.config.concurrency,
        move |(position, advisor, previous_json)| {
            let plan_json = plan_json.clone();
            let changelog_json = changelog_json.clone();
            let idea_id = idea_id.clone();
            let gate = gate.clone();
            async move {
                let reviewer = advisor.name().to_string();
                let role = AdvisorRole::for_slot(position, round);
                let request = GenerateRequest::new(
                    CallKind::PlanReview { round },
                    prompt::advisor_system(&reviewer, role),
                    prompt::advisor_review(
                        &plan_json,
                        previous_json.as_deref(),
                        changelog_json.as_deref(),
                    ),
                )
                .about(&idea_id);
                let label = format!("review ({reviewer}/{idea_id} round {round})");

                let mut review: Review = call_typed(
                    &advisor,
                    &request,
                    Some(&contract::ADVISOR_REVIEW),
                    &label,
                    max_attempts,
                    &gate,
                )
                .await?;
                review.reviewer = reviewer;
                review.idea_id = idea_id;
                review.round = round;
                review.advisor_role = role;
                Ok(review)
            }
        },
    )
    .await
}

/// Deliberation mode: the round's lead advisor condenses the panel's reviews
/// into a single verdict. Leadership rotates round-robin across rounds.
async fn deliberate(
    ctx: &RunContext,
    advisors: &[ActorRef],
    plan: &Plan,
    reviews: &[Review],
    round: u32,
) -> EngineResult<Deliberation> {
    let position = (round as usize - 1) % advisors.len();
    let lead = &advisors[position];
    let name = lead.name().to_string();
    let role = AdvisorRole::for_slot(position, round);

    let request = GenerateRequest::new(
        CallKind::Deliberation { round },
        prompt::advisor_system(&name, role),
        prompt::deliberation(&serde_json::to_string_pretty(reviews)?),
    )
    .about(&plan.idea_id);
    let label = format!("deliberation ({name}/{} round {round})", plan.idea_id);

    let mut verdict: Deliberation = call_typed(
        lead,
        &request,
        Some(&contract::DELIBERATION),
        &label,
        ctx.config.max_attempts,
        &ctx.gate,
    )
    .await?;
    verdict.lead = name;
    verdict.idea_id = plan.idea_id.clone();
    verdict.round = round;
    Ok(verdict)
}

/// Founder revision after a non-converged round. The new version number is
/// the round that prompted it.
async fn revise_plan(
    ctx: &RunContext,
    founder: &ActorRef,
    plan: &Plan,
    revision_input: &str,
    round: u32,
) -> EngineResult<Plan> {
    let name = founder.name();
    let request = GenerateRequest::new(
        CallKind::PlanRevision { round },
        prompt::founder_system(name),
        prompt::plan_revision(round, &serde_json::to_string_pretty(plan)?, revision_input),
    )
    .about(&plan.idea_id);
    let label = format!("revision ({name} round {round})");

    let mut revised: Plan = call_typed(
        founder,
        &request,
        Some(&contract::STARTUP_PLAN),
        &label,
        ctx.config.max_attempts,
        &ctx.gate,
    )
    .await?;
    revised.founder = name.to_string();
    revised.idea_id = plan.idea_id.clone();
    revised.version = round;
    ctx.store.write_plan_version(&revised)?;
    info!(founder = name, version = revised.version, "plan revised");
    Ok(revised)
}
