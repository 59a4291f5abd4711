//! Stage 3 — Pitch & Evaluate.
//!
//! Founders pitch sequentially; each pitch's investor panel fans out
//! concurrently. A founder never evaluates its own pitch. Decisions are
//! aggregated into a portfolio ranked by invest count, then mean conviction;
//! the sort is stable so equal founders keep pitch order.

use tracing::info;

use crate::actor::{ActorRef, CallKind, GenerateRequest};
use crate::call::call_typed;
use crate::contract;
use crate::error::{EngineError, EngineResult};
use crate::pipeline::RunContext;
use crate::prompt;
use crate::record::{Decision, Pitch, Plan, PortfolioRow, Verdict};
use crate::runner::map_bounded;
use crate::store;

pub async fn run_stage3(ctx: &RunContext, plans: &[Plan]) -> EngineResult<Vec<PortfolioRow>> {
    info!("=== STAGE 3: Pitch & Evaluate ===");

    let mut outcomes: Vec<(Pitch, Vec<Decision>)> = Vec::with_capacity(plans.len());
    for plan in plans {
        let founder = ctx
            .roles
            .founder(&plan.founder)
            .ok_or_else(|| {
                EngineError::Stage(format!("plan founder {} is not in the pool", plan.founder))
            })?
            .clone();
        let investors = ctx.roles.investors_for(&plan.founder);
        if investors.is_empty() {
            return Err(EngineError::Stage(format!(
                "no investors available for {}'s pitch",
                plan.founder
            )));
        }

        let pitch = make_pitch(ctx, &founder, plan).await?;
        let decisions = evaluate_pitch(ctx, &investors, &pitch, plan).await?;
        ctx.store.append_jsonl(store::STAGE3_PITCHES, &[&pitch])?;
        ctx.store.append_jsonl(store::STAGE3_DECISIONS, &decisions)?;
        outcomes.push((pitch, decisions));
    }

    let portfolio = aggregate(&outcomes, plans);
    ctx.store.append_jsonl(store::STAGE3_PORTFOLIO, &portfolio)?;
    Ok(portfolio)
}

async fn make_pitch(ctx: &RunContext, founder: &ActorRef, plan: &Plan) -> EngineResult<Pitch> {
    let name = founder.name();
    let request = GenerateRequest::new(
        CallKind::Pitch,
        prompt::founder_system(name),
        prompt::pitch(&serde_json::to_string_pretty(plan)?),
    )
    .about(&plan.idea_id);
    let label = format!("pitch ({name})");

    let mut pitch: Pitch = call_typed(
        founder,
        &request,
        Some(&contract::PITCH),
        &label,
        ctx.config.max_attempts,
        &ctx.gate,
    )
    .await?;
    pitch.founder = name.to_string();
    pitch.idea_id = plan.idea_id.clone();
    info!(founder = name, idea = %pitch.idea_id, "pitch delivered");
    Ok(pitch)
}

async fn evaluate_pitch(
    ctx: &RunContext,
    investors: &[ActorRef],
    pitch: &Pitch,
    plan: &Plan,
) -> EngineResult<Vec<Decision>> {
    let pitch_json = serde_json::to_string_pretty(pitch)?;
    let plan_json = serde_json::to_string_pretty(plan)?;
    let idea_id = pitch.idea_id.clone();
    let max_attempts = ctx.config.max_attempts;
    let gate = ctx.gate.clone();

    map_bounded(
        investors.to_vec(),
        ctx.config.concurrency,
        move |investor| {
            let pitch_json = pitch_json.clone();
            let plan_json = plan_json.clone();
            let idea_id = idea_id.clone();
            let gate = gate.clone();
            async move {
                let name = investor.name().to_string();
                let request = GenerateRequest::new(
                    CallKind::InvestorDecision,
                    prompt::investor_system(&name),
                    prompt::investor_eval(&pitch_json, &plan_json),
                )
                .about(&idea_id);
                let label = format!("decision ({name}/{idea_id})");

                let mut decision: Decision = call_typed(
                    &investor,
                    &request,
                    Some(&contract::INVESTOR_DECISION),
                    &label,
                    max_attempts,
                    &gate,
                )
                .await?;
                decision.investor = name;
                decision.idea_id = idea_id;
                Ok(decision)
            }
        },
    )
    .await
}

/// Fold decisions into ranked portfolio rows. Ordering: invest count
/// descending, then mean conviction descending; stable for full ties.
fn aggregate(outcomes: &[(Pitch, Vec<Decision>)], plans: &[Plan]) -> Vec<PortfolioRow> {
    let mut rows: Vec<PortfolioRow> = outcomes
        .iter()
        .map(|(pitch, decisions)| {
            let invest_count = decisions
                .iter()
                .filter(|d| d.decision == Verdict::Invest)
                .count() as u32;
            let mean_conviction = if decisions.is_empty() {
                0.0
            } else {
                decisions.iter().map(|d| d.conviction_score).sum::<f64>()
                    / decisions.len() as f64
            };
            let funding_ask = plans
                .iter()
                .find(|p| p.founder == pitch.founder)
                .map(|p| p.funding_ask.clone())
                .unwrap_or_default();
            PortfolioRow {
                rank: 0,
                founder: pitch.founder.clone(),
                idea_id: pitch.idea_id.clone(),
                elevator_pitch: pitch.elevator_pitch.clone(),
                invest_count,
                investors_total: decisions.len() as u32,
                mean_conviction,
                funding_ask,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.invest_count
            .cmp(&a.invest_count)
            .then_with(|| b.mean_conviction.total_cmp(&a.mean_conviction))
    });
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index as u32 + 1;
    }
    rows
}
