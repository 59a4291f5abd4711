//! Top-level pipeline: preflight, then Stage 1 → 2 → 3, with checkpointed
//! resume.
//!
//! On resume, a completed stage is not re-run: its outputs are reloaded from
//! the run directory and fed to the next stage. Stage 2 additionally resumes
//! founder-by-founder. The pipeline owns stage sequencing and checkpoint
//! transitions; the stages own everything inside themselves.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::actor::ActorRef;
use crate::checkpoint::CheckpointStore;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::preflight::preflight;
use crate::record::{Plan, PortfolioRow, Selection};
use crate::roles::{RoleAssignment, RolesConfig};
use crate::runner::Gate;
use crate::stage1::run_stage1;
use crate::stage2::run_stage2;
use crate::stage3::run_stage3;
use crate::store::{self, RunStore};

/// Everything a stage needs, cheaply cloneable into concurrent tasks.
#[derive(Clone)]
pub struct RunContext {
    pub roles: RoleAssignment,
    pub config: EngineConfig,
    pub store: RunStore,
    pub checkpoint: Arc<CheckpointStore>,
    /// Run-wide admission gate for generation calls, sized once from the
    /// concurrency setting.
    pub gate: Gate,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub run_dir: PathBuf,
    pub portfolio: Vec<PortfolioRow>,
}

pub async fn run_pipeline(
    actors: Vec<ActorRef>,
    roles_config: Option<RolesConfig>,
    config: EngineConfig,
) -> EngineResult<PipelineOutcome> {
    let roles = RoleAssignment::resolve(&actors, roles_config.as_ref())?;

    if config.skip_preflight {
        info!("preflight skipped by configuration");
    } else {
        preflight(&actors, config.concurrency).await?;
    }

    let store = match &config.resume {
        Some(dir) => {
            info!(run_dir = %dir.display(), "resuming existing run");
            RunStore::open(dir)?
        }
        None => RunStore::create_fresh(&config.out_dir)?,
    };
    let checkpoint = Arc::new(CheckpointStore::open(store.run_dir())?);
    let gate = Gate::new(config.concurrency);
    let ctx = RunContext {
        roles,
        config,
        store,
        checkpoint,
        gate,
    };

    let selections = stage1_or_reload(&ctx).await?;
    let plans = stage2_or_reload(&ctx, &selections).await?;
    let portfolio = stage3_or_reload(&ctx, &plans).await?;

    for row in &portfolio {
        info!(
            rank = row.rank,
            founder = %row.founder,
            invest = format!("{}/{}", row.invest_count, row.investors_total),
            conviction = format!("{:.1}", row.mean_conviction),
            "portfolio"
        );
    }

    Ok(PipelineOutcome {
        run_dir: ctx.store.run_dir().to_path_buf(),
        portfolio,
    })
}

async fn stage1_or_reload(ctx: &RunContext) -> EngineResult<BTreeMap<String, Selection>> {
    if !ctx.checkpoint.snapshot().await.stage1_complete {
        let selections = run_stage1(ctx).await?;
        ctx.checkpoint.update(|cp| cp.stage1_complete = true).await?;
        return Ok(selections);
    }

    info!("stage 1 already complete; reloading selections");
    let rows: Vec<Selection> = ctx.store.read_jsonl(store::STAGE1_SELECTIONS)?;
    // Keep the last record per founder in case an interrupted run appended twice.
    let mut selections = BTreeMap::new();
    for selection in rows {
        selections.insert(selection.founder.clone(), selection);
    }
    for founder in &ctx.roles.founders {
        if !selections.contains_key(founder.name()) {
            return Err(EngineError::Stage(format!(
                "resumed run has no selection for founder {}",
                founder.name()
            )));
        }
    }
    Ok(selections)
}

async fn stage2_or_reload(
    ctx: &RunContext,
    selections: &BTreeMap<String, Selection>,
) -> EngineResult<Vec<Plan>> {
    if !ctx.checkpoint.snapshot().await.stage2_complete {
        let plans = run_stage2(ctx, selections).await?;
        ctx.store.append_jsonl(store::STAGE2_FINAL_PLANS, &plans)?;
        ctx.checkpoint.update(|cp| cp.stage2_complete = true).await?;
        return Ok(plans);
    }

    info!("stage 2 already complete; reloading final plans");
    let rows: Vec<Plan> = ctx.store.read_jsonl(store::STAGE2_FINAL_PLANS)?;
    let mut by_founder = BTreeMap::new();
    for plan in rows {
        by_founder.insert(plan.founder.clone(), plan);
    }
    ctx.roles
        .founders
        .iter()
        .map(|founder| {
            by_founder.remove(founder.name()).ok_or_else(|| {
                EngineError::Stage(format!(
                    "resumed run has no final plan for founder {}",
                    founder.name()
                ))
            })
        })
        .collect()
}

async fn stage3_or_reload(ctx: &RunContext, plans: &[Plan]) -> EngineResult<Vec<PortfolioRow>> {
    if !ctx.checkpoint.snapshot().await.stage3_complete {
        let portfolio = run_stage3(ctx, plans).await?;
        ctx.checkpoint.update(|cp| cp.stage3_complete = true).await?;
        return Ok(portfolio);
    }

    info!("stage 3 already complete; reloading portfolio");
    let rows: Vec<PortfolioRow> = ctx.store.read_jsonl(store::STAGE3_PORTFOLIO)?;
    // A crash between the portfolio append and the completion mark can leave
    // a doubled collection; keep the last row per founder, as with the other
    // stages' reloads.
    let mut by_founder = BTreeMap::new();
    for row in rows {
        by_founder.insert(row.founder.clone(), row);
    }
    let mut portfolio: Vec<PortfolioRow> = by_founder.into_values().collect();
    portfolio.sort_by_key(|row| row.rank);
    Ok(portfolio)
}
