//! Checkpoint/resume behaviour across engine invocations.

use std::path::Path;
use std::sync::Arc;

use incubator::actor::{ActorRef, MockActor};
use incubator::checkpoint::{Checkpoint, CHECKPOINT_FILE};
use incubator::record::Plan;
use incubator::store::{self, RunStore};
use incubator::{run_pipeline, EngineConfig};

const NAMES: [&str; 4] = ["openai", "anthropic", "deepseek", "gemini"];

fn mock_pool() -> Vec<ActorRef> {
    NAMES
        .iter()
        .map(|n| Arc::new(MockActor::new(*n)) as ActorRef)
        .collect()
}

fn test_config(out: &Path) -> EngineConfig {
    EngineConfig {
        concurrency: 4,
        max_attempts: 3,
        max_rounds: 3,
        min_rounds: 2,
        readiness_threshold: 7.0,
        ideas_per_founder: 2,
        deliberation: false,
        sector_focus: String::new(),
        out_dir: out.to_path_buf(),
        resume: None,
        skip_preflight: false,
    }
}

#[tokio::test]
async fn test_resuming_a_finished_run_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_pipeline(mock_pool(), None, test_config(dir.path()))
        .await
        .unwrap();

    // Fresh actor pool so call counters start at zero.
    let resume_pool = mock_pool();
    let mut config = test_config(dir.path());
    config.resume = Some(outcome.run_dir.clone());
    let resumed = run_pipeline(resume_pool.clone(), None, config)
        .await
        .unwrap();

    assert_eq!(resumed.run_dir, outcome.run_dir);
    assert_eq!(resumed.portfolio.len(), outcome.portfolio.len());
    for actor in &resume_pool {
        assert_eq!(actor.calls_made(), 0, "{} made calls on resume", actor.name());
    }
}

#[tokio::test]
async fn test_partial_stage2_resume_keeps_done_founders_work() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_pipeline(mock_pool(), None, test_config(dir.path()))
        .await
        .unwrap();
    let run_dir = outcome.run_dir.clone();
    let run_store = RunStore::open(&run_dir).unwrap();

    // Rewind the run to "crashed mid-stage-2 with two founders done".
    let checkpoint = Checkpoint {
        stage1_complete: true,
        stage2_complete: false,
        stage3_complete: false,
        stage2_founders_done: vec!["openai".into(), "anthropic".into()],
    };
    std::fs::write(
        run_dir.join(CHECKPOINT_FILE),
        serde_json::to_vec_pretty(&checkpoint).unwrap(),
    )
    .unwrap();
    for artifact in [
        store::STAGE2_FINAL_PLANS,
        store::STAGE3_PITCHES,
        store::STAGE3_DECISIONS,
        store::STAGE3_PORTFOLIO,
    ] {
        std::fs::remove_file(run_dir.join(artifact)).unwrap();
    }

    // Plant a distinctive edit in openai's latest plan version so we can tell
    // reuse from regeneration.
    let latest = run_store.latest_plan("openai").unwrap().unwrap();
    let mut edited = latest.clone();
    edited.problem = "PRESERVED-ACROSS-RESUME".to_string();
    std::fs::write(
        run_dir.join(RunStore::plan_file("openai", latest.version)),
        format!("{}\n", serde_json::to_string(&edited).unwrap()),
    )
    .unwrap();

    let mut config = test_config(dir.path());
    config.resume = Some(run_dir.clone());
    run_pipeline(mock_pool(), None, config).await.unwrap();

    let finals: Vec<Plan> = run_store.read_jsonl(store::STAGE2_FINAL_PLANS).unwrap();
    assert_eq!(finals.len(), 4);
    let openai = finals.iter().find(|p| p.founder == "openai").unwrap();
    assert_eq!(openai.problem, "PRESERVED-ACROSS-RESUME");
    assert_eq!(openai.version, latest.version);
    // The founders that were not checkpointed got re-run.
    assert!(finals.iter().any(|p| p.founder == "deepseek"));
    assert!(finals.iter().any(|p| p.founder == "gemini"));
}

#[tokio::test]
async fn test_doubled_portfolio_collection_dedupes_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_pipeline(mock_pool(), None, test_config(dir.path()))
        .await
        .unwrap();
    let run_dir = outcome.run_dir.clone();

    // Simulate a crash between the portfolio append and the completion mark:
    // the re-run appends a second full row set before stage3_complete lands.
    let path = run_dir.join(store::STAGE3_PORTFOLIO);
    let raw = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("{raw}{raw}")).unwrap();

    let mut config = test_config(dir.path());
    config.resume = Some(run_dir);
    let resumed = run_pipeline(mock_pool(), None, config).await.unwrap();

    assert_eq!(resumed.portfolio.len(), 4);
    let ranks: Vec<u32> = resumed.portfolio.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    let founders: std::collections::HashSet<_> =
        resumed.portfolio.iter().map(|r| r.founder.clone()).collect();
    assert_eq!(founders.len(), 4);
}

#[tokio::test]
async fn test_done_founder_with_missing_plan_file_is_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_pipeline(mock_pool(), None, test_config(dir.path()))
        .await
        .unwrap();
    let run_dir = outcome.run_dir.clone();
    let run_store = RunStore::open(&run_dir).unwrap();

    let checkpoint = Checkpoint {
        stage1_complete: true,
        stage2_complete: false,
        stage3_complete: false,
        stage2_founders_done: vec!["gemini".into()],
    };
    std::fs::write(
        run_dir.join(CHECKPOINT_FILE),
        serde_json::to_vec_pretty(&checkpoint).unwrap(),
    )
    .unwrap();
    for artifact in [
        store::STAGE2_FINAL_PLANS,
        store::STAGE3_PITCHES,
        store::STAGE3_DECISIONS,
        store::STAGE3_PORTFOLIO,
    ] {
        std::fs::remove_file(run_dir.join(artifact)).unwrap();
    }
    // The checkpoint lies: gemini's plan files are gone.
    for entry in std::fs::read_dir(&run_dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("stage2_gemini_plan_v") {
            std::fs::remove_file(entry.path()).unwrap();
        }
    }

    let mut config = test_config(dir.path());
    config.resume = Some(run_dir.clone());
    run_pipeline(mock_pool(), None, config).await.unwrap();

    let finals: Vec<Plan> = run_store.read_jsonl(store::STAGE2_FINAL_PLANS).unwrap();
    assert!(finals.iter().any(|p| p.founder == "gemini"));
    assert!(run_store.latest_plan("gemini").unwrap().is_some());
}
