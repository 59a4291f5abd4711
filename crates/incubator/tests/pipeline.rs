//! End-to-end pipeline runs against canned actors.

use std::path::Path;
use std::sync::Arc;

use incubator::actor::{ActorRef, MockActor, MockBehavior};
use incubator::pipeline::RunContext;
use incubator::record::{Decision, Feedback, Idea, Plan, PortfolioRow, Selection};
use incubator::roles::RoleAssignment;
use incubator::runner::Gate;
use incubator::store::{self, RunStore};
use incubator::{checkpoint::CheckpointStore, run_pipeline, EngineConfig, RolesConfig};

fn mock_pool(names: &[&str]) -> Vec<ActorRef> {
    names
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
        ideas_per_founder: 5,
        deliberation: false,
        sector_focus: String::new(),
        out_dir: out.to_path_buf(),
        resume: None,
        skip_preflight: false,
    }
}

#[tokio::test]
async fn test_full_run_produces_expected_artifact_counts() {
    let dir = tempfile::tempdir().unwrap();
    let actors = mock_pool(&["openai", "anthropic", "deepseek", "gemini"]);

    let outcome = run_pipeline(actors, None, test_config(dir.path()))
        .await
        .unwrap();
    let store = RunStore::open(&outcome.run_dir).unwrap();

    let ideas: Vec<Idea> = store.read_jsonl(store::STAGE1_IDEAS).unwrap();
    assert_eq!(ideas.len(), 20, "4 founders x 5 ideas");

    // Every idea reviewed by the 3 advisors that did not propose it.
    let feedback: Vec<Feedback> = store.read_jsonl(store::STAGE1_FEEDBACK).unwrap();
    assert_eq!(feedback.len(), 60);
    for f in &feedback {
        let idea = ideas.iter().find(|i| i.idea_id == f.idea_id).unwrap();
        assert_ne!(f.reviewer, idea.proposer, "no self-review");
    }

    let selections: Vec<Selection> = store.read_jsonl(store::STAGE1_SELECTIONS).unwrap();
    assert_eq!(selections.len(), 4);
    assert!(selections.iter().all(|s| !s.is_auto()));

    let plans: Vec<Plan> = store.read_jsonl(store::STAGE2_FINAL_PLANS).unwrap();
    assert_eq!(plans.len(), 4);

    let decisions: Vec<Decision> = store.read_jsonl(store::STAGE3_DECISIONS).unwrap();
    assert_eq!(decisions.len(), 12, "3 investors per pitch");

    assert_eq!(outcome.portfolio.len(), 4);
    let ranks: Vec<u32> = outcome.portfolio.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    // Default mocks all invest.
    assert!(outcome.portfolio.iter().all(|r| r.invest_count == 3));

    let on_disk: Vec<PortfolioRow> = store.read_jsonl(store::STAGE3_PORTFOLIO).unwrap();
    assert_eq!(on_disk.len(), 4);
}

#[tokio::test]
async fn test_markdown_wrapped_responses_survive_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let actors: Vec<ActorRef> = vec![
        Arc::new(MockActor::with_behavior(
            "wrapped",
            MockBehavior {
                wrap_markdown: true,
                ..MockBehavior::default()
            },
        )),
        Arc::new(MockActor::new("plain")),
    ];

    let mut config = test_config(dir.path());
    config.ideas_per_founder = 2;
    let outcome = run_pipeline(actors, None, config).await.unwrap();
    assert_eq!(outcome.portfolio.len(), 2);
}

#[tokio::test]
async fn test_single_idea_is_auto_selected_without_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let actors = mock_pool(&["a", "b"]);
    let roles = RoleAssignment::resolve(&actors, None).unwrap();
    let store = RunStore::create_fresh(dir.path()).unwrap();
    let checkpoint = Arc::new(CheckpointStore::open(store.run_dir()).unwrap());
    let mut config = test_config(dir.path());
    config.ideas_per_founder = 1;
    let gate = Gate::new(config.concurrency);
    let ctx = RunContext {
        roles,
        config,
        store,
        checkpoint,
        gate,
    };

    let selections = incubator::stage1::run_stage1(&ctx).await.unwrap();

    for (founder, selection) in &selections {
        assert!(selection.is_auto(), "{founder} should be auto-selected");
        assert_eq!(selection.selected_idea_id, format!("{founder}-idea-1"));
    }
    // Each actor made exactly one generation call and one feedback call;
    // no selection call happened.
    for actor in &ctx.roles.founders {
        assert_eq!(actor.calls_made(), 2, "{}", actor.name());
    }
}

#[tokio::test]
async fn test_founder_with_empty_advisor_panel_fails_the_run() {
    // Role config can leave a founder with nobody to review its plan (the
    // only advisor is the founder itself). That aborts the run rather than
    // letting an unreviewed plan drift to a pitch.
    let dir = tempfile::tempdir().unwrap();
    let actors = mock_pool(&["a", "b"]);
    let roles = RolesConfig {
        founders: Some(vec!["a".into()]),
        advisors: Some(vec!["a".into()]),
        investors: None,
    };

    let err = run_pipeline(actors, Some(roles), test_config(dir.path()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no advisors"));
}

#[tokio::test]
async fn test_multiple_ideas_require_a_real_selection() {
    let dir = tempfile::tempdir().unwrap();
    let actors = mock_pool(&["a", "b"]);
    let mut config = test_config(dir.path());
    config.ideas_per_founder = 3;
    let outcome = run_pipeline(actors, None, config).await.unwrap();

    let store = RunStore::open(&outcome.run_dir).unwrap();
    let selections: Vec<Selection> = store.read_jsonl(store::STAGE1_SELECTIONS).unwrap();
    assert_eq!(selections.len(), 2);
    assert!(selections.iter().all(|s| !s.is_auto()));
}
