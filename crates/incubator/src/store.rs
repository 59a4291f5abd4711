//! Run-directory artifact store.
//!
//! One append-only JSONL collection per record kind per stage, one record per
//! line, in generation order. Plan versions get their own files so the audit
//! trail survives every revision and resume can reload the highest version
//! found on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::record::Plan;

pub const STAGE1_IDEAS: &str = "stage1_ideas.jsonl";
pub const STAGE1_FEEDBACK: &str = "stage1_feedback.jsonl";
pub const STAGE1_SELECTIONS: &str = "stage1_selections.jsonl";
pub const STAGE2_ALL_REVIEWS: &str = "stage2_all_reviews.jsonl";
pub const STAGE2_DELIBERATIONS: &str = "stage2_deliberations.jsonl";
pub const STAGE2_FINAL_PLANS: &str = "stage2_final_plans.jsonl";
pub const STAGE3_PITCHES: &str = "stage3_pitches.jsonl";
pub const STAGE3_DECISIONS: &str = "stage3_decisions.jsonl";
pub const STAGE3_PORTFOLIO: &str = "stage3_portfolio.jsonl";

/// Handle on one run's output directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    run_dir: PathBuf,
}

impl RunStore {
    /// Create a fresh timestamped run directory under `base`.
    pub fn create_fresh(base: &Path) -> EngineResult<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let mut dir = base.join(format!("run_{stamp}"));
        let mut suffix = 1;
        while dir.exists() {
            suffix += 1;
            dir = base.join(format!("run_{stamp}_{suffix}"));
        }
        std::fs::create_dir_all(&dir)?;
        info!(run_dir = %dir.display(), "created run directory");
        Ok(Self { run_dir: dir })
    }

    /// Open an existing run directory for resume.
    pub fn open(run_dir: &Path) -> EngineResult<Self> {
        if !run_dir.is_dir() {
            return Err(EngineError::Config(format!(
                "resume directory does not exist: {}",
                run_dir.display()
            )));
        }
        Ok(Self {
            run_dir: run_dir.to_path_buf(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append records to a JSONL collection, one per line, in order.
    pub fn append_jsonl<T: Serialize>(&self, name: &str, records: &[T]) -> EngineResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join(name))?;
        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    pub fn read_jsonl<T: DeserializeOwned>(&self, name: &str) -> EngineResult<Vec<T>> {
        let raw = std::fs::read_to_string(self.run_dir.join(name))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(EngineError::from))
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.run_dir.join(name).exists()
    }

    pub fn plan_file(founder: &str, version: u32) -> String {
        format!("stage2_{founder}_plan_v{version}.jsonl")
    }

    pub fn reviews_file(founder: &str, round: u32) -> String {
        format!("stage2_{founder}_reviews_round{round}.jsonl")
    }

    pub fn write_plan_version(&self, plan: &Plan) -> EngineResult<()> {
        self.append_jsonl(&Self::plan_file(&plan.founder, plan.version), &[plan])
    }

    /// Load the highest-versioned plan file present for a founder.
    pub fn latest_plan(&self, founder: &str) -> EngineResult<Option<Plan>> {
        let prefix = format!("stage2_{founder}_plan_v");
        let mut best: Option<u32> = None;
        for entry in std::fs::read_dir(&self.run_dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(version) = rest.strip_suffix(".jsonl").and_then(|v| v.parse().ok()) else {
                continue;
            };
            best = Some(best.map_or(version, |b: u32| b.max(version)));
        }

        let Some(version) = best else { return Ok(None) };
        let plans: Vec<Plan> = self.read_jsonl(&Self::plan_file(founder, version))?;
        plans.into_iter().next().map(Some).ok_or_else(|| {
            EngineError::Stage(format!(
                "plan file for {founder} v{version} exists but is empty"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Idea, RiskItem, Severity};

    fn plan(founder: &str, version: u32) -> Plan {
        Plan {
            idea_id: format!("{founder}-idea-1"),
            founder: founder.to_string(),
            version,
            problem: format!("problem v{version}"),
            solution: "s".into(),
            market: "m".into(),
            business_model: "bm".into(),
            go_to_market: "g".into(),
            risks: vec![RiskItem {
                risk: "r".into(),
                severity: Severity::Low,
                mitigation: "x".into(),
            }],
            roadmap: "rm".into(),
            funding_ask: "f".into(),
            changelog: Vec::new(),
        }
    }

    #[test]
    fn test_append_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let ideas = vec![
            Idea {
                idea_id: "a-1".into(),
                title: "t1".into(),
                summary: "s".into(),
                market: "m".into(),
                proposer: "a".into(),
            },
            Idea {
                idea_id: "a-2".into(),
                title: "t2".into(),
                summary: "s".into(),
                market: "m".into(),
                proposer: "a".into(),
            },
        ];
        store.append_jsonl(STAGE1_IDEAS, &ideas).unwrap();
        store.append_jsonl(STAGE1_IDEAS, &ideas[..1]).unwrap();

        let loaded: Vec<Idea> = store.read_jsonl(STAGE1_IDEAS).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], ideas[0]);
        assert_eq!(loaded[2].idea_id, "a-1");
    }

    #[test]
    fn test_latest_plan_picks_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        for version in [0, 1, 2] {
            store.write_plan_version(&plan("openai", version)).unwrap();
        }
        // A different founder's plans must not interfere.
        store.write_plan_version(&plan("gemini", 5)).unwrap();

        let latest = store.latest_plan("openai").unwrap().expect("plan exists");
        assert_eq!(latest.version, 2);
        assert_eq!(latest.problem, "problem v2");
    }

    #[test]
    fn test_latest_plan_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        assert!(store.latest_plan("nobody").unwrap().is_none());
    }

    #[test]
    fn test_create_fresh_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunStore::create_fresh(dir.path()).unwrap();
        let second = RunStore::create_fresh(dir.path()).unwrap();
        assert_ne!(first.run_dir(), second.run_dir());
        assert!(first.run_dir().is_dir());
        assert!(second.run_dir().is_dir());
    }

    #[test]
    fn test_open_missing_dir_is_config_error() {
        let err = RunStore::open(Path::new("/nonexistent/run_dir")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
