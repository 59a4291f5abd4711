//! Typed records for every artifact kind the engine produces.
//!
//! One tagged struct per kind, validated against its contract before being
//! deserialized here, so shape drift is caught at the contract boundary and
//! the stages only ever see well-formed values. Attribution fields (who
//! produced a record, which round, which version) are stamped by the engine
//! after parsing — actors are not trusted to self-report identity.

use serde::{Deserialize, Serialize};

/// Marker embedded in the reasoning of a synthesized selection, so audits can
/// tell an auto-selection from one the founder actually made.
pub const AUTO_SELECT_MARKER: &str = "[auto-selected]";

/// A startup idea proposed by a founder in Stage 1. Immutable once created;
/// selection may carry forward a refined copy as a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub idea_id: String,
    pub title: String,
    pub summary: String,
    pub market: String,
    pub proposer: String,
}

/// Cross-review feedback on one idea from one advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub idea_id: String,
    pub reviewer: String,
    pub score: f64,
    pub strength: String,
    pub weakness: String,
    pub suggestion: String,
}

/// A founder's choice of idea to carry into Stage 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub founder: String,
    pub selected_idea_id: String,
    pub reasoning: String,
    pub refined_idea: Idea,
}

impl Selection {
    /// Synthesize a selection without an actor call. Used when a founder
    /// produced exactly one idea.
    pub fn auto(founder: &str, idea: Idea, mean_feedback_score: f64) -> Self {
        Self {
            founder: founder.to_string(),
            selected_idea_id: idea.idea_id.clone(),
            reasoning: format!(
                "{AUTO_SELECT_MARKER} Only one idea was generated; carried forward \
                 without a selection call (mean feedback score {mean_feedback_score:.1})."
            ),
            refined_idea: idea,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.reasoning.contains(AUTO_SELECT_MARKER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskItem {
    pub risk: String,
    pub severity: Severity,
    pub mitigation: String,
}

/// A versioned startup plan. `version` 0 is the initial build; each Stage-2
/// revision round produces version `round`. All versions are retained on disk
/// as an audit trail; only the latest is "current".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub idea_id: String,
    pub founder: String,
    #[serde(default)]
    pub version: u32,
    pub problem: String,
    pub solution: String,
    pub market: String,
    pub business_model: String,
    pub go_to_market: String,
    pub risks: Vec<RiskItem>,
    pub roadmap: String,
    pub funding_ask: String,
    #[serde(default)]
    pub changelog: Vec<String>,
}

/// The three defined advisor role-slots rotated across Stage-2 rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorRole {
    MarketStrategist,
    TechnicalAdvisor,
    FinancialAdvisor,
}

impl AdvisorRole {
    pub const ALL: [AdvisorRole; 3] = [
        AdvisorRole::MarketStrategist,
        AdvisorRole::TechnicalAdvisor,
        AdvisorRole::FinancialAdvisor,
    ];

    /// Role-slot for a given advisor position and round, rotating so
    /// coverage shifts across rounds when advisors outnumber roles.
    pub fn for_slot(advisor_position: usize, round: u32) -> AdvisorRole {
        let index = (advisor_position + round as usize - 1) % Self::ALL.len();
        Self::ALL[index]
    }

    pub fn display(self) -> &'static str {
        match self {
            Self::MarketStrategist => "Market Strategist",
            Self::TechnicalAdvisor => "Technical Advisor",
            Self::FinancialAdvisor => "Financial Advisor",
        }
    }

    pub fn brief(self) -> &'static str {
        match self {
            Self::MarketStrategist => {
                "You focus on market sizing, go-to-market strategy, competitive \
                 positioning, and customer acquisition."
            }
            Self::TechnicalAdvisor => {
                "You focus on technical feasibility, product architecture, \
                 engineering risks, and the 12-month roadmap."
            }
            Self::FinancialAdvisor => {
                "You focus on unit economics, funding strategy, financial \
                 projections, and capital efficiency."
            }
        }
    }
}

/// One advisor's Stage-2 review of a plan in a given round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub idea_id: String,
    pub reviewer: String,
    pub advisor_role: AdvisorRole,
    #[serde(default)]
    pub round: u32,
    pub readiness_score: f64,
    pub issues: Vec<String>,
    pub strength: String,
    pub ready_for_pitch: bool,
}

/// A lead advisor's synthesis of one round of reviews (deliberation mode).
/// When enabled, this — not the raw review set — is what the founder consumes
/// for the next iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliberation {
    pub idea_id: String,
    pub lead: String,
    #[serde(default)]
    pub round: u32,
    pub summary: String,
    pub key_issues: Vec<String>,
    pub ready_for_pitch: bool,
    pub readiness_score: f64,
}

/// A founder's Stage-3 pitch, derived from the final plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pitch {
    pub idea_id: String,
    pub founder: String,
    pub elevator_pitch: String,
    pub problem_solution_fit: String,
    pub traction: String,
    pub the_ask: String,
    pub why_now: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Invest,
    Pass,
}

/// One investor's evaluation of a pitch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub idea_id: String,
    pub investor: String,
    pub decision: Verdict,
    pub conviction_score: f64,
    pub rationale: String,
}

/// Ranked per-founder aggregate of investor decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRow {
    pub rank: u32,
    pub founder: String,
    pub idea_id: String,
    pub elevator_pitch: String,
    pub invest_count: u32,
    pub investors_total: u32,
    pub mean_conviction: f64,
    pub funding_ask: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_selection_carries_marker() {
        let idea = Idea {
            idea_id: "m-idea-1".into(),
            title: "t".into(),
            summary: "s".into(),
            market: "m".into(),
            proposer: "m".into(),
        };
        let sel = Selection::auto("m", idea, 7.5);
        assert!(sel.is_auto());
        assert_eq!(sel.selected_idea_id, "m-idea-1");
        assert!(sel.reasoning.contains("7.5"));
    }

    #[test]
    fn test_role_rotation_covers_all_roles() {
        // Round 1: positions 0,1,2 map to the three roles in order.
        assert_eq!(AdvisorRole::for_slot(0, 1), AdvisorRole::MarketStrategist);
        assert_eq!(AdvisorRole::for_slot(1, 1), AdvisorRole::TechnicalAdvisor);
        assert_eq!(AdvisorRole::for_slot(2, 1), AdvisorRole::FinancialAdvisor);
        // Round 2 shifts every position by one.
        assert_eq!(AdvisorRole::for_slot(0, 2), AdvisorRole::TechnicalAdvisor);
        assert_eq!(AdvisorRole::for_slot(2, 2), AdvisorRole::MarketStrategist);
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Invest).unwrap(), "\"invest\"");
        let v: Verdict = serde_json::from_str("\"pass\"").unwrap();
        assert_eq!(v, Verdict::Pass);
    }

    #[test]
    fn test_plan_round_trips_with_defaults() {
        let json = r#"{
            "idea_id": "a-1", "founder": "a",
            "problem": "p", "solution": "s", "market": "m",
            "business_model": "bm", "go_to_market": "g",
            "risks": [{"risk": "r", "severity": "high", "mitigation": "x"}],
            "roadmap": "rm", "funding_ask": "f"
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.version, 0);
        assert!(plan.changelog.is_empty());
        assert_eq!(plan.risks[0].severity, Severity::High);
    }

    #[test]
    fn test_advisor_role_snake_case_serde() {
        let role: AdvisorRole = serde_json::from_str("\"market_strategist\"").unwrap();
        assert_eq!(role, AdvisorRole::MarketStrategist);
    }
}
