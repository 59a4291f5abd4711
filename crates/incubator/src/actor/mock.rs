//! Canned actor for dry runs and tests — covers all three stages.
//!
//! Response selection is a typed branch over [`CallKind`], never keyword
//! matching on prompt text, so template wording can change freely without
//! breaking dry runs. The subject id carried by the request is echoed into
//! records so idea references stay consistent across stages.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::actor::{Actor, ActorError, CallKind, GenerateRequest};

/// Tunable behaviour for scripted scenarios.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// First Stage-2 round in which this actor's reviews signal ready.
    /// Earlier rounds produce a not-ready review with a low score.
    pub ready_from_round: u32,
    /// Readiness score reported once ready.
    pub readiness_score: f64,
    /// Readiness score reported while not yet ready.
    pub unready_score: f64,
    /// Score attached to Stage-1 feedback.
    pub feedback_score: f64,
    /// Whether investor decisions are "invest".
    pub invest: bool,
    pub conviction_score: f64,
    /// Wrap every response in prose and a markdown fence, exercising the
    /// extraction path end to end.
    pub wrap_markdown: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            ready_from_round: 1,
            readiness_score: 7.5,
            unready_score: 4.0,
            feedback_score: 7.5,
            invest: true,
            conviction_score: 7.0,
            wrap_markdown: false,
        }
    }
}

/// Deterministic canned-response actor. Preflight-exempt.
pub struct MockActor {
    name: String,
    behavior: MockBehavior,
    calls: AtomicU64,
}

impl MockActor {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_behavior(name, MockBehavior::default())
    }

    pub fn with_behavior(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            calls: AtomicU64::new(0),
        }
    }

    fn subject(&self, request: &GenerateRequest) -> String {
        request
            .subject
            .clone()
            .unwrap_or_else(|| format!("{}-idea-1", self.name))
    }

    fn render(&self, value: serde_json::Value) -> String {
        let body = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        if self.behavior.wrap_markdown {
            format!("Here is the requested JSON:\n```json\n{body}\n```\nLet me know if you need changes.")
        } else {
            body
        }
    }

    fn ideas(&self, count: usize) -> serde_json::Value {
        let verticals = ["healthcare", "fintech", "devtools", "logistics", "education"];
        let ideas: Vec<_> = (0..count)
            .map(|i| {
                let vertical = verticals[i % verticals.len()];
                json!({
                    "idea_id": format!("{}-idea-{}", self.name, i + 1),
                    "title": format!("{} venture {}", self.name, i + 1),
                    "summary": format!(
                        "A {vertical} product that removes a critical pain point for \
                         mid-market companies, with a 10x improvement over incumbents."
                    ),
                    "market": format!("Mid-market {vertical} companies, $5B addressable"),
                    "proposer": self.name,
                })
            })
            .collect();
        json!({ "ideas": ideas })
    }

    fn feedback(&self, idea_id: &str) -> serde_json::Value {
        json!({
            "idea_id": idea_id,
            "reviewer": self.name,
            "score": self.behavior.feedback_score,
            "strength": "Clear target customer and a well-defined pain point.",
            "weakness": "Market size estimate lacks supporting reasoning.",
            "suggestion": "Narrow the initial segment for faster validation.",
        })
    }

    fn selection(&self) -> serde_json::Value {
        let idea_id = format!("{}-idea-1", self.name);
        json!({
            "founder": self.name,
            "selected_idea_id": idea_id,
            "reasoning": "Idea 1 drew the strongest feedback and the clearest wedge; \
                          the market-sizing weakness is addressable with research.",
            "refined_idea": {
                "idea_id": idea_id,
                "title": format!("{} venture 1 (refined)", self.name),
                "summary": "Refined to target mid-market healthcare clinics first, \
                            incorporating reviewer feedback on the initial segment.",
                "market": "Mid-market clinics, $2B serviceable within a $12B category",
                "proposer": self.name,
            },
        })
    }

    fn plan(&self, idea_id: &str, revised_in_round: Option<u32>) -> serde_json::Value {
        let changelog: Vec<String> = match revised_in_round {
            Some(round) => vec![format!(
                "Round {round}: tightened unit economics and broadened the competitive scan."
            )],
            None => Vec::new(),
        };
        json!({
            "idea_id": idea_id,
            "founder": self.name,
            "problem": "Clinics waste 15-20 hours a week reconciling disconnected systems.",
            "solution": "A coordination layer on top of existing clinic systems that \
                         automates the predictable 80% of reconciliation work.",
            "market": "$12B TAM, $2B SAM across 35,000 eligible US clinics",
            "business_model": "SaaS at $200/practitioner/month, LTV/CAC target 9x",
            "go_to_market": "Five pilot clinics, case studies, then association channels.",
            "risks": [
                {
                    "risk": "Integration complexity varies widely across vendors",
                    "severity": "high",
                    "mitigation": "Start with the top three systems covering 60% of market",
                },
                {
                    "risk": "Long healthcare sales cycles",
                    "severity": "medium",
                    "mitigation": "Free pilot program with guaranteed ROI measurement",
                },
            ],
            "roadmap": "MVP and pilots in months 1-3, two case studies by month 6, \
                        50 paying clinics and $200K ARR by month 12.",
            "funding_ask": "$1.5M seed for 18 months of runway",
            "changelog": changelog,
        })
    }

    fn review(&self, idea_id: &str, round: u32) -> serde_json::Value {
        let ready = round >= self.behavior.ready_from_round;
        let score = if ready {
            self.behavior.readiness_score
        } else {
            self.behavior.unready_score
        };
        let issues: Vec<&str> = if ready {
            vec!["Retention assumption still needs supporting data."]
        } else {
            vec![
                "Unit economics assume 3-year retention with no data behind it.",
                "Competitive scan misses newer entrants.",
            ]
        };
        json!({
            "idea_id": idea_id,
            "reviewer": self.name,
            "advisor_role": "market_strategist",
            "readiness_score": score,
            "issues": issues,
            "strength": "Clear problem quantification and a realistic sizing approach.",
            "ready_for_pitch": ready,
        })
    }

    fn deliberation(&self, idea_id: &str, round: u32) -> serde_json::Value {
        let ready = round >= self.behavior.ready_from_round;
        let score = if ready {
            self.behavior.readiness_score
        } else {
            self.behavior.unready_score
        };
        json!({
            "idea_id": idea_id,
            "lead": self.name,
            "summary": "Advisors agree the problem framing is strong; remaining gaps \
                        are retention evidence and the competitive scan.",
            "key_issues": ["Retention assumption unsupported"],
            "ready_for_pitch": ready,
            "readiness_score": score,
        })
    }

    fn pitch(&self, idea_id: &str) -> serde_json::Value {
        json!({
            "idea_id": idea_id,
            "founder": self.name,
            "elevator_pitch": "Clinics lose $150K a year to manual coordination; we \
                               automate 80% of it by learning their workflow patterns.",
            "problem_solution_fit": "Staff copy-paste between 3-5 systems all day; our \
                                     layer watches those workflows and handles them.",
            "traction": "Five pilots onboarded, two LOIs, 35 clinics waitlisted.",
            "the_ask": "$1.5M seed, 18 months runway, 50 clinics by month 12.",
            "why_now": "Interoperability mandates plus labor costs up 22% since 2020.",
        })
    }

    fn decision(&self, idea_id: &str) -> serde_json::Value {
        json!({
            "idea_id": idea_id,
            "investor": self.name,
            "decision": if self.behavior.invest { "invest" } else { "pass" },
            "conviction_score": self.behavior.conviction_score,
            "rationale": "Strong problem definition and favorable timing; integration \
                          dependency is the main execution risk.",
        })
    }
}

#[async_trait]
impl Actor for MockActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn preflight_exempt(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ActorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let subject = self.subject(request);

        let value = match request.kind {
            CallKind::Probe => return Ok("ok".to_string()),
            CallKind::IdeaGeneration { count } => self.ideas(count),
            CallKind::IdeaFeedback => self.feedback(&subject),
            CallKind::IdeaSelection => self.selection(),
            CallKind::PlanBuild => self.plan(&subject, None),
            CallKind::PlanRevision { round } => self.plan(&subject, Some(round)),
            CallKind::PlanReview { round } => self.review(&subject, round),
            CallKind::Deliberation { round } => self.deliberation(&subject, round),
            CallKind::Pitch => self.pitch(&subject),
            CallKind::InvestorDecision => self.decision(&subject),
        };
        Ok(self.render(value))
    }
}
