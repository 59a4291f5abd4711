//! Named response contracts.
//!
//! A contract is the structural constraint a parsed actor response must
//! satisfy before it is admitted into the run: required fields, closed
//! enumerations, and numeric ranges. Validation is fail-closed — anything
//! that does not conform is rejected and the retry-validate wrapper decides
//! whether to try again.
//!
//! Closed-enumeration fields are case-folded before validation, recursively
//! through nested objects and arrays, because actors routinely emit "Invest"
//! for "invest". When folding changes a value, the change is logged so a
//! value that is wrong regardless of case remains distinguishable.

use serde_json::Value;
use tracing::warn;

/// Structural constraint for one record kind.
#[derive(Debug)]
pub struct Contract {
    pub name: &'static str,
    /// Fields that must be present and non-null at the top level.
    pub required: &'static [&'static str],
    /// Closed-enumeration fields: (field, allowed values). Checked wherever
    /// the field appears, at any nesting depth.
    pub enums: &'static [(&'static str, &'static [&'static str])],
    /// Numeric range fields: (field, min, max). Checked at any depth.
    pub ranges: &'static [(&'static str, f64, f64)],
}

const SEVERITY: &[&str] = &["low", "medium", "high", "critical"];
const ADVISOR_ROLES: &[&str] = &["market_strategist", "technical_advisor", "financial_advisor"];

pub const IDEA_CARD: Contract = Contract {
    name: "idea_card",
    required: &["idea_id", "title", "summary", "market", "proposer"],
    enums: &[],
    ranges: &[],
};

pub const FEEDBACK: Contract = Contract {
    name: "feedback",
    required: &["idea_id", "reviewer", "score", "strength", "weakness", "suggestion"],
    enums: &[],
    ranges: &[("score", 0.0, 10.0)],
};

pub const SELECTION: Contract = Contract {
    name: "selection",
    required: &["founder", "selected_idea_id", "reasoning", "refined_idea"],
    enums: &[],
    ranges: &[],
};

pub const STARTUP_PLAN: Contract = Contract {
    name: "startup_plan",
    required: &[
        "idea_id",
        "founder",
        "problem",
        "solution",
        "market",
        "business_model",
        "go_to_market",
        "risks",
        "roadmap",
        "funding_ask",
    ],
    enums: &[("severity", SEVERITY)],
    ranges: &[],
};

pub const ADVISOR_REVIEW: Contract = Contract {
    name: "advisor_review",
    required: &[
        "idea_id",
        "reviewer",
        "advisor_role",
        "readiness_score",
        "issues",
        "strength",
        "ready_for_pitch",
    ],
    enums: &[("advisor_role", ADVISOR_ROLES)],
    ranges: &[("readiness_score", 0.0, 10.0)],
};

pub const DELIBERATION: Contract = Contract {
    name: "deliberation",
    required: &[
        "idea_id",
        "lead",
        "summary",
        "key_issues",
        "ready_for_pitch",
        "readiness_score",
    ],
    enums: &[],
    ranges: &[("readiness_score", 0.0, 10.0)],
};

pub const PITCH: Contract = Contract {
    name: "pitch",
    required: &[
        "idea_id",
        "founder",
        "elevator_pitch",
        "problem_solution_fit",
        "traction",
        "the_ask",
        "why_now",
    ],
    enums: &[],
    ranges: &[],
};

pub const INVESTOR_DECISION: Contract = Contract {
    name: "investor_decision",
    required: &["idea_id", "investor", "decision", "conviction_score", "rationale"],
    enums: &[("decision", &["invest", "pass"])],
    ranges: &[("conviction_score", 0.0, 10.0)],
};

/// Case-fold closed-enumeration string fields, recursively.
///
/// Runs before [`validate`]; logs every value it changes.
pub fn normalize(value: &mut Value, contract: &Contract) {
    if contract.enums.is_empty() {
        return;
    }
    normalize_inner(value, contract);
}

fn normalize_inner(value: &mut Value, contract: &Contract) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if contract.enums.iter().any(|(field, _)| field == key) {
                    if let Value::String(s) = child {
                        let folded = s.to_lowercase();
                        if folded != *s {
                            warn!(
                                contract = contract.name,
                                field = %key,
                                from = %s,
                                to = %folded,
                                "case-folded enum value"
                            );
                            *s = folded;
                        }
                    }
                }
                normalize_inner(child, contract);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_inner(item, contract);
            }
        }
        _ => {}
    }
}

/// Check a parsed value against the contract. Returns the first violation.
pub fn validate(value: &Value, contract: &Contract) -> Result<(), String> {
    let Value::Object(map) = value else {
        return Err("expected a JSON object at the top level".to_string());
    };

    for field in contract.required {
        match map.get(*field) {
            None | Some(Value::Null) => {
                return Err(format!("missing required field '{field}'"));
            }
            _ => {}
        }
    }

    check_nested(value, contract)
}

fn check_nested(value: &Value, contract: &Contract) -> Result<(), String> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                for (field, allowed) in contract.enums {
                    if field == key {
                        let Some(s) = child.as_str() else {
                            return Err(format!("field '{key}' must be a string"));
                        };
                        if !allowed.contains(&s) {
                            return Err(format!(
                                "field '{key}' has invalid value '{s}' (allowed: {})",
                                allowed.join(", ")
                            ));
                        }
                    }
                }
                for (field, min, max) in contract.ranges {
                    if field == key {
                        let Some(n) = child.as_f64() else {
                            return Err(format!("field '{key}' must be a number"));
                        };
                        if n < *min || n > *max {
                            return Err(format!(
                                "field '{key}' value {n} outside [{min}, {max}]"
                            ));
                        }
                    }
                }
                check_nested(child, contract)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                check_nested(item, contract)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_decision_passes() {
        let value = json!({
            "idea_id": "a-1",
            "investor": "b",
            "decision": "invest",
            "conviction_score": 7,
            "rationale": "sound",
        });
        assert!(validate(&value, &INVESTOR_DECISION).is_ok());
    }

    #[test]
    fn test_missing_field_rejected() {
        let value = json!({"idea_id": "a-1", "investor": "b"});
        let err = validate(&value, &INVESTOR_DECISION).unwrap_err();
        assert!(err.contains("decision"));
    }

    #[test]
    fn test_null_field_rejected() {
        let value = json!({
            "idea_id": "a-1",
            "investor": "b",
            "decision": null,
            "conviction_score": 7,
            "rationale": "sound",
        });
        assert!(validate(&value, &INVESTOR_DECISION).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(validate(&json!([1, 2]), &INVESTOR_DECISION).is_err());
    }

    #[test]
    fn test_enum_case_folded_then_passes() {
        let mut value = json!({
            "idea_id": "a-1",
            "investor": "b",
            "decision": "Invest",
            "conviction_score": 7,
            "rationale": "sound",
        });
        normalize(&mut value, &INVESTOR_DECISION);
        assert_eq!(value["decision"], "invest");
        assert!(validate(&value, &INVESTOR_DECISION).is_ok());
    }

    #[test]
    fn test_enum_wrong_regardless_of_case_rejected() {
        let mut value = json!({
            "idea_id": "a-1",
            "investor": "b",
            "decision": "Maybe",
            "conviction_score": 7,
            "rationale": "sound",
        });
        normalize(&mut value, &INVESTOR_DECISION);
        let err = validate(&value, &INVESTOR_DECISION).unwrap_err();
        assert!(err.contains("maybe"));
    }

    #[test]
    fn test_nested_enum_normalized() {
        let mut value = json!({
            "idea_id": "a-1",
            "founder": "b",
            "problem": "p", "solution": "s", "market": "m",
            "business_model": "bm", "go_to_market": "gtm",
            "risks": [{"risk": "r", "severity": "HIGH", "mitigation": "m"}],
            "roadmap": "r", "funding_ask": "f",
        });
        normalize(&mut value, &STARTUP_PLAN);
        assert_eq!(value["risks"][0]["severity"], "high");
        assert!(validate(&value, &STARTUP_PLAN).is_ok());
    }

    #[test]
    fn test_range_violation_rejected() {
        let value = json!({
            "idea_id": "a-1",
            "investor": "b",
            "decision": "pass",
            "conviction_score": 12,
            "rationale": "sound",
        });
        let err = validate(&value, &INVESTOR_DECISION).unwrap_err();
        assert!(err.contains("conviction_score"));
    }

    #[test]
    fn test_score_as_integer_accepted() {
        let value = json!({
            "idea_id": "a-1",
            "reviewer": "b",
            "score": 8,
            "strength": "s", "weakness": "w", "suggestion": "g",
        });
        assert!(validate(&value, &FEEDBACK).is_ok());
    }
}
