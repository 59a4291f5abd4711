//! Prompt templates for every engine call.
//!
//! Templates are filled with JSON-serialized records. Wording here is not
//! load-bearing: canned actors select responses by the typed call tag, and
//! live actors are only held to the response contracts.

use crate::record::AdvisorRole;

/// Bump on any template content change, for tracing which prompt version
/// produced a given response.
pub const PROMPT_VERSION: &str = "1.0.0";

pub fn founder_system(name: &str) -> String {
    format!(
        "You are {name}, a startup founder in an incubator program. \
         Respond with a single JSON object and nothing else."
    )
}

pub fn advisor_system(name: &str, role: AdvisorRole) -> String {
    format!(
        "You are {name}, acting as a {} in an incubator program. {} \
         Respond with a single JSON object and nothing else.",
        role.display(),
        role.brief()
    )
}

pub fn investor_system(name: &str) -> String {
    format!(
        "You are {name}, a seed-stage investor evaluating incubator pitches. \
         Respond with a single JSON object and nothing else."
    )
}

pub fn ideation(name: &str, count: usize, sector_focus: &str) -> String {
    let sector = if sector_focus.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nSECTOR FOCUS: all {count} ideas must be in or closely related to \
             the \"{sector_focus}\" sector. Explore different angles, business \
             models, and customer segments within it."
        )
    };
    format!(
        "Propose {count} diverse startup ideas. Return a JSON object with an \
         \"ideas\" array; each idea has fields: idea_id (format \"{name}-idea-N\"), \
         title, summary, market, proposer (your name, \"{name}\").{sector}"
    )
}

pub fn idea_feedback(reviewer: &str, idea_json: &str) -> String {
    format!(
        "Review this startup idea critically:\n\n{idea_json}\n\n\
         Return a JSON object with fields: idea_id (copied from the idea), \
         reviewer (\"{reviewer}\"), score (0-10), strength, weakness, suggestion."
    )
}

pub fn selection(founder: &str, ideas_json: &str, feedback_json: &str) -> String {
    format!(
        "These are your ideas:\n\n{ideas_json}\n\n\
         This is the feedback each received, grouped by idea:\n\n{feedback_json}\n\n\
         Pick the single best idea to pursue. Return a JSON object with fields: \
         founder (\"{founder}\"), selected_idea_id, reasoning, and refined_idea \
         (the chosen idea improved with the feedback, same fields as an idea)."
    )
}

pub fn plan_build(idea_json: &str) -> String {
    format!(
        "Build a complete startup plan for your selected idea:\n\n{idea_json}\n\n\
         Return a JSON object with fields: idea_id, founder, problem, solution, \
         market, business_model, go_to_market, risks (array of {{risk, severity \
         one of low|medium|high|critical, mitigation}}), roadmap, funding_ask, \
         changelog (empty array for this initial version)."
    )
}

pub fn advisor_review(
    plan_json: &str,
    previous_feedback_json: Option<&str>,
    changelog_json: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Review this startup plan from your advisory perspective:\n\n{plan_json}\n"
    );
    if let Some(prev) = previous_feedback_json {
        prompt.push_str(&format!(
            "\nPREVIOUS FEEDBACK YOU GAVE (check whether it was addressed; do not \
             repeat an issue that has been resolved):\n{prev}\n"
        ));
    }
    if let Some(changelog) = changelog_json {
        prompt.push_str(&format!(
            "\nFOUNDER'S CHANGELOG FROM THE LAST REVISION:\n{changelog}\n"
        ));
    }
    prompt.push_str(
        "\nReturn a JSON object with fields: idea_id, reviewer, advisor_role, \
         readiness_score (0-10), issues (array of strings), strength, \
         ready_for_pitch (boolean).",
    );
    prompt
}

pub fn deliberation(reviews_json: &str) -> String {
    format!(
        "As lead advisor this round, synthesize the panel's reviews into one \
         compact verdict:\n\n{reviews_json}\n\n\
         Return a JSON object with fields: idea_id, lead, summary, key_issues \
         (array of strings), ready_for_pitch (boolean), readiness_score (0-10)."
    )
}

pub fn plan_revision(round: u32, plan_json: &str, input_json: &str) -> String {
    format!(
        "You are iterating on your startup plan (revision round {round}). \
         Current plan:\n\n{plan_json}\n\n\
         Advisor input from this round:\n\n{input_json}\n\n\
         Return the full revised plan as a JSON object (same fields as before), \
         appending a changelog entry describing what you changed and why."
    )
}

pub fn pitch(plan_json: &str) -> String {
    format!(
        "Turn your final startup plan into a seed pitch:\n\n{plan_json}\n\n\
         Return a JSON object with fields: idea_id, founder, elevator_pitch, \
         problem_solution_fit, traction, the_ask, why_now."
    )
}

pub fn investor_eval(pitch_json: &str, plan_json: &str) -> String {
    format!(
        "Evaluate this seed pitch and its underlying plan:\n\n\
         PITCH:\n{pitch_json}\n\nPLAN:\n{plan_json}\n\n\
         Return a JSON object with fields: idea_id, investor, decision \
         (\"invest\" or \"pass\"), conviction_score (0-10), rationale."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideation_includes_sector_only_when_set() {
        let without = ideation("a", 5, "");
        assert!(!without.contains("SECTOR FOCUS"));
        let with = ideation("a", 5, "Fintech");
        assert!(with.contains("SECTOR FOCUS"));
        assert!(with.contains("Fintech"));
    }

    #[test]
    fn test_advisor_review_sections_are_optional() {
        let bare = advisor_review("{}", None, None);
        assert!(!bare.contains("PREVIOUS FEEDBACK"));
        let full = advisor_review("{}", Some("[...]"), Some("[\"entry\"]"));
        assert!(full.contains("PREVIOUS FEEDBACK"));
        assert!(full.contains("CHANGELOG"));
    }
}
