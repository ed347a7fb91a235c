//! services/api/src/engine/prompts.rs
//!
//! Prompt templates and builders for every oracle call the engine makes.
//! The oracle is an opaque text-to-text function; everything the engine
//! needs back is requested as a single JSON object and parsed defensively
//! in `parse.rs`.

use interview_core::domain::{DepthLevel, Turn};

/// Closing question used when the oracle cannot produce one. The session
/// must always make forward progress, so this is the degraded default for
/// the generation path.
pub const FALLBACK_CLOSING_QUESTION: &str =
    "Looking back over the topics we covered today, which answer would you most like to \
     improve, and what would you change about it?";

const QUESTION_TEMPLATE: &str = r#"You are interviewing a candidate. Produce the next interview question.

CANDIDATE RESUME:
---
{resume}
---

JOB TYPE: {job_type}
INTERVIEWER PERSONA: {persona}
CURRENT DEPTH LEVEL: {depth} (one of: usage, implementation, principle, design, summary)
REMAINING INTERVIEW SECONDS: {remaining}
ROUND NUMBER: {round}

ALREADY COVERED - do not ask about these again:
- technologies: {used_tech}
- project points: {used_projects}

Steer toward unexplored material from the resume. You may hold the current depth
level or advance it; never go shallower.

Reply with a single JSON object:
{"question": "<the question text>",
 "key_points": ["<expected key point>", ...],
 "depth": "<depth level for this question>",
 "skill": "<short skill tag this question probes>"}"#;

const SCORING_TEMPLATE: &str = r#"You are interviewing a candidate. Grade the candidate's answer to one interview question.

INTERVIEWER PERSONA: {persona}
QUESTION ({depth} depth):
{question}

EXPECTED KEY POINTS:
{key_points}

CANDIDATE ANSWER:
{answer}

Score each dimension from 0 to 5. If the interview should end early (for example
the candidate clearly has nothing further to give on this track), set "stop_reason"
to a short snake_case token; otherwise use null.

Reply with a single JSON object:
{"tech": <0-5>, "logic": <0-5>, "clarity": <0-5>, "depth": <0-5>,
 "feedback": "<2-3 sentences of feedback>",
 "matched_points": ["<key point the answer actually covered>", ...],
 "stop_reason": null}"#;

const BANK_CANDIDATE_TEMPLATE: &str = r#"You are interviewing candidates for the job type "{job_type}".
Produce one reusable interview question probing the skill "{skill}" at the
"{depth}" depth level. It must differ from these existing questions:
{existing}

Reply with a single JSON object:
{"question": "<the question text>", "key_points": ["<expected key point>", ...]}"#;

const REPORT_SECTION_TEMPLATE: &str = r#"You are writing one section of a candidate growth report after a mock interview.

SECTION: {section}
JOB TYPE: {job_type}
DIMENSION AVERAGES: tech {tech:.1}, logic {logic:.1}, clarity {clarity:.1}, depth {depth:.1}, overall {total:.1}

INTERVIEW TRANSCRIPT:
{transcript}

Write the "{section}" section as plain prose, two to four paragraphs, addressed
directly to the candidate. Do not repeat the raw transcript."#;

fn join_or_none(items: impl IntoIterator<Item = String>) -> String {
    let joined = items.into_iter().collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

/// Context snapshot handed to the question-generation prompt. Copied out of
/// the session under its lock so no lock is held across the oracle call.
pub struct QuestionContext {
    pub resume_text: String,
    pub job_type_name: String,
    pub persona: String,
    pub depth: DepthLevel,
    pub remaining_seconds: u64,
    pub round_number: u32,
    pub used_tech_items: Vec<String>,
    pub used_project_points: Vec<String>,
}

pub fn build_question_prompt(ctx: &QuestionContext) -> String {
    QUESTION_TEMPLATE
        .replace("{resume}", &ctx.resume_text)
        .replace("{job_type}", &ctx.job_type_name)
        .replace("{persona}", &ctx.persona)
        .replace("{depth}", ctx.depth.as_str())
        .replace("{remaining}", &ctx.remaining_seconds.to_string())
        .replace("{round}", &ctx.round_number.to_string())
        .replace("{used_tech}", &join_or_none(ctx.used_tech_items.clone()))
        .replace(
            "{used_projects}",
            &join_or_none(ctx.used_project_points.clone()),
        )
}

pub fn build_scoring_prompt(persona: &str, turn: &Turn, answer: &str) -> String {
    let key_points = if turn.expected_key_points.is_empty() {
        "- (none recorded)".to_string()
    } else {
        turn.expected_key_points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    };
    SCORING_TEMPLATE
        .replace("{persona}", persona)
        .replace("{depth}", turn.depth_level.as_str())
        .replace("{question}", &turn.question_text)
        .replace("{key_points}", &key_points)
        .replace("{answer}", answer)
}

pub fn build_bank_candidate_prompt(
    skill_tag: &str,
    depth: DepthLevel,
    job_type_name: &str,
    existing: &[String],
) -> String {
    let existing_list = if existing.is_empty() {
        "- (none yet)".to_string()
    } else {
        existing
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    };
    BANK_CANDIDATE_TEMPLATE
        .replace("{job_type}", job_type_name)
        .replace("{skill}", skill_tag)
        .replace("{depth}", depth.as_str())
        .replace("{existing}", &existing_list)
}

/// The four growth-report sections, produced one oracle call (and one cache
/// chunk) each.
pub const REPORT_SECTIONS: &[&str] = &[
    "Overall performance summary",
    "Dimension-by-dimension analysis",
    "Answer-by-answer review",
    "Improvement plan",
];

pub fn build_report_section_prompt(
    section: &str,
    job_type_name: &str,
    aggregate: &interview_core::scoring::SessionAggregate,
    turns: &[Turn],
) -> String {
    let transcript = turns
        .iter()
        .map(|t| {
            format!(
                "Q{} ({}): {}\nA: {}\nFeedback: {}",
                t.round_number,
                t.depth_level.as_str(),
                t.question_text,
                t.answer_text.as_deref().unwrap_or("(unanswered)"),
                t.feedback_text.as_deref().unwrap_or("(none)"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    REPORT_SECTION_TEMPLATE
        .replace("{section}", section)
        .replace("{job_type}", job_type_name)
        .replace("{tech:.1}", &format!("{:.1}", aggregate.tech))
        .replace("{logic:.1}", &format!("{:.1}", aggregate.logic))
        .replace("{clarity:.1}", &format!("{:.1}", aggregate.clarity))
        .replace("{depth:.1}", &format!("{:.1}", aggregate.depth))
        .replace("{total:.1}", &format!("{:.1}", aggregate.total))
        .replace("{transcript}", &transcript)
}
