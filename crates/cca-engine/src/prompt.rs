//! Coder-prompt assembly (spec §4.8): what changes across iteration 1,
//! continuation, and iterations > 1.

use cca_core::{ArbiterDecision, CriticReview};

pub struct PromptContext<'a> {
    pub task: &'a str,
    pub iteration_number: u32,
    pub is_continuation_start: bool,
    pub prior_decision: Option<&'a ArbiterDecision>,
    pub prior_reviews: &'a [CriticReview],
    pub human_feedback: Option<&'a str>,
    pub forced_cap_notice: bool,
}

pub fn build_coder_prompt(ctx: PromptContext<'_>) -> String {
    let mut sections = Vec::new();

    if let Some(feedback) = ctx.human_feedback {
        sections.push(format!("## Human Feedback to Address\n{feedback}"));
    }

    if ctx.forced_cap_notice {
        sections.push("## Notice\nThe iteration cap was reached; this is a forced arbiter round.".to_string());
    }

    if ctx.iteration_number == 1 && ctx.is_continuation_start {
        sections.push(format!(
            "## Resume Context\nContinuing a previous session. Task: {}",
            ctx.task
        ));
    } else if ctx.iteration_number == 1 {
        sections.push(ctx.task.to_string());
    } else {
        sections.push(ctx.task.to_string());
        if let Some(decision) = ctx.prior_decision {
            if let Some(feedback) = &decision.feedback {
                sections.push(format!("## Previous Arbiter Feedback\n{feedback}"));
            }
            if let Some(issues) = &decision.address_issues {
                sections.push(format!("## Address Issues\n{}", issues.join(", ")));
            }
            if let Some(files) = &decision.focus_files {
                sections.push(format!("## Focus Files\n{}", files.join(", ")));
            }
        }
        for review in ctx.prior_reviews {
            sections.push(format!(
                "## Critic {}: {:?}\n{}",
                review.critic_name, review.verdict, review.message
            ));
        }
    }

    sections.join("\n\n")
}
