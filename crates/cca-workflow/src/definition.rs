//! A workflow definition: a named, versioned graph of steps (spec §4.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerType {
    OnMessage,
    Manual,
    Scheduled,
}

/// Data enum over the fixed set of step shapes: one type, per-variant
/// behavior, rather than a trait per step kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepType {
    Agent {
        agent_name: String,
        prompt_template: String,
    },
    Condition {
        expression: String,
        on_true: String,
        on_false: String,
    },
    Tool {
        tool_name: String,
        input_template: serde_json::Value,
    },
    Handoff {
        to_agent: String,
    },
    ReviewPanel {
        critic_ids: Vec<String>,
    },
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub step_type: StepType,
    pub edges: Vec<String>,
}

pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
pub const GLOBAL_ITERATION_HARD_CAP: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub is_default: bool,
    pub agent_pool: Vec<String>,
    pub steps: Vec<Step>,
    pub max_iterations: u32,
}

impl WorkflowDefinition {
    pub fn first_step_id(&self) -> Option<&str> {
        self.steps.first().map(|s| s.id.as_str())
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Clamps a configured cap to the global hard ceiling (spec §4.7).
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.min(GLOBAL_ITERATION_HARD_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf-1".into(),
            name: "demo".into(),
            description: "".into(),
            trigger_type: TriggerType::Manual,
            is_default: false,
            agent_pool: vec![],
            steps: vec![
                Step {
                    id: "start".into(),
                    step_type: StepType::Agent {
                        agent_name: "coder".into(),
                        prompt_template: "{{task}}".into(),
                    },
                    edges: vec!["end".into()],
                },
                Step {
                    id: "end".into(),
                    step_type: StepType::End,
                    edges: vec![],
                },
            ],
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    #[test]
    fn first_step_id_is_the_entry_point() {
        assert_eq!(sample().first_step_id(), Some("start"));
    }

    #[test]
    fn effective_max_iterations_clamps_to_global_cap() {
        let mut def = sample();
        def.max_iterations = 5_000;
        assert_eq!(def.effective_max_iterations(), GLOBAL_ITERATION_HARD_CAP);
    }
}
