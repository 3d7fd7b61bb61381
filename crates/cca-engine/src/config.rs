//! Tunables for the CCA loop (spec §4.8, §5).

#[derive(Debug, Clone)]
pub struct EngineRunConfig {
    pub max_iterations: u32,
    pub max_tool_loops: u32,
    pub validate_after_coding: bool,
    pub auto_apply_on_consensus: bool,
    pub auto_apply_threshold: f64,
    pub coder_timeout_secs: u64,
    /// `None` means arbiter decisions never time out.
    pub arbiter_timeout_secs: Option<u64>,
}

impl Default for EngineRunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_tool_loops: 50,
            validate_after_coding: true,
            auto_apply_on_consensus: true,
            auto_apply_threshold: 1.0,
            coder_timeout_secs: 120,
            arbiter_timeout_secs: None,
        }
    }
}
