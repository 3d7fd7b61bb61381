//! Config validation (grounded on `csa-config::validate`): collects every
//! violation instead of failing on the first one, the same shape as the
//! teacher's per-section `validate_*` checks.

use crate::EngineConfig;
use cca_core::AppError;

pub fn validate_engine_config(config: &EngineConfig) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if config.engine.max_iterations == 0 {
        errors.push("engine.max_iterations must be > 0".to_string());
    }
    if config.engine.max_tool_loops == 0 {
        errors.push("engine.max_tool_loops must be > 0".to_string());
    }
    if !(0.0..=1.0).contains(&config.engine.auto_apply_threshold) {
        errors.push(format!(
            "engine.auto_apply_threshold ({}) must be within [0.0, 1.0]",
            config.engine.auto_apply_threshold
        ));
    }
    if config.engine.coder_timeout_secs == 0 {
        errors.push("engine.coder_timeout_secs must be > 0".to_string());
    }
    if config.size_policy.file_read_chars == 0 {
        errors.push("size_policy.file_read_chars must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(errors))
    }
}
