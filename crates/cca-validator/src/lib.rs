//! Validator Plugin Contract (spec §4.6): the engine depends only on this
//! `validate`/`list_validators` shape. Real pipelines are out of scope;
//! [`examples`] ships scaffolding validators so the engine is exercisable
//! on its own.

pub mod examples;
mod pipeline;
mod summary;

pub use examples::{NonEmptyFileValidator, PassthroughAiValidator};
pub use pipeline::{ValidationContext, ValidationTrigger, ValidatorPipeline};
pub use summary::{ValidationResult, ValidationStatus, ValidationSummary};
