//! Context Store and Result Processor (spec §4.2): keeps tool outputs
//! small enough to fit in an agent's context while preserving full
//! results for paginated retrieval.

mod pagination;
mod policy;
mod processor;
mod truncate;

pub use pagination::{get_stored_result, ResultPage};
pub use policy::SizePolicy;
pub use processor::{ContextProcessor, ProcessedResult, RawResult};
