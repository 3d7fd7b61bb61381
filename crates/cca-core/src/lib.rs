//! Shared types for the interactive multi-agent coding workflow engine:
//! typed entity IDs, the durable entity shapes every other crate stores
//! or serializes, and the error taxonomy they all return.

pub mod entities;
pub mod error;
pub mod ids;

pub use entities::*;
pub use error::AppError;
pub use ids::*;
