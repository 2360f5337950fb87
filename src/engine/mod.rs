//! Retrieval-plus-LLM category selection.
//!
//! Per (subject, marketplace): keyword retrieval over the marketplace catalog,
//! candidate pool construction, prompt compilation, one model call, and
//! validation of the model's answer against the catalog.

pub mod candidates;
pub mod extract;
pub mod mapper;
pub mod prompt;
pub mod retrieval;

pub use extract::CandidatePolicy;
pub use mapper::{Mapper, MapperSettings};
