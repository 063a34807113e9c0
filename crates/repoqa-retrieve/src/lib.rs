//! Retrieval orchestration over the document hierarchy.
//!
//! The classifier's intent picks a starting level and its direction decides
//! how the search widens or narrows from there. Levels are searched one at a
//! time and the walk stops early once enough good hits have accumulated.

pub mod drilldown;
pub mod grounding;
pub mod orchestrator;
pub mod ranking;

pub use drilldown::{direction_levels, drilldown_path, start_level};
pub use orchestrator::{expand_query, RetrievalOrchestrator};
pub use ranking::{dedup_sorted, finalize, is_adequate};
