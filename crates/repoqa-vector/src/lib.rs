//! Storage backends for the document hierarchy: a LanceDB table for real
//! corpora and an in-memory map for tests.

pub mod corpus;
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::MemoryStore;
pub use search::LanceHierarchyStore;
pub use writer::HierarchyWriter;
