#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod scope;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use scope::RequestScope;
pub use traits::{DocumentStore, Embedder, InferenceRequest, IntentInference, SearchBackend, ToolSchema};
pub use types::{
    ClassifiedIntent, DocId, Direction, Document, Intent, Level, LineRange, Persona, RetrievalResult,
    Role, ScoredId, SearchResult, Turn,
};
