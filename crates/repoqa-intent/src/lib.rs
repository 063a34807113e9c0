//! Intent classification: which kind of question is this, how widely should
//! it be answered, and which keywords should expand it before embedding.

pub mod classifier;
pub mod openai;
pub mod prompt;
pub mod validate;

pub use classifier::IntentClassifier;
pub use openai::OpenAiToolClient;
pub use validate::{Classification, FallbackReason};
