//! Domain types shared by the classifier, the orchestrator and the stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type DocId = String;

/// A granularity in the document hierarchy.
///
/// Each level is stored under its own doc-type string (see [`Level::doc_type`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Symbol,
    File,
    Module,
    Repository,
    Document,
    Specification,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Symbol,
        Level::File,
        Level::Module,
        Level::Repository,
        Level::Document,
        Level::Specification,
    ];

    /// The doc-type value the ingestion pipeline writes for this level.
    pub fn doc_type(self) -> &'static str {
        match self {
            Level::Symbol => "symbol_summary",
            Level::File => "file_summary",
            Level::Module => "module_summary",
            Level::Repository => "repo_summary",
            Level::Document => "document",
            Level::Specification => "specification",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Symbol => "symbol",
            Level::File => "file",
            Level::Module => "module",
            Level::Repository => "repository",
            Level::Document => "document",
            Level::Specification => "specification",
        }
    }

    pub fn from_doc_type(doc_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.doc_type() == doc_type)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s || l.doc_type() == s)
            .ok_or_else(|| Error::NotFound(format!("level '{s}'")))
    }
}

/// What kind of question the query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CodeExplanation,
    Architecture,
    ImpactAnalysis,
    SpecificLookup,
    DocumentationLookup,
    CapabilityCheck,
    ProposalDraft,
    ExperienceSummary,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::CodeExplanation,
        Intent::Architecture,
        Intent::ImpactAnalysis,
        Intent::SpecificLookup,
        Intent::DocumentationLookup,
        Intent::CapabilityCheck,
        Intent::ProposalDraft,
        Intent::ExperienceSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::CodeExplanation => "code_explanation",
            Intent::Architecture => "architecture",
            Intent::ImpactAnalysis => "impact_analysis",
            Intent::SpecificLookup => "specific_lookup",
            Intent::DocumentationLookup => "documentation_lookup",
            Intent::CapabilityCheck => "capability_check",
            Intent::ProposalDraft => "proposal_draft",
            Intent::ExperienceSummary => "experience_summary",
        }
    }

    /// One-line description offered to the classification service.
    pub fn describe(self) -> &'static str {
        match self {
            Intent::CodeExplanation => "how a piece of code works",
            Intent::Architecture => "how the system or a module is structured",
            Intent::ImpactAnalysis => "what is affected by changing something",
            Intent::SpecificLookup => "where a named function, class or constant lives",
            Intent::DocumentationLookup => "what the written documentation says",
            Intent::CapabilityCheck => "whether we have built something like this",
            Intent::ProposalDraft => "material for a proposal or pitch",
            Intent::ExperienceSummary => "a summary of past work in an area",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "code_explanation" => Ok(Intent::CodeExplanation),
            "architecture" => Ok(Intent::Architecture),
            "impact_analysis" => Ok(Intent::ImpactAnalysis),
            "specific_lookup" => Ok(Intent::SpecificLookup),
            "documentation_lookup" => Ok(Intent::DocumentationLookup),
            "capability_check" => Ok(Intent::CapabilityCheck),
            "proposal_draft" => Ok(Intent::ProposalDraft),
            "experience_summary" => Ok(Intent::ExperienceSummary),
            _ => Err(Error::NotFound(format!("intent '{s}'"))),
        }
    }
}

/// How broadly the answer should range over the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Broad,
    Narrow,
    Specific,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Broad, Direction::Narrow, Direction::Specific];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Broad => "broad",
            Direction::Narrow => "narrow",
            Direction::Specific => "specific",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broad" => Ok(Direction::Broad),
            "narrow" => Ok(Direction::Narrow),
            "specific" => Ok(Direction::Specific),
            other => Err(Error::NotFound(format!("direction '{other}'"))),
        }
    }
}

/// The caller-declared role. Restricts which intents classification may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Developer,
    #[serde(alias = "capability")]
    Sales,
}

const DEVELOPER_INTENTS: &[Intent] = &[
    Intent::CodeExplanation,
    Intent::Architecture,
    Intent::ImpactAnalysis,
    Intent::SpecificLookup,
    Intent::DocumentationLookup,
];

const SALES_INTENTS: &[Intent] = &[
    Intent::CapabilityCheck,
    Intent::ProposalDraft,
    Intent::ExperienceSummary,
    Intent::Architecture,
    Intent::DocumentationLookup,
];

impl Persona {
    pub fn permitted_intents(self) -> &'static [Intent] {
        match self {
            Persona::Developer => DEVELOPER_INTENTS,
            Persona::Sales => SALES_INTENTS,
        }
    }

    pub fn is_valid_for(self, intent: Intent) -> bool {
        self.permitted_intents().contains(&intent)
    }

    /// Intent used when classification fails or returns something unusable.
    pub fn default_intent(self) -> Intent {
        match self {
            Persona::Developer => Intent::CodeExplanation,
            Persona::Sales => Intent::CapabilityCheck,
        }
    }

    pub fn default_direction(self) -> Direction {
        match self {
            Persona::Developer => Direction::Narrow,
            Persona::Sales => Direction::Broad,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Developer => "developer",
            Persona::Sales => "sales",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "developer" | "dev" => Ok(Persona::Developer),
            "sales" | "capability" => Ok(Persona::Sales),
            other => Err(Error::NotFound(format!("persona '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One prior message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Result of classifying one query. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIntent {
    pub intent: Intent,
    pub direction: Direction,
    pub entities: Vec<String>,
    pub search_keywords: Vec<String>,
    pub repo_scope: Option<String>,
}

/// Inclusive 1-based line span into the original source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// A stored unit of the hierarchy as returned by the document store.
///
/// - `content`: the summary text that was embedded and is shown to the generator
/// - `parent_id` / `children_ids`: links one level up / down the hierarchy
/// - `vector`: may be empty when the store does not hand embeddings back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub level: Level,
    pub repo_id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<DocId>,
    #[serde(default)]
    pub children_ids: Vec<DocId>,
    #[serde(default)]
    pub line_range: Option<LineRange>,
    #[serde(default)]
    pub vector: Vec<f32>,
}

/// What a search backend returns for one level: an id and a relevance score.
/// Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: DocId,
    pub score: f32,
}

/// A single hit, resolved against the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocId,
    pub level: Level,
    pub repo_id: String,
    pub path: Option<String>,
    pub symbol: Option<String>,
    pub content: String,
    pub score: f32,
    pub parent_id: Option<DocId>,
    pub children_ids: Vec<DocId>,
    pub line_range: Option<LineRange>,
}

impl SearchResult {
    pub fn from_document(doc: Document, score: f32) -> Self {
        Self {
            id: doc.id,
            level: doc.level,
            repo_id: doc.repo_id,
            path: doc.path,
            symbol: doc.symbol,
            content: doc.content,
            score,
            parent_id: doc.parent_id,
            children_ids: doc.children_ids,
            line_range: doc.line_range,
        }
    }
}

/// Aggregate output of one retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub results: Vec<SearchResult>,
    pub levels_searched: Vec<Level>,
    pub adequate: bool,
    pub parent_context: Option<String>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self { results: Vec::new(), levels_searched: Vec::new(), adequate: false, parent_context: None }
    }
}
