use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use repoqa_core::config::RetrievalSettings;
use repoqa_core::{
    ClassifiedIntent, Direction, Document, DocumentStore, Embedder, Error, Intent, Level, Persona, RequestScope,
    Result, ScoredId, SearchBackend,
};
use repoqa_embed::HashingEmbedder;
use repoqa_retrieve::RetrievalOrchestrator;
use repoqa_vector::MemoryStore;

const LABCORE: &str = "kbhalerao/labcore";

enum LevelReply {
    Hits(Vec<(&'static str, f32)>),
    Fail,
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
struct SearchCall {
    level: Level,
    repo_filter: Option<String>,
    k: usize,
}

/// Backend that answers from a per-level script and records every call.
struct ScriptedBackend {
    script: HashMap<Level, LevelReply>,
    calls: Mutex<Vec<SearchCall>>,
}

impl ScriptedBackend {
    fn new(script: impl IntoIterator<Item = (Level, LevelReply)>) -> Arc<Self> {
        Arc::new(Self { script: script.into_iter().collect(), calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, _query_vec: &[f32], level: Level, repo_filter: Option<&str>, k: usize) -> Result<Vec<ScoredId>> {
        self.calls.lock().unwrap().push(SearchCall { level, repo_filter: repo_filter.map(str::to_string), k });
        match self.script.get(&level) {
            None => Ok(Vec::new()),
            Some(LevelReply::Fail) => Err(Error::Search(format!("{level} index unavailable"))),
            Some(LevelReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
            Some(LevelReply::Hits(hits)) => {
                Ok(hits.iter().map(|(id, score)| ScoredId { id: id.to_string(), score: *score }).collect())
            }
        }
    }
}

/// Document map with ids that always fail to fetch.
#[derive(Default)]
struct FixtureStore {
    docs: HashMap<String, Document>,
    broken: HashSet<String>,
}

impl FixtureStore {
    fn with(mut self, doc: Document) -> Self {
        self.docs.insert(doc.id.clone(), doc);
        self
    }

    fn broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }
}

#[async_trait]
impl DocumentStore for FixtureStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        if self.broken.contains(id) {
            return Err(Error::Store(format!("read timeout for {id}")));
        }
        Ok(self.docs.get(id).cloned())
    }
}

/// Records what it was asked to embed.
#[derive(Default)]
struct RecordingEmbedder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    fn dim(&self) -> usize {
        4
    }

    fn max_len(&self) -> usize {
        512
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize {
        4
    }

    fn max_len(&self) -> usize {
        512
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding("model not loaded".into()))
    }
}

fn doc(id: &str, level: Level, repo: &str, parent: Option<&str>) -> Document {
    Document {
        id: id.to_string(),
        level,
        repo_id: repo.to_string(),
        path: Some(format!("labcore/{id}.py")),
        symbol: None,
        content: format!("summary of {id}"),
        parent_id: parent.map(str::to_string),
        children_ids: vec![],
        line_range: None,
        vector: vec![],
    }
}

fn store_for(ids: &[(&str, Level)]) -> FixtureStore {
    ids.iter().fold(FixtureStore::default(), |s, (id, level)| s.with(doc(id, *level, LABCORE, None)))
}

fn intent(intent: Intent, direction: Direction) -> ClassifiedIntent {
    ClassifiedIntent {
        intent,
        direction,
        entities: vec![],
        search_keywords: vec!["sample".into(), "intake".into()],
        repo_scope: None,
    }
}

fn orchestrator(
    backend: Arc<ScriptedBackend>,
    store: FixtureStore,
) -> RetrievalOrchestrator {
    RetrievalOrchestrator::new(
        Arc::new(RecordingEmbedder::default()),
        backend,
        Arc::new(store),
        RetrievalSettings::default(),
    )
}

fn ids(result: &repoqa_core::RetrievalResult) -> Vec<&str> {
    result.results.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn stops_at_first_adequate_level() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("s1", 0.9), ("s2", 0.8), ("s3", 0.3)])),
        (Level::File, LevelReply::Hits(vec![("f1", 0.95)])),
    ]);
    let store = store_for(&[("s1", Level::Symbol), ("s2", Level::Symbol), ("s3", Level::Symbol), ("f1", Level::File)]);
    let result = orchestrator(backend.clone(), store)
        .retrieve("where is parse_upload", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Symbol]);
    assert!(result.adequate);
    assert_eq!(ids(&result), vec!["s1", "s2", "s3"]);
    let levels: Vec<Level> = backend.calls().iter().map(|c| c.level).collect();
    assert_eq!(levels, vec![Level::Symbol], "file level must never be queried");
}

#[tokio::test]
async fn inadequate_first_level_continues_and_accumulates() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("s1", 0.9)])),
        (Level::File, LevelReply::Hits(vec![("f1", 0.7), ("f2", 0.4)])),
    ]);
    let store = store_for(&[("s1", Level::Symbol), ("f1", Level::File), ("f2", Level::File)]);
    let result = orchestrator(backend, store)
        .retrieve("where is parse_upload", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Symbol, Level::File]);
    assert_eq!(ids(&result), vec!["s1", "f1", "f2"]);
    assert_eq!(result.results[0].level, Level::Symbol);
    assert_eq!(result.results[1].level, Level::File);
    assert!(result.adequate);
}

#[tokio::test]
async fn near_misses_from_two_levels_combine_into_adequacy() {
    let backend = ScriptedBackend::new([
        (Level::Module, LevelReply::Hits(vec![("m1", 0.7)])),
        (Level::Repository, LevelReply::Hits(vec![("r1", 0.66)])),
        (Level::File, LevelReply::Hits(vec![("f1", 0.99)])),
    ]);
    let store = store_for(&[("m1", Level::Module), ("r1", Level::Repository), ("f1", Level::File)]);
    let result = orchestrator(backend.clone(), store)
        .retrieve("how is labcore laid out", &intent(Intent::Architecture, Direction::Broad), Persona::Developer, 10)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Module, Level::Repository]);
    assert!(result.adequate);
    assert_eq!(ids(&result), vec!["m1", "r1"]);
}

#[tokio::test]
async fn adequacy_boundary_is_inclusive() {
    let exact = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("a", 0.65), ("b", 0.65)])),
    ]);
    let store = store_for(&[("a", Level::Symbol), ("b", Level::Symbol), ("c", Level::Symbol)]);
    let result = orchestrator(exact, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;
    assert!(result.adequate);
    assert_eq!(result.levels_searched, vec![Level::Symbol]);

    let short = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("a", 0.65), ("c", 0.64)])),
    ]);
    let store = store_for(&[("a", Level::Symbol), ("b", Level::Symbol), ("c", Level::Symbol)]);
    let result = orchestrator(short, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;
    assert!(!result.adequate);
    assert_eq!(result.levels_searched, vec![Level::Symbol, Level::File]);
}

#[tokio::test]
async fn repo_scope_filters_every_level_and_foreign_hits() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("foreign", 0.99), ("s1", 0.7)])),
        (Level::File, LevelReply::Hits(vec![("f1", 0.6)])),
    ]);
    let store = store_for(&[("s1", Level::Symbol), ("f1", Level::File)])
        .with(doc("foreign", Level::Symbol, "someone/else", None));
    let mut scoped = intent(Intent::SpecificLookup, Direction::Specific);
    scoped.repo_scope = Some(LABCORE.to_string());

    let result = orchestrator(backend.clone(), store).retrieve("parse_upload", &scoped, Persona::Developer, 5).await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.repo_filter.as_deref() == Some(LABCORE)));
    assert!(calls.iter().all(|c| c.k == 10));
    assert_eq!(ids(&result), vec!["s1", "f1"]);
    assert!(result.results.iter().all(|r| r.repo_id == LABCORE));
    assert!(!result.adequate);
}

#[tokio::test]
async fn no_hits_anywhere_is_a_valid_empty_result() {
    let backend = ScriptedBackend::new([]);
    let result = orchestrator(backend, FixtureStore::default())
        .retrieve("anything about billing?", &intent(Intent::CapabilityCheck, Direction::Broad), Persona::Sales, 10)
        .await;

    assert!(result.results.is_empty());
    assert_eq!(result.levels_searched, vec![Level::Repository, Level::Module, Level::File]);
    assert!(!result.adequate);
    assert!(result.parent_context.is_none());
}

#[tokio::test]
async fn failing_level_counts_as_empty_and_loop_continues() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Fail),
        (Level::File, LevelReply::Hits(vec![("f1", 0.8), ("f2", 0.7)])),
    ]);
    let store = store_for(&[("f1", Level::File), ("f2", Level::File)]);
    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Symbol, Level::File]);
    assert_eq!(ids(&result), vec!["f1", "f2"]);
    assert!(result.adequate);
}

#[tokio::test]
async fn unresolvable_hits_are_dropped() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("gone", 0.95), ("broken", 0.9), ("s1", 0.8)])),
    ]);
    let store = store_for(&[("s1", Level::Symbol)]).broken("broken");
    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(ids(&result), vec!["s1"]);
    assert!(!result.adequate);
}

#[tokio::test]
async fn duplicates_across_levels_keep_first_occurrence() {
    let backend = ScriptedBackend::new([
        (Level::File, LevelReply::Hits(vec![("shared", 0.6)])),
        (Level::Symbol, LevelReply::Hits(vec![("shared", 0.9), ("s1", 0.5)])),
    ]);
    let store = store_for(&[("shared", Level::File), ("s1", Level::Symbol)]);
    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::CodeExplanation, Direction::Narrow), Persona::Developer, 10)
        .await;

    assert_eq!(result.levels_searched, vec![Level::File, Level::Symbol, Level::Module]);
    assert_eq!(ids(&result), vec!["shared", "s1"]);
    assert_eq!(result.results[0].score, 0.6);
}

#[tokio::test]
async fn results_are_truncated_to_limit_after_sorting() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("a", 0.3), ("b", 0.5), ("c", 0.4)])),
        (Level::File, LevelReply::Hits(vec![("d", 0.6)])),
    ]);
    let store = store_for(&[("a", Level::Symbol), ("b", Level::Symbol), ("c", Level::Symbol), ("d", Level::File)]);
    let result = orchestrator(backend.clone(), store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 2)
        .await;

    assert_eq!(ids(&result), vec!["d", "b"]);
    assert!(backend.calls().iter().all(|c| c.k == 4));
}

#[tokio::test]
async fn limit_below_min_good_still_reports_adequate() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("s1", 0.9), ("s2", 0.8)])),
    ]);
    let store = store_for(&[("s1", Level::Symbol), ("s2", Level::Symbol)]);
    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 1)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Symbol]);
    assert_eq!(ids(&result), vec!["s1"]);
    assert!(result.adequate);
}

#[tokio::test]
async fn non_finite_scores_are_dropped() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("nan", f32::NAN), ("s1", 0.9), ("inf", f32::INFINITY)])),
    ]);
    let store = store_for(&[("nan", Level::Symbol), ("s1", Level::Symbol), ("inf", Level::Symbol)]);
    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(ids(&result), vec!["s1"]);
}

#[tokio::test]
async fn grounding_uses_up_to_three_distinct_parents() {
    let backend = ScriptedBackend::new([(
        Level::Symbol,
        LevelReply::Hits(vec![("s1", 0.9), ("s2", 0.85), ("s3", 0.8), ("s4", 0.75), ("s5", 0.7)]),
    )]);
    let long = "x".repeat(2000);
    let mut parent_a = doc("file_a", Level::File, LABCORE, None);
    parent_a.content = long;
    let mut parent_b = doc("file_b", Level::File, LABCORE, None);
    parent_b.path = None;
    let store = FixtureStore::default()
        .with(doc("s1", Level::Symbol, LABCORE, Some("file_a")))
        .with(doc("s2", Level::Symbol, LABCORE, Some("file_a")))
        .with(doc("s3", Level::Symbol, LABCORE, Some("file_b")))
        .with(doc("s4", Level::Symbol, LABCORE, Some("file_c")))
        .with(doc("s5", Level::Symbol, LABCORE, Some("file_d")))
        .with(parent_a)
        .with(parent_b)
        .with(doc("file_c", Level::File, LABCORE, None))
        .with(doc("file_d", Level::File, LABCORE, None));

    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    let context = result.parent_context.expect("parent context");
    let blocks: Vec<&str> = context.split("\n\n").collect();
    assert_eq!(blocks.len(), 3);
    assert!(blocks[0].starts_with("[file_summary] labcore/file_a.py\n"));
    assert!(blocks[0].len() < 900);
    assert!(blocks[0].ends_with("..."));
    assert_eq!(blocks[1], format!("[file_summary] {LABCORE}\nsummary of file_b"));
    assert_eq!(blocks[2], "[file_summary] labcore/file_c.py\nsummary of file_c");
    assert!(!context.contains("file_d"));
}

#[tokio::test]
async fn failed_parent_fetches_leave_context_absent() {
    let backend = ScriptedBackend::new([(Level::Symbol, LevelReply::Hits(vec![("s1", 0.9), ("s2", 0.8)]))]);
    let mut empty_parent = doc("file_b", Level::File, LABCORE, None);
    empty_parent.content = "   ".into();
    let store = FixtureStore::default()
        .with(doc("s1", Level::Symbol, LABCORE, Some("file_a")))
        .with(doc("s2", Level::Symbol, LABCORE, Some("file_b")))
        .with(empty_parent)
        .broken("file_a");

    let result = orchestrator(backend, store)
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert_eq!(ids(&result), vec!["s1", "s2"]);
    assert!(result.parent_context.is_none());
}

#[tokio::test]
async fn deadline_mid_loop_returns_partial_result() {
    let backend = ScriptedBackend::new([
        (Level::Symbol, LevelReply::Hits(vec![("s1", 0.9)])),
        (Level::File, LevelReply::Hang),
    ]);
    let store = store_for(&[("s1", Level::Symbol)]);
    let scope = RequestScope::with_timeout(Duration::from_millis(100));
    let result = orchestrator(backend.clone(), store)
        .retrieve_scoped("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10, &scope)
        .await;

    assert_eq!(result.levels_searched, vec![Level::Symbol]);
    assert_eq!(ids(&result), vec!["s1"]);
    assert!(!result.adequate);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn cancelled_scope_searches_nothing() {
    let backend = ScriptedBackend::new([(Level::Symbol, LevelReply::Hits(vec![("s1", 0.9)]))]);
    let scope = RequestScope::unbounded();
    scope.cancel();
    let result = orchestrator(backend.clone(), store_for(&[("s1", Level::Symbol)]))
        .retrieve_scoped("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10, &scope)
        .await;

    assert!(result.results.is_empty());
    assert!(result.levels_searched.is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn query_is_expanded_and_embedded_once() {
    let embedder = Arc::new(RecordingEmbedder::default());
    let backend = ScriptedBackend::new([]);
    let orchestrator =
        RetrievalOrchestrator::new(embedder.clone(), backend.clone(), Arc::new(FixtureStore::default()), RetrievalSettings::default());
    orchestrator
        .retrieve("explain intake", &intent(Intent::CapabilityCheck, Direction::Broad), Persona::Sales, 10)
        .await;

    assert_eq!(*embedder.seen.lock().unwrap(), vec!["explain intake sample intake".to_string()]);
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test]
async fn embedding_failure_yields_empty_result() {
    let backend = ScriptedBackend::new([(Level::Symbol, LevelReply::Hits(vec![("s1", 0.9)]))]);
    let orchestrator = RetrievalOrchestrator::new(
        Arc::new(FailingEmbedder),
        backend.clone(),
        Arc::new(store_for(&[("s1", Level::Symbol)])),
        RetrievalSettings::default(),
    );
    let result = orchestrator
        .retrieve("q", &intent(Intent::SpecificLookup, Direction::Specific), Persona::Developer, 10)
        .await;

    assert!(result.results.is_empty());
    assert!(!result.adequate);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn end_to_end_over_memory_store() {
    let embedder = HashingEmbedder::new(64);
    let store = Arc::new(MemoryStore::new());
    let texts = [
        ("labcore", Level::Repository, None, "labcore soil sample laboratory information system"),
        ("labcore/samples", Level::Module, Some("labcore"), "samples module sample intake barcode tracking"),
        ("labcore/samples/intake.py", Level::File, Some("labcore/samples"), "intake view receives sample barcode"),
        ("labcore/billing", Level::Module, Some("labcore"), "billing invoices payments"),
    ];
    let docs: Vec<Document> = texts
        .iter()
        .map(|(id, level, parent, text)| {
            let mut d = doc(id, *level, LABCORE, *parent);
            d.content = text.to_string();
            d.vector = embedder.embed_sync(text);
            d
        })
        .collect();
    store.insert(docs).await;

    let mut settings = RetrievalSettings::default();
    settings.score_threshold = 0.0;
    settings.min_good_results = 1;
    let orchestrator = RetrievalOrchestrator::new(Arc::new(embedder), store.clone(), store, settings);

    let mut classified = intent(Intent::Architecture, Direction::Broad);
    classified.search_keywords = vec!["intake".into(), "barcode".into()];
    let result = orchestrator.retrieve("samples module sample tracking", &classified, Persona::Developer, 5).await;

    assert_eq!(result.levels_searched, vec![Level::Module]);
    assert!(result.adequate);
    assert_eq!(result.results[0].id, "labcore/samples");
    assert!(result.results.iter().all(|r| r.level == Level::Module));
    let context = result.parent_context.expect("repository summary as context");
    assert!(context.starts_with("[repo_summary] labcore/labcore.py"));
}
