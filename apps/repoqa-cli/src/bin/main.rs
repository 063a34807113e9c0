use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repoqa_core::config::{resolve_with_base, Config, Settings};
use repoqa_core::{ClassifiedIntent, Persona, RequestScope};
use repoqa_embed::get_default_embedder;
use repoqa_intent::{Classification, IntentClassifier, OpenAiToolClient};
use repoqa_retrieve::RetrievalOrchestrator;
use repoqa_vector::{corpus, table::open_db, HierarchyWriter, LanceHierarchyStore};

const USAGE: &str = "Usage:
  repoqa load <corpus.jsonl>
  repoqa ask \"<query>\" [--persona developer|sales] [--limit N] [--repo OWNER/NAME] [--timeout SECS] [--json]";

struct AskArgs {
    query: String,
    persona: Persona,
    limit: Option<usize>,
    repo: Option<String>,
    timeout: Option<Duration>,
    json: bool,
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1).map(String::as_str).ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn parse_ask(args: &[String]) -> anyhow::Result<AskArgs> {
    let query = args.first().filter(|q| !q.starts_with("--")).cloned().ok_or_else(|| anyhow!("ask requires a query"))?;
    let mut parsed = AskArgs { query, persona: Persona::Developer, limit: None, repo: None, timeout: None, json: false };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--persona" => { parsed.persona = flag_value(args, i, "--persona")?.parse()?; i += 1; }
            "--limit" => { parsed.limit = Some(flag_value(args, i, "--limit")?.parse().context("--limit requires a number")?); i += 1; }
            "--repo" => { parsed.repo = Some(flag_value(args, i, "--repo")?.to_string()); i += 1; }
            "--timeout" => {
                let secs: u64 = flag_value(args, i, "--timeout")?.parse().context("--timeout requires whole seconds")?;
                parsed.timeout = Some(Duration::from_secs(secs));
                i += 1;
            }
            "--json" => parsed.json = true,
            other => return Err(anyhow!("unknown argument: {other}")),
        }
        i += 1;
    }
    Ok(parsed)
}

/// A `--repo` flag replaces whatever scope the classifier chose.
fn with_repo_scope(classified: ClassifiedIntent, repo: Option<String>) -> ClassifiedIntent {
    match repo {
        Some(repo) => ClassifiedIntent { repo_scope: Some(repo), ..classified },
        None => classified,
    }
}

fn lancedb_uri(settings: &Settings) -> anyhow::Result<String> {
    let cwd = env::current_dir()?;
    let path: PathBuf = resolve_with_base(&cwd, &settings.data.lancedb_dir);
    Ok(path.to_string_lossy().into_owned())
}

async fn load(settings: &Settings, corpus_path: &str) -> anyhow::Result<()> {
    let docs = corpus::read_jsonl(&PathBuf::from(corpus_path))?;
    let dim = docs.first().map(|d| d.vector.len()).ok_or_else(|| anyhow!("{corpus_path} contains no documents"))?;
    let conn = open_db(&lancedb_uri(settings)?).await?;
    let writer = HierarchyWriter::new(conn, &settings.data.table, dim)?;
    let written = writer.write(&docs).await?;
    println!("✅ Loaded {} documents into table '{}'", written, settings.data.table);
    Ok(())
}

async fn ask(settings: &Settings, args: AskArgs) -> anyhow::Result<()> {
    let conn = open_db(&lancedb_uri(settings)?).await?;
    let store = Arc::new(LanceHierarchyStore::new(conn, &settings.data.table));
    let embedder = get_default_embedder(&settings.embed)?;
    let classifier =
        IntentClassifier::new(Arc::new(OpenAiToolClient::from_settings(&settings.llm)), settings.classifier.clone());
    let orchestrator = RetrievalOrchestrator::new(embedder, store.clone(), store, settings.retrieval.clone());

    let scope = args.timeout.map(RequestScope::with_timeout).unwrap_or_default();
    let classification = classifier.classify_scoped(&args.query, args.persona, &[], &scope).await;
    if let Classification::Fallback { reason, .. } = &classification {
        info!(%reason, "using default classification");
    }
    let fell_back = classification.is_fallback();
    let intent = with_repo_scope(classification.into_intent(), args.repo);

    let limit = args.limit.unwrap_or(settings.retrieval.default_limit);
    let result = orchestrator.retrieve_scoped(&args.query, &intent, args.persona, limit, &scope).await;

    if args.json {
        let out = serde_json::json!({ "intent": intent, "fallback": fell_back, "retrieval": result });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("🔍 {}", args.query);
    println!(
        "intent={}{} direction={} repo={}",
        intent.intent,
        if fell_back { " (default)" } else { "" },
        intent.direction.as_str(),
        intent.repo_scope.as_deref().unwrap_or("*")
    );
    println!("keywords: {}", intent.search_keywords.join(", "));
    let levels: Vec<&str> = result.levels_searched.iter().map(|l| l.as_str()).collect();
    println!("levels searched: {}  adequate: {}", levels.join(" → "), result.adequate);
    if result.results.is_empty() {
        println!("\nNo matching documents found.");
    }
    for (i, r) in result.results.iter().enumerate() {
        let location = r.path.as_deref().unwrap_or(&r.repo_id);
        let symbol = r.symbol.as_deref().map(|s| format!("::{s}")).unwrap_or_default();
        println!("\n  {}. score={:.4}  [{}] {}{}", i + 1, r.score, r.level, location, symbol);
        let preview: String = r.content.chars().take(200).collect();
        println!("     {}", preview.replace('\n', " "));
    }
    if let Some(context) = &result.parent_context {
        println!("\n--- parent context ---\n{context}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    let settings = Config::load()?.settings()?;

    match cmd.as_str() {
        "load" => {
            let path = args.first().ok_or_else(|| anyhow!("load requires a corpus path\n{USAGE}"))?;
            load(&settings, path).await
        }
        "ask" => ask(&settings, parse_ask(&args)?).await,
        _ => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
    }
}
