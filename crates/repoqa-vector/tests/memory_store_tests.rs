use std::io::Write;

use repoqa_core::{Document, DocumentStore, Level, LineRange, SearchBackend};
use repoqa_vector::{corpus, MemoryStore};

fn doc(id: &str, level: Level, repo: &str, vector: Vec<f32>) -> Document {
    Document {
        id: id.to_string(),
        level,
        repo_id: repo.to_string(),
        path: Some(format!("src/{id}.py")),
        symbol: None,
        content: format!("summary of {id}"),
        parent_id: None,
        children_ids: vec![],
        line_range: None,
        vector,
    }
}

#[tokio::test]
async fn search_is_scoped_to_level_and_repo() {
    let store = MemoryStore::new();
    store
        .insert(vec![
            doc("a", Level::Symbol, "kbhalerao/labcore", vec![1.0, 0.0]),
            doc("b", Level::Symbol, "other/repo", vec![1.0, 0.0]),
            doc("c", Level::File, "kbhalerao/labcore", vec![1.0, 0.0]),
            doc("d", Level::Symbol, "kbhalerao/labcore", vec![0.0, 1.0]),
        ])
        .await;

    let hits = store.search(&[1.0, 0.0], Level::Symbol, Some("kbhalerao/labcore"), 10).await.expect("search");
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d"]);
    assert!(hits[0].score > hits[1].score);

    let unscoped = store.search(&[1.0, 0.0], Level::Symbol, None, 10).await.expect("search");
    assert_eq!(unscoped.len(), 3);
}

#[tokio::test]
async fn search_respects_k() {
    let store = MemoryStore::new();
    store.insert((0..5).map(|i| doc(&format!("s{i}"), Level::Module, "r", vec![1.0, i as f32]))).await;
    let hits = store.search(&[1.0, 0.0], Level::Module, None, 2).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "s0");
}

#[tokio::test]
async fn get_returns_none_for_unknown_id() {
    let store = MemoryStore::new();
    store.insert(vec![doc("a", Level::File, "r", vec![1.0])]).await;
    assert!(store.get("missing").await.expect("get").is_none());
    assert_eq!(store.get("a").await.expect("get").expect("present").id, "a");
}

#[test]
fn corpus_reads_jsonl_and_skips_blank_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut d = doc("sym-1", Level::Symbol, "kbhalerao/labcore", vec![0.5, 0.5]);
    d.line_range = Some(LineRange { start: 10, end: 42 });
    d.parent_id = Some("file-1".to_string());
    writeln!(file, "{}", serde_json::to_string(&d).unwrap()).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"id":"file-1","level":"file","repo_id":"kbhalerao/labcore","content":"file summary","children_ids":["sym-1"]}}"#).unwrap();

    let docs = corpus::read_jsonl(file.path()).expect("read");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0], d);
    assert_eq!(docs[1].children_ids, vec!["sym-1".to_string()]);
    assert!(docs[1].vector.is_empty());
}

#[test]
fn corpus_reports_bad_line_number() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{\"id\": 3}}").unwrap();
    let err = corpus::read_jsonl(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains(":1:"), "error names the line: {err:#}");
}
