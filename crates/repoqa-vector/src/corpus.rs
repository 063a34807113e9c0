//! Pre-indexed corpus files: one JSON-encoded [`Document`] per line.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use repoqa_core::Document;

pub fn read_jsonl(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut docs = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document", path.display(), lineno + 1))?;
        docs.push(doc);
    }
    info!(path = %path.display(), documents = docs.len(), "corpus loaded");
    Ok(docs)
}
