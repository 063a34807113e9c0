//! Query embedding providers.
//!
//! [`EmbeddingModel`] runs BGE-M3 locally through candle. [`HashingEmbedder`]
//! is a deterministic stand-in used for tests and offline runs; select it with
//! `APP_USE_FAKE_EMBEDDINGS=1` or `embed.use_fake = true`.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, Tensor, DType};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use repoqa_core::config::{expand_path, EmbedSettings};
use repoqa_core::{Embedder, Error};

pub mod bge;

pub use bge::masked_mean_l2;

pub const EMBEDDING_DIM: usize = 1024;
const MAX_LEN: usize = 256;

struct ModelInner { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device }

/// BGE-M3 (XLM-RoBERTa) with masked mean pooling and L2 normalization.
#[derive(Clone)]
pub struct EmbeddingModel { inner: Arc<ModelInner> }

impl EmbeddingModel {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = bge::select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { inner: Arc::new(ModelInner { model, tokenizer, device }) })
    }

    /// Embed a batch in one forward pass. Rows come back in input order.
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let inner = &self.inner;
        let batch = bge::encode_batch(&inner.tokenizer, texts, MAX_LEN, &inner.device)?;
        let hidden = inner.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(bad) = rows.iter().find(|r| r.len() != EMBEDDING_DIM) {
            return Err(anyhow!("expected {} dims, got {}", EMBEDDING_DIM, bad.len()));
        }
        let elapsed = start.elapsed().as_millis();
        debug!(texts = texts.len(), elapsed_ms = elapsed as u64, "batch embedded");
        if elapsed > 100 * texts.len() as u128 { warn!(elapsed_ms = elapsed as u64, "slow embedding"); }
        Ok(rows)
    }
}

#[async_trait]
impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { EMBEDDING_DIM }
    fn max_len(&self) -> usize { MAX_LEN }

    async fn embed_batch(&self, texts: &[String]) -> repoqa_core::Result<Vec<Vec<f32>>> {
        let model = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed_texts(&texts))
            .await
            .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

/// Feature-hashing embedder: each whitespace token bumps one dimension.
/// Deterministic, L2-normalized, and free of model files.
pub struct HashingEmbedder { dim: usize }

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    async fn embed_batch(&self, texts: &[String]) -> repoqa_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

/// Pick the embedder for this process: the hashing fake when requested via
/// settings or `APP_USE_FAKE_EMBEDDINGS`, otherwise the local BGE-M3 model.
pub fn get_default_embedder(settings: &EmbedSettings) -> Result<Arc<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake || env_fake {
        debug!("using HashingEmbedder");
        return Ok(Arc::new(HashingEmbedder::new(EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Arc::new(EmbeddingModel::load(&dir)?))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured.map(expand_path).into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain([PathBuf::from("../models/bge-m3"), PathBuf::from("models/bge-m3")]);
    for p in candidates {
        if p.exists() { debug!(dir = %p.display(), "model directory resolved"); return Ok(p); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
