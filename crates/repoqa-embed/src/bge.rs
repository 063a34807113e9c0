//! Tensor plumbing for BGE-M3: device choice, batched tokenization and
//! masked mean pooling.

use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Device, Tensor};
use tokenizers::Tokenizer;
use tracing::info;

/// XLM-RoBERTa `<pad>` token id.
const PAD_ID: u32 = 1;

pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            info!(device = "metal", "embedding device selected");
            return dev;
        }
    }
    info!(device = "cpu", "embedding device selected");
    Device::Cpu
}

/// Token ids and attention mask for a batch, as `[B, T]` tensors where `T` is
/// the longest encoding in the batch capped at `max_len`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub fn encode_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<EncodedBatch> {
    if texts.is_empty() {
        bail!("cannot encode an empty batch");
    }
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let n = enc.get_ids().len().min(max_len);
        rows.push((enc.get_ids()[..n].to_vec(), enc.get_attention_mask()[..n].to_vec()));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(texts.len() * width);
    let mut mask = Vec::with_capacity(texts.len() * width);
    for (row_ids, row_mask) in rows {
        let pad = width - row_ids.len();
        ids.extend(row_ids.into_iter().chain(std::iter::repeat(PAD_ID).take(pad)));
        mask.extend(row_mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let shape = (texts.len(), width);
    Ok(EncodedBatch {
        input_ids: Tensor::from_vec(ids, shape, device)?,
        attention_mask: Tensor::from_vec(mask, shape, device)?,
        token_type_ids: Tensor::zeros(shape, DType::I64, device)?,
    })
}

/// Average `hidden` (`[B, T, H]`) over the unmasked tokens of each row and
/// scale every row to unit length. Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, width) = match hidden.dims() {
        &[b, _, h] => (b, h),
        other => bail!("hidden state must be [B, T, H], got {other:?}"),
    };
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.clamp(1e-9, f64::MAX)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
    let pooled = mean.broadcast_div(&norms)?;
    if pooled.dims() != [batch, width].as_slice() {
        bail!("pooled shape mismatch: {:?}", pooled.dims());
    }
    Ok(pooled)
}
