use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

/// Mean of `hidden` `[B,T,H]` over the positions where `attention_mask` `[B,T]` is set.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    if dims.len() != 3 { bail!("hidden shape must be [B,T,H], got {:?}", dims); }
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let masked = hidden.broadcast_mul(&mask.unsqueeze(2)?)?;
    let sum = masked.sum(1)?;
    // all-padding rows pool to zero instead of NaN
    let lengths = mask.sum(1)?.unsqueeze(1)?.maximum(1.0)?;
    Ok(sum.broadcast_div(&lengths)?)
}

/// Row-wise L2 normalization of a `[B,H]` tensor.
pub fn l2_normalize(pooled: &Tensor) -> Result<Tensor> {
    let eps_val = match pooled.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], pooled.device())?.to_dtype(pooled.dtype())?.unsqueeze(0)?;
    let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    Ok(pooled.broadcast_div(&norm)?)
}

pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&masked_mean(hidden, attention_mask)?)
}
