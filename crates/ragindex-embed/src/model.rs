use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragindex_core::error::Error;
use ragindex_core::traits::Embedder;

use crate::descriptor::{write_descriptor, EmbedderDescriptor};
use crate::device::select_device;
use crate::pool::{masked_mean, masked_mean_l2};
use crate::tokenize::tokenize_batch;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

enum Backbone {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

impl Backbone {
    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor, token_type_ids: &Tensor) -> Result<Tensor> {
        let hidden = match self {
            Backbone::Bert(m) => m.forward(input_ids, token_type_ids, Some(attention_mask))?,
            Backbone::XlmRoberta(m) => m.forward(input_ids, attention_mask, token_type_ids, None, None, None)?,
        };
        Ok(hidden)
    }
}

/// Sentence encoder over a local BERT or XLM-RoBERTa checkpoint.
///
/// Inputs are tokenized as one batch, truncated to `max_len` tokens and padded
/// to the longest sequence; token states are mean-pooled under the attention mask.
pub struct TransformerEmbedder {
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
    model_dir: PathBuf,
    weights_file: &'static str,
    id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl TransformerEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!("Loading transformer embedder from {}", model_dir.display());

        let config_path = model_dir.join(CONFIG_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        for (artifact, path) in [("model config", &config_path), ("tokenizer", &tokenizer_path)] {
            if !path.is_file() { return Err(Error::MissingArtifact { artifact, path: path.clone() }.into()); }
        }
        let weights_file = WEIGHT_FILES.into_iter().find(|f| model_dir.join(f).is_file())
            .ok_or_else(|| Error::MissingArtifact { artifact: "model weights", path: model_dir.join(WEIGHT_FILES[0]) })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_raw = std::fs::read(&config_path)?;
        let config: serde_json::Value = serde_json::from_slice(&config_raw)?;
        let model_type = config.get("model_type").and_then(|v| v.as_str()).unwrap_or("bert").to_string();
        let dim = config.get("hidden_size").and_then(|v| v.as_u64())
            .ok_or_else(|| Error::EmbedderFailure(format!("{} has no hidden_size", config_path.display())))? as usize;
        let pad_id = tokenizer.get_padding().map(|p| p.pad_id)
            .or_else(|| config.get("pad_token_id").and_then(|v| v.as_u64()).map(|v| v as u32))
            .unwrap_or(0);

        let weights_path = model_dir.join(weights_file);
        let weights: HashMap<String, Tensor> = if weights_file.ends_with(".safetensors") {
            candle_core::safetensors::load(&weights_path, &device)?
        } else {
            candle_core::pickle::read_all(&weights_path)?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let backbone = match model_type.as_str() {
            "xlm-roberta" | "roberta" => {
                let cfg: XLMRobertaConfig = serde_json::from_value(config.clone())?;
                Backbone::XlmRoberta(XLMRobertaModel::new(&cfg, vb)?)
            }
            "bert" => {
                let cfg: BertConfig = serde_json::from_value(config.clone())?;
                Backbone::Bert(BertModel::load(vb, &cfg)?)
            }
            other => return Err(Error::EmbedderFailure(format!("unsupported model_type {other:?}")).into()),
        };

        let digest = model_digest(&[config_path, tokenizer_path, weights_path])?;
        let id = format!("transformer:{model_type}:d{dim}:{digest}");
        info!("Transformer embedder ready: {id}");

        Ok(Self { backbone, tokenizer, device, model_dir: model_dir.to_path_buf(), weights_file, id, dim, max_len, pad_id })
    }
}

impl Embedder for TransformerEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let start = Instant::now();
        let inputs = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.backbone.forward(&inputs.input_ids, &inputs.attention_mask, &inputs.token_type_ids)?;
        let pooled = if normalize {
            masked_mean_l2(&hidden, &inputs.attention_mask)?
        } else {
            masked_mean(&hidden, &inputs.attention_mask)?
        };
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        debug!("Embedded {} texts in {:?}", texts.len(), start.elapsed());
        Ok(vectors)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let same_dir = match (dir.canonicalize(), self.model_dir.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_dir {
            for file in [CONFIG_FILE, TOKENIZER_FILE, self.weights_file] {
                std::fs::copy(self.model_dir.join(file), dir.join(file))?;
            }
        }
        write_descriptor(dir, &EmbedderDescriptor::Transformer { max_len: self.max_len })
    }
}

/// Content digest over the model files; location and timestamps do not count.
fn model_digest(files: &[PathBuf]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in files {
        let mut file = std::fs::File::open(path)?;
        std::io::copy(&mut file, &mut hasher)?;
        hasher.update(&[0]);
    }
    Ok(hasher.finalize().to_hex()[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_model(dir: &Path, weights: &[u8]) -> Vec<PathBuf> {
        let config: &[u8] = br#"{"model_type":"bert","hidden_size":4}"#;
        let tokenizer: &[u8] = b"{}";
        let files = [(CONFIG_FILE, config), (TOKENIZER_FILE, tokenizer), (WEIGHT_FILES[0], weights)];
        files.iter().map(|(name, bytes)| {
            let path = dir.join(name);
            std::fs::write(&path, bytes).expect("write");
            path
        }).collect()
    }

    #[test]
    fn digest_follows_weights_not_location() {
        let a = TempDir::new().expect("tmp");
        let b = TempDir::new().expect("tmp");
        let first = model_digest(&write_model(a.path(), b"weights-v1")).expect("digest");
        let copied = model_digest(&write_model(b.path(), b"weights-v1")).expect("digest");
        assert_eq!(first, copied);
        assert_eq!(first.len(), 16);

        let retrained = model_digest(&write_model(b.path(), b"weights-v2")).expect("digest");
        assert_ne!(first, retrained);
    }
}
