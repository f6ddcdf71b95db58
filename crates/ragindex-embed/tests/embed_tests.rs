use candle_core::{DType, Device, Tensor};
use tempfile::TempDir;

use ragindex_core::config::{EmbedderKind, EmbeddingSettings};
use ragindex_core::error::Error;
use ragindex_embed::{get_default_embedder, masked_mean, masked_mean_l2, restore_embedder};

#[test]
fn default_embedder_is_hashing_and_deterministic() {
    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    assert_eq!(embedder.embedder_id(), "hashing:xxh64:d384");
    assert_eq!(embedder.dim(), 384);

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts, true).expect("embed_batch");
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(embs[0], embs[1]);
}

#[test]
fn saved_embedder_restores_with_same_identity() {
    let tmp = TempDir::new().unwrap();
    let settings = EmbeddingSettings { dim: 128, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).unwrap();
    embedder.save(tmp.path()).unwrap();

    let restored = restore_embedder(tmp.path()).unwrap();
    assert_eq!(restored.embedder_id(), embedder.embedder_id());
    assert_eq!(restored.dim(), 128);
    let text = vec!["Carnegie Mellon University".to_string()];
    assert_eq!(restored.embed_batch(&text, true).unwrap(), embedder.embed_batch(&text, true).unwrap());
}

#[test]
fn restore_without_descriptor_is_missing_artifact() {
    let tmp = TempDir::new().unwrap();
    let err = restore_embedder(tmp.path()).err().expect("must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingArtifact { .. })), "{err:?}");
}

#[test]
fn transformer_without_model_files_is_missing_artifact() {
    let tmp = TempDir::new().unwrap();
    let settings = EmbeddingSettings {
        kind: EmbedderKind::Transformer,
        model_dir: Some(tmp.path().display().to_string()),
        ..EmbeddingSettings::default()
    };
    let err = get_default_embedder(&settings).err().expect("must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingArtifact { .. })), "{err:?}");
}

#[test]
fn masked_mean_l2_basic() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; second token is masked out.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,  // token 0
                                 5.0, 6.0, 7.0, 8.0],    // token 1
                               (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 0i64], (1, 2), &dev).unwrap()
        .to_dtype(DType::F32).unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let v = &v[0];
    let norm: f32 = (1.0f32*1.0 + 2.0*2.0 + 3.0*3.0 + 4.0*4.0).sqrt();
    let expected = [1.0/norm, 2.0/norm, 3.0/norm, 4.0/norm];
    for (a,b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn masked_mean_averages_unmasked_tokens() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 3.0, 3.0, 5.0, 100.0, 100.0], (1, 3, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1, 0], (1, 3), &dev).unwrap();
    let v: Vec<Vec<f32>> = masked_mean(&h, &mask).unwrap().to_vec2().unwrap();
    assert_eq!(v[0], vec![2.0, 4.0]);
}
