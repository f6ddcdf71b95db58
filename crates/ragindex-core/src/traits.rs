use std::path::Path;

/// Embedding capability consumed by the dense index.
///
/// Implementations must be deterministic for identical input and model
/// state, and safe to call concurrently from many query handlers.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashing:xxh64:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum input length in model tokens.
    fn max_len(&self) -> usize;
    /// Compute one vector per input text, L2-normalized when `normalize` is set.
    fn embed_batch(&self, texts: &[String], normalize: bool) -> anyhow::Result<Vec<Vec<f32>>>;
    /// Persist whatever is needed to rebuild this embedder into `dir`.
    fn save(&self, dir: &Path) -> anyhow::Result<()>;
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
