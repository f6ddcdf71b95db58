use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing {artifact} at {}", path.display())]
    MissingArtifact { artifact: &'static str, path: PathBuf },

    #[error("Index state mismatch: {0}")]
    IndexStateMismatch(String),

    #[error("Embedder failure: {0}")]
    EmbedderFailure(String),

    #[error("{component} fingerprint mismatch: index built with '{expected}', runtime has '{found}'")]
    FingerprintMismatch {
        component: &'static str,
        expected: String,
        found: String,
    },

    #[error("Corpus line {line}: {message}")]
    Corpus { line: usize, message: String },
}
