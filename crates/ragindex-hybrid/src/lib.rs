//! ragindex-hybrid
//!
//! Ties the lexical and dense indexes together: RRF fusion, persistence of a
//! whole index generation, the query service and prompt rendering.

pub mod fusion;
pub mod prompt;
pub mod service;
pub mod store;

pub use fusion::{FusionRanker, DEFAULT_RRF_K};
pub use prompt::build_prompt;
pub use service::RetrievalService;
pub use store::{build_generation, Generation, IndexStore, Manifest, StagingArea};
