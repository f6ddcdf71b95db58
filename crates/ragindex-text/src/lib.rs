//! ragindex-text
//!
//! Tantivy-based BM25 index over chunk text. `tantivy_utils` owns the schema
//! and the single analyzer shared by indexing and querying.

pub mod tantivy_utils;
pub mod index;

pub use index::LexicalIndex;
pub use tantivy_utils::tokenizer_fingerprint;
