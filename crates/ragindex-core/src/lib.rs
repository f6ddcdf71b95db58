//! ragindex-core
//!
//! Domain types, configuration, chunking and corpus I/O shared by the lexical
//! and dense indexes.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;
