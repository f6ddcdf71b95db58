//! ragindex-vector
//!
//! LanceDB-backed dense index: one row per chunk holding `(id, row, vector)`.

pub mod index;
pub mod schema;
pub mod table;
pub mod writer;

pub use index::DenseIndex;
