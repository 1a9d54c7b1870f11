//! Adapters binding domain ports to concrete backends.

pub mod completion;
pub mod embeddings;
pub mod retry;
pub mod tools;
pub mod vector;
