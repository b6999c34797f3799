//! # Leak Indexer Core
//!
//! Storage-agnostic logic for Leak Indexer: data models, fingerprinting,
//! credential line parsing, and the [`store::LeakStore`] abstraction.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. The host crate
//! (`leak-indexer`) supplies the SQLite store and the concurrent pipeline.

pub mod fingerprint;
pub mod models;
pub mod parse;
pub mod store;
