//! # Leak Indexer
//!
//! A resumable, deduplicating batch indexer for credential leak dumps.
//!
//! Leak Indexer walks a collection of text dumps, extracts
//! `email:password` pairs, and stores each distinct pair once in SQLite,
//! together with its host and the file it first appeared in. Every file
//! carries a status, so an interrupted run resumes instead of starting over.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Enumerator │──▶│ Dispatcher │──▶│ Worker pool  │──▶│ Collector │
//! │ walk+status│   │ ready queue│   │ parse+dedup  │   │ Done/retry│
//! └─────┬──────┘   └────────────┘   └──────┬───────┘   └─────┬─────┘
//!       │                                  │                 │
//!       └──────────────────────────────────┴─────────────────┘
//!                                  ▼
//!                        ┌────────────────────┐
//!                        │ SQLite (LeakStore) │
//!                        └────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lidx init                    # create database
//! lidx index -v                # index the configured collection
//! lidx index --collection "Collection 2" --workers 16
//! lidx stats                   # what's indexed so far
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`enumerate`] | Source walk and job list |
//! | [`dispatch`] | Ready-queue dispatcher and worker pool |
//! | [`worker`] | Per-file parsing, dedup, batch flush |
//! | [`ingest`] | Run orchestration and result collection |
//! | [`sqlite_store`] | SQLite `LeakStore` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations and reset |
//! | [`stats`] | Database summary |
//! | [`progress`] | Progress reporting |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod dispatch;
pub mod enumerate;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
pub mod worker;

pub use leak_indexer_core::{fingerprint, models, parse, store};
