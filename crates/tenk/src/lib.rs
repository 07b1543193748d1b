#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tenk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC 10-K ingestion pipeline.
//!
//! This crate ties the workspace together. It re-exports the core types,
//! the EDGAR registry, the extraction stages and the stores, and provides
//! the [`Orchestrator`] that runs filings through fetch, parse, extract and
//! store with per-filing isolation.
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed [`SqliteStore`] (default, required by the binary)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenk::{Cik, Company, EdgarRegistry, Orchestrator, SqliteStore, Ticker};
//!
//! #[tokio::main]
//! async fn main() -> tenk::Result<()> {
//!     let registry = Arc::new(EdgarRegistry::new("Example Research research@example.com")?);
//!     let store = Arc::new(SqliteStore::new("tenk.db")?);
//!
//!     let apple = Company::new(Ticker::new("AAPL")?, "Apple Inc.", Cik::new(320_193));
//!     let report = Orchestrator::new(registry, store)?.run(&[apple]).await;
//!
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use tenk_core::*;

// Registry
pub use tenk_edgar::{EdgarRegistry, RateGate, RetryPolicy};

// Extraction
pub use tenk_extract::{Document, DocumentResult, Extractor, UnitDetection};

// Stores
pub use tenk_store::{InMemoryStore, keywords_frame, metrics_frame};
#[cfg(feature = "sqlite")]
pub use tenk_store::SqliteStore;

/// Configuration loading and logging setup.
pub mod config;
/// Ingestion orchestrator.
pub mod pipeline;

pub use config::Config;
pub use pipeline::{
    CompanyFailure, FilingOutcome, FilingState, IngestReport, Orchestrator, ProgressFn,
    StopSignal,
};
