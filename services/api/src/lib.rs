//! services/api/src/lib.rs
//!
//! Library surface of the `api` service: the interview session engine, its
//! adapters, the report stream cache, and the web layer.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod question_bank;
pub mod report_cache;
pub mod web;

pub use engine::{EngineConfig, InterviewEngine, SubmitOutcome};
pub use report_cache::ReportStreamCache;
