//! services/api/src/engine/mod.rs
//!
//! The interview session engine: session lifecycle, question
//! selection/generation, answer scoring, and report production.

pub mod parse;
pub mod prompts;
pub mod question_gen;
pub mod report;
pub mod session;

pub use session::{EngineConfig, InterviewEngine, SubmitOutcome};
