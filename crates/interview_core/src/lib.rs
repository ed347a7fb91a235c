pub mod domain;
pub mod ports;
pub mod scoring;
pub mod similarity;

pub use domain::{
    DepthLevel, JobType, QuestionRecord, ReportChunk, ReportRecord, ReportStatus, ResumeProfile,
    Session, SessionStatus, SubScores, Turn,
};
pub use ports::{
    EngineError, EngineResult, InterviewStore, JobTypeDirectory, ResumeService, TextOracle,
};
pub use scoring::{aggregate_session, SessionAggregate};
pub use similarity::{dedup_fingerprint, similarity};
