pub mod directory;
pub mod memory_store;
pub mod oracle_llm;

pub use directory::{InMemoryJobTypeDirectory, InMemoryResumeService};
pub use memory_store::InMemoryStore;
pub use oracle_llm::OpenAiOracleAdapter;
