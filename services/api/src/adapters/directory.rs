//! services/api/src/adapters/directory.rs
//!
//! Reference implementations of the resume and job-type lookup ports.
//! Resume storage/parsing and job-type CRUD are external systems; these
//! adapters give the engine seedable in-process stand-ins.

use async_trait::async_trait;
use interview_core::domain::{JobType, ResumeProfile};
use interview_core::ports::{EngineError, EngineResult, JobTypeDirectory, ResumeService};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Seedable resume lookup. An unknown ref falls back to treating the ref
/// itself as raw resume text with no extracted items, so a session can
/// always start even when the resume collaborator has nothing on file.
#[derive(Default)]
pub struct InMemoryResumeService {
    profiles: RwLock<HashMap<String, ResumeProfile>>,
}

impl InMemoryResumeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, resume_ref: &str, profile: ResumeProfile) {
        self.profiles
            .write()
            .await
            .insert(resume_ref.to_string(), profile);
    }
}

#[async_trait]
impl ResumeService for InMemoryResumeService {
    async fn lookup_resume(&self, resume_ref: &str) -> EngineResult<ResumeProfile> {
        if let Some(profile) = self.profiles.read().await.get(resume_ref) {
            return Ok(profile.clone());
        }
        Ok(ResumeProfile {
            raw_text: resume_ref.to_string(),
            tech_items: Vec::new(),
            project_points: Vec::new(),
        })
    }
}

/// Seedable job-type directory.
#[derive(Default)]
pub struct InMemoryJobTypeDirectory {
    job_types: RwLock<HashMap<String, JobType>>,
}

impl InMemoryJobTypeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job_type_ref: &str, name: &str) {
        self.job_types.write().await.insert(
            job_type_ref.to_string(),
            JobType {
                name: name.to_string(),
            },
        );
    }
}

#[async_trait]
impl JobTypeDirectory for InMemoryJobTypeDirectory {
    async fn lookup_job_type(&self, job_type_ref: &str) -> EngineResult<JobType> {
        self.job_types
            .read()
            .await
            .get(job_type_ref)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Job type {} not found", job_type_ref)))
    }
}
