//! Rust structs mirroring job-store rows, and the status state machines.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Already-hashed credential; the store never sees plaintext.
    #[serde(skip_serializing)]
    pub password: String,
    pub is_premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: i64,
    pub user_id: i64,
    pub date_created: DateTime<Utc>,
    pub status: JobStatus,
    pub num_files: i64,
}

/// One conversion unit inside a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub job_id: i64,
    pub file_name: String,
    pub output_file_name: String,
    pub status: FileStatus,
    /// `<kind>: <message>` for failed files.
    pub error: Option<String>,
}

/// Input for [`super::Store::create_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub file_name: String,
    pub output_file_name: String,
}

impl NewFile {
    pub fn new(file_name: impl Into<String>, output_file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            output_file_name: output_file_name.into(),
        }
    }
}

/// Lifecycle of a single file. Only the job runner writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileStatus {
    #[default]
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "failed")]
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::NotStarted => "not started",
            FileStatus::Processing => "processing",
            FileStatus::Done => "done",
            FileStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Failed)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not started" => Ok(FileStatus::NotStarted),
            "processing" => Ok(FileStatus::Processing),
            "done" => Ok(FileStatus::Done),
            "failed" => Ok(FileStatus::Failed),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Aggregate state of a job, derived from its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "partially failed")]
    PartiallyFailed,
    #[serde(rename = "failed")]
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not started",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::PartiallyFailed => "partially failed",
            JobStatus::Failed => "failed",
        }
    }

    /// Aggregate file statuses.
    ///
    /// Any file still pending keeps the job `processing` (or `not started`
    /// if none has begun). Once all are terminal the job is `completed`,
    /// `failed`, or `partially failed` for a mix.
    pub fn from_files(statuses: &[FileStatus]) -> Self {
        if statuses.is_empty() || statuses.iter().all(|s| *s == FileStatus::NotStarted) {
            return JobStatus::NotStarted;
        }
        if !statuses.iter().all(FileStatus::is_terminal) {
            return JobStatus::Processing;
        }
        let failed = statuses.iter().filter(|s| **s == FileStatus::Failed).count();
        match failed {
            0 => JobStatus::Completed,
            n if n == statuses.len() => JobStatus::Failed,
            _ => JobStatus::PartiallyFailed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not started" => Ok(JobStatus::NotStarted),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "partially failed" => Ok(JobStatus::PartiallyFailed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}
