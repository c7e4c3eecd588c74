//! Job runner: converts every file of a stored job and records the outcome.
//!
//! The orchestrator in [`crate::convert`] knows nothing about the store;
//! this module is the single writer of `file_names.status`. Each file is
//! moved to `processing` before its conversion starts and to `done` or
//! `failed` exactly once afterwards, so a job never looks silently
//! incomplete.

use crate::config::ConversionConfig;
use crate::convert::{convert, ConversionRequest};
use crate::error::{ConvertError, ErrorKind, StoreError};
use crate::scratch::job_file_tag;
use crate::store::{FileRecord, FileStatus, JobStatus, Store};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Where uploads are read from and outputs written to.
///
/// Files live at `<root>/<user_id>/<job_id>/<file name>` under both roots.
#[derive(Debug, Clone)]
pub struct JobLayout {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for JobLayout {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl JobLayout {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn source_path(&self, user_id: i64, file: &FileRecord) -> PathBuf {
        self.upload_dir
            .join(user_id.to_string())
            .join(file.job_id.to_string())
            .join(&file.file_name)
    }

    pub fn output_path(&self, user_id: i64, file: &FileRecord) -> PathBuf {
        self.output_dir
            .join(user_id.to_string())
            .join(file.job_id.to_string())
            .join(&file.output_file_name)
    }
}

/// A file that ended in `failed`, and why.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file_id: i64,
    pub file_name: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of [`run_job`].
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: i64,
    pub status: JobStatus,
    pub converted: usize,
    /// Files already `done` before this run.
    pub skipped: usize,
    pub failed: Vec<FailedFile>,
}

/// Convert every pending file of `job_id`.
///
/// Up to `config.concurrency` files run at once, each with its own
/// job-scoped scratch directory. Files already `done` are left alone, so
/// re-running a partially failed job only retries what failed.
///
/// # Errors
/// Only store failures abort the run; conversion failures are recorded on
/// the file row and listed in the returned [`JobReport`].
pub async fn run_job(
    store: &Store,
    job_id: i64,
    layout: &JobLayout,
    config: &ConversionConfig,
) -> Result<JobReport, StoreError> {
    let job = store.get_job(job_id).await?;
    let files = store.list_files(job_id).await?;
    let (done, pending): (Vec<FileRecord>, Vec<FileRecord>) = files
        .into_iter()
        .partition(|f| f.status == FileStatus::Done);

    info!(
        "Running job {}: {} pending, {} already done",
        job_id,
        pending.len(),
        done.len()
    );

    let outcomes: Vec<Result<Option<FailedFile>, StoreError>> = stream::iter(pending)
        .map(|file| run_file(store, job.user_id, file, layout, config))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut converted = 0;
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome? {
            Some(f) => failed.push(f),
            None => converted += 1,
        }
    }
    failed.sort_by_key(|f| f.file_id);

    let status = store.refresh_job_status(job_id).await?;
    info!(
        "Job {} {}: {} converted, {} failed",
        job_id,
        status,
        converted,
        failed.len()
    );

    Ok(JobReport {
        job_id,
        status,
        converted,
        skipped: done.len(),
        failed,
    })
}

async fn run_file(
    store: &Store,
    user_id: i64,
    file: FileRecord,
    layout: &JobLayout,
    config: &ConversionConfig,
) -> Result<Option<FailedFile>, StoreError> {
    store
        .set_file_status(file.id, FileStatus::Processing, None)
        .await?;
    store.refresh_job_status(file.job_id).await?;

    let request = ConversionRequest::new(
        layout.source_path(user_id, &file),
        layout.output_path(user_id, &file),
    )
    .scratch_tag(job_file_tag(file.job_id, file.id));

    match convert(&request, config).await {
        Ok(output) => {
            info!(
                "File {} ({}) done: {} lines",
                file.id, file.file_name, output.stats.line_count
            );
            store.set_file_status(file.id, FileStatus::Done, None).await?;
            Ok(None)
        }
        Err(e) => {
            warn!("File {} ({}) failed: {}", file.id, file.file_name, e);
            store
                .set_file_status(file.id, FileStatus::Failed, Some(&error_text(&e)))
                .await?;
            Ok(Some(FailedFile {
                file_id: file.id,
                file_name: file.file_name,
                kind: e.kind(),
                message: e.to_string(),
            }))
        }
    }
}

/// Stored form of a conversion error: `<kind>: <message>`.
pub fn error_text(e: &ConvertError) -> String {
    format!("{}: {}", e.kind(), e)
}
