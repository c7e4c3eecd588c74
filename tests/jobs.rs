//! Job runner tests: store rows driven through fake conversions.

mod common;

use common::*;
use scan2docx::{
    run_job, ConversionConfig, ErrorKind, FileStatus, JobLayout, JobStatus, NewFile, Store,
    StoreConfig,
};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Env {
    _dir: tempfile::TempDir,
    store: Store,
    layout: JobLayout,
    rasterizer: Arc<FakeRasterizer>,
    config: ConversionConfig,
}

async fn env(concurrency: usize) -> Env {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&StoreConfig::new(dir.path().join("data/mydb.sqlite")))
        .await
        .unwrap();
    let layout = JobLayout::new(dir.path().join("uploads"), dir.path().join("output"));
    let rasterizer = Arc::new(FakeRasterizer::default());
    let config = ConversionConfig::builder()
        .rasterizer(rasterizer.clone())
        .recognizer_override(Arc::new(FileRecognizer::default()))
        .corrector(FakeCorrector::no_edits())
        .scratch_root(dir.path().join("scratch"))
        .concurrency(concurrency)
        .build()
        .unwrap();
    Env {
        _dir: dir,
        store,
        layout,
        rasterizer,
        config,
    }
}

fn upload(layout: &JobLayout, user_id: i64, job_id: i64, name: &str, pages: &[&str]) {
    let dir = layout
        .upload_dir
        .join(user_id.to_string())
        .join(job_id.to_string());
    write_fake_pdf(&dir, name, pages);
}

fn output_text(layout: &JobLayout, user_id: i64, job_id: i64, name: &str) -> String {
    let path = layout
        .output_dir
        .join(user_id.to_string())
        .join(job_id.to_string())
        .join(name);
    std::fs::read_to_string(Path::new(&path)).unwrap()
}

#[tokio::test]
async fn all_files_converted_completes_the_job() {
    let env = env(2).await;
    let user = env.store.create_user("ok@example.com", "h").await.unwrap();
    let job = env
        .store
        .create_job(
            user.id,
            &[
                NewFile::new("a.pdf", "a.txt"),
                NewFile::new("b.pdf", "b.txt"),
                NewFile::new("c.pdf", "c.docx"),
            ],
        )
        .await
        .unwrap();
    upload(&env.layout, user.id, job.id, "a.pdf", &["alpha"]);
    upload(&env.layout, user.id, job.id, "b.pdf", &["bravo", "more bravo"]);
    upload(&env.layout, user.id, job.id, "c.pdf", &["charlie"]);

    let report = run_job(&env.store, job.id, &env.layout, &env.config)
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.converted, 3);
    assert!(report.failed.is_empty());
    assert_eq!(output_text(&env.layout, user.id, job.id, "a.txt"), "alpha\n");
    assert_eq!(
        output_text(&env.layout, user.id, job.id, "b.txt"),
        "bravo\nmore bravo\n"
    );
    assert!(env
        .store
        .list_files(job.id)
        .await
        .unwrap()
        .iter()
        .all(|f| f.status == FileStatus::Done));

    // Every file rasterised into its own job-scoped scratch directory.
    let dirs = env.rasterizer.output_dirs.lock().unwrap().clone();
    assert_eq!(dirs.len(), 3);
    for d in &dirs {
        let name = d.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains(&format!("job-{}-file-", job.id)), "got {name}");
    }
}

#[tokio::test]
async fn failures_are_recorded_per_file_with_their_kind() {
    let env = env(4).await;
    let user = env.store.create_user("mixed@example.com", "h").await.unwrap();
    let job = env
        .store
        .create_job(
            user.id,
            &[
                NewFile::new("good.pdf", "good.txt"),
                NewFile::new("blank.pdf", "blank.txt"),
                NewFile::new("missing.pdf", "missing.txt"),
            ],
        )
        .await
        .unwrap();
    upload(&env.layout, user.id, job.id, "good.pdf", &["fine"]);
    upload(&env.layout, user.id, job.id, "blank.pdf", &["   "]);

    let report = run_job(&env.store, job.id, &env.layout, &env.config)
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::PartiallyFailed);
    assert_eq!(report.converted, 1);
    let kinds: Vec<(&str, ErrorKind)> = report
        .failed
        .iter()
        .map(|f| (f.file_name.as_str(), f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("blank.pdf", ErrorKind::NoTextRecognized),
            ("missing.pdf", ErrorKind::InvalidSource),
        ]
    );

    let failed = env.store.failed_files(job.id).await.unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed[0].error.as_deref().unwrap().starts_with("no_text_recognized: "));
    assert!(failed[1].error.as_deref().unwrap().starts_with("invalid_source: "));
    assert_eq!(
        env.store.get_job(job.id).await.unwrap().status,
        JobStatus::PartiallyFailed
    );
}

#[tokio::test]
async fn rerun_only_retries_unfinished_files() {
    let env = env(1).await;
    let user = env.store.create_user("retry@example.com", "h").await.unwrap();
    let job = env
        .store
        .create_job(
            user.id,
            &[
                NewFile::new("one.pdf", "one.txt"),
                NewFile::new("two.pdf", "two.txt"),
            ],
        )
        .await
        .unwrap();
    upload(&env.layout, user.id, job.id, "one.pdf", &["first"]);

    let first = run_job(&env.store, job.id, &env.layout, &env.config)
        .await
        .unwrap();
    assert_eq!(first.status, JobStatus::PartiallyFailed);

    upload(&env.layout, user.id, job.id, "two.pdf", &["second"]);
    let second = run_job(&env.store, job.id, &env.layout, &env.config)
        .await
        .unwrap();
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.converted, 1);
    // two.pdf was rejected before rasterising the first time; one.pdf was
    // not converted again.
    assert_eq!(env.rasterizer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_job_is_a_store_error() {
    let env = env(1).await;
    assert!(run_job(&env.store, 404, &env.layout, &env.config)
        .await
        .is_err());
}
