//! Job store and migration engine tests against real SQLite files.

use scan2docx::store::migrate::{column_exists, read_version};
use scan2docx::store::CURRENT_VERSION;
use scan2docx::{FileStatus, JobStatus, NewFile, Store, StoreConfig, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// The schema as it existed before versioning: no file status, no premium flag.
const LEGACY_V0: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL, password TEXT NOT NULL)",
    "CREATE TABLE jobs (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER NOT NULL, \
     date_created TEXT NOT NULL, status TEXT DEFAULT 'not started', num_files INTEGER DEFAULT 0)",
    "CREATE TABLE file_names (id INTEGER PRIMARY KEY AUTOINCREMENT, job_id INTEGER NOT NULL, \
     file_name TEXT NOT NULL, output_file_name TEXT NOT NULL)",
];

fn db_path(dir: &Path) -> PathBuf {
    dir.join("data/mydb.sqlite")
}

async fn raw_pool(path: &Path) -> SqlitePool {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap()
}

/// Create a store by hand, bypassing the migration engine.
async fn seed(path: &Path, statements: &[&str], version: i64) {
    let pool = raw_pool(path).await;
    for stmt in statements {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    sqlx::query(&format!("PRAGMA user_version = {version}"))
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

async fn has_column(store: &Store, table: &str, column: &str) -> bool {
    let mut conn = store.pool().acquire().await.unwrap();
    column_exists(&mut conn, table, column).await.unwrap()
}

async fn marker(store: &Store) -> i64 {
    let mut conn = store.pool().acquire().await.unwrap();
    read_version(&mut conn).await.unwrap()
}

// ── Migration engine ─────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_store_gets_full_schema_in_one_step() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&StoreConfig::new(db_path(dir.path())))
        .await
        .unwrap();

    let report = store.migration_report();
    assert!(report.fresh_install);
    assert!(report.applied.is_empty());
    assert!(report.patched.is_empty());
    assert_eq!(report.version, CURRENT_VERSION);
    assert_eq!(marker(&store).await, CURRENT_VERSION);
    assert!(has_column(&store, "users", "is_premium").await);
    assert!(has_column(&store, "file_names", "error").await);
    assert!(store.is_first_run().await.unwrap());
}

#[tokio::test]
async fn wal_is_enabled_on_every_pooled_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    seed(&path, LEGACY_V0, 0).await;

    let config = StoreConfig::new(&path);
    assert!(config.max_connections > 1);
    let store = Store::open(&config).await.unwrap();

    // Hold several connections at once so the pool has to open new ones.
    let mut held = Vec::new();
    for _ in 0..config.max_connections {
        let mut conn = store.pool().acquire().await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        held.push(conn);
    }
}

#[tokio::test]
async fn wal_persists_in_the_file_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    store.pool().close().await;

    let pool = raw_pool(&path).await;
    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn version_zero_store_is_walked_to_current() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let mut stmts = LEGACY_V0.to_vec();
    stmts.push("INSERT INTO users (email, password) VALUES ('old@example.com', 'h')");
    stmts.push("INSERT INTO jobs (user_id, date_created) VALUES (1, '2024-01-02T03:04:05+00:00')");
    stmts.push("INSERT INTO file_names (job_id, file_name, output_file_name) VALUES (1, 'a.pdf', 'a.docx')");
    seed(&path, &stmts, 0).await;

    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    let report = store.migration_report();
    assert!(!report.fresh_install);
    assert_eq!(report.applied, vec![1, 2, 3]);
    assert!(report.patched.is_empty());
    assert_eq!(marker(&store).await, CURRENT_VERSION);
    assert!(has_column(&store, "file_names", "status").await);
    assert!(has_column(&store, "users", "is_premium").await);

    // Existing rows pick up the column defaults.
    let user = store.find_user_by_email("old@example.com").await.unwrap().unwrap();
    assert!(!user.is_premium);
    let files = store.list_files(1).await.unwrap();
    assert_eq!(files[0].status, FileStatus::NotStarted);
    assert_eq!(files[0].error, None);
    assert!(!store.is_first_run().await.unwrap());
}

#[tokio::test]
async fn reopening_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    seed(&path, LEGACY_V0, 0).await;

    let first = Store::open(&StoreConfig::new(&path)).await.unwrap();
    assert_eq!(first.migration_report().applied, vec![1, 2, 3]);
    first.pool().close().await;

    let second = Store::open(&StoreConfig::new(&path)).await.unwrap();
    let report = second.migration_report();
    assert!(!report.fresh_install);
    assert!(report.applied.is_empty());
    assert!(report.patched.is_empty());
    assert_eq!(report.version, CURRENT_VERSION);
}

#[tokio::test]
async fn intermediate_version_resumes_from_its_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let mut stmts = LEGACY_V0.to_vec();
    stmts.push("ALTER TABLE file_names ADD COLUMN status TEXT DEFAULT 'not started'");
    seed(&path, &stmts, 1).await;

    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    assert_eq!(store.migration_report().applied, vec![2, 3]);
    assert_eq!(marker(&store).await, CURRENT_VERSION);
}

#[tokio::test]
async fn step_whose_column_already_exists_still_advances() {
    // Marker says 1, but the v2 column was committed before the bump was lost.
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let mut stmts = LEGACY_V0.to_vec();
    stmts.push("ALTER TABLE file_names ADD COLUMN status TEXT DEFAULT 'not started'");
    stmts.push("ALTER TABLE users ADD COLUMN is_premium INTEGER DEFAULT 0");
    seed(&path, &stmts, 1).await;

    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    assert_eq!(store.migration_report().applied, vec![2, 3]);
    assert!(has_column(&store, "users", "is_premium").await);
}

#[tokio::test]
async fn missing_column_at_final_version_is_patched_without_touching_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let mut stmts = LEGACY_V0.to_vec();
    stmts.push("ALTER TABLE file_names ADD COLUMN status TEXT DEFAULT 'not started'");
    stmts.push("ALTER TABLE file_names ADD COLUMN error TEXT NULL");
    stmts.push("INSERT INTO users (email, password) VALUES ('u@example.com', 'h')");
    // users.is_premium deliberately absent.
    seed(&path, &stmts, CURRENT_VERSION).await;

    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    let report = store.migration_report();
    assert!(report.applied.is_empty());
    assert_eq!(report.patched, vec!["users.is_premium".to_string()]);
    assert_eq!(report.version, CURRENT_VERSION);
    assert_eq!(marker(&store).await, CURRENT_VERSION);
    assert!(has_column(&store, "users", "is_premium").await);

    let user = store.find_user_by_email("u@example.com").await.unwrap().unwrap();
    assert!(!user.is_premium);
}

async fn has_index(store: &Store, name: &str) -> bool {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?)",
    )
    .bind(name)
    .fetch_one(store.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn missing_index_at_final_version_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    assert!(has_index(&store, "idx_file_names_job_id").await);
    sqlx::query("DROP INDEX idx_file_names_job_id")
        .execute(store.pool())
        .await
        .unwrap();
    store.pool().close().await;

    let store = Store::open(&StoreConfig::new(&path)).await.unwrap();
    assert!(store.migration_report().applied.is_empty());
    assert!(has_index(&store, "idx_file_names_job_id").await);
    assert_eq!(marker(&store).await, CURRENT_VERSION);
}

#[tokio::test]
async fn store_newer_than_code_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    seed(&path, LEGACY_V0, CURRENT_VERSION + 6).await;

    let err = Store::open(&StoreConfig::new(&path)).await.err().unwrap();
    match err {
        StoreError::MigrationFailed { version, .. } => assert_eq!(version, CURRENT_VERSION + 6),
        other => panic!("expected MigrationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn broken_legacy_store_fails_the_step_that_needs_it() {
    // No file_names table at all, so the v0 → v1 step cannot run.
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(dir.path());
    seed(&path, &LEGACY_V0[..1], 0).await;

    let err = Store::open(&StoreConfig::new(&path)).await.err().unwrap();
    assert!(matches!(err, StoreError::MigrationFailed { version: 1, .. }));

    // The marker did not move past the failed step.
    let pool = raw_pool(&path).await;
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, 0);
}

// ── Users, jobs and files ────────────────────────────────────────────────

async fn open_fresh(dir: &Path) -> Store {
    Store::open(&StoreConfig::new(db_path(dir))).await.unwrap()
}

#[tokio::test]
async fn users_round_trip_and_premium_flag() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_fresh(dir.path()).await;

    let user = store.create_user("a@example.com", "$argon2id$hash").await.unwrap();
    assert!(!store.is_first_run().await.unwrap());
    assert!(store.find_user_by_email("nobody@example.com").await.unwrap().is_none());

    store.set_premium(user.id, true).await.unwrap();
    let found = store.find_user_by_email("a@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert!(found.is_premium);

    assert!(store.create_user("a@example.com", "x").await.is_err());
    assert!(matches!(
        store.set_premium(999, true).await,
        Err(StoreError::NotFound { entity: "user", id: 999 })
    ));
}

#[tokio::test]
async fn job_status_follows_its_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_fresh(dir.path()).await;
    let user = store.create_user("j@example.com", "h").await.unwrap();

    let job = store
        .create_job(
            user.id,
            &[
                NewFile::new("a.pdf", "a.docx"),
                NewFile::new("b.pdf", "b.docx"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(job.num_files, 2);
    assert_eq!(job.status, JobStatus::NotStarted);

    let files = store.list_files(job.id).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file_name, "a.pdf");
    assert!(files.iter().all(|f| f.status == FileStatus::NotStarted));

    store
        .set_file_status(files[0].id, FileStatus::Processing, None)
        .await
        .unwrap();
    assert_eq!(store.refresh_job_status(job.id).await.unwrap(), JobStatus::Processing);

    store.set_file_status(files[0].id, FileStatus::Done, None).await.unwrap();
    store
        .set_file_status(
            files[1].id,
            FileStatus::Failed,
            Some("no_text_recognized: no text recognized on any of 3 pages"),
        )
        .await
        .unwrap();
    assert_eq!(
        store.refresh_job_status(job.id).await.unwrap(),
        JobStatus::PartiallyFailed
    );
    assert_eq!(store.get_job(job.id).await.unwrap().status, JobStatus::PartiallyFailed);

    let failed = store.failed_files(job.id).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_name, "b.pdf");
    assert!(failed[0].error.as_deref().unwrap().starts_with("no_text_recognized"));

    // A retry that succeeds clears the error text.
    store.set_file_status(files[1].id, FileStatus::Done, Some("ignored")).await.unwrap();
    assert_eq!(store.refresh_job_status(job.id).await.unwrap(), JobStatus::Completed);
    assert!(store.failed_files(job.id).await.unwrap().is_empty());
    assert_eq!(store.list_files(job.id).await.unwrap()[1].error, None);
}

#[tokio::test]
async fn unknown_rows_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_fresh(dir.path()).await;
    assert!(matches!(
        store.get_job(42).await,
        Err(StoreError::NotFound { entity: "job", id: 42 })
    ));
    assert!(matches!(
        store.set_file_status(7, FileStatus::Done, None).await,
        Err(StoreError::NotFound { entity: "file", .. })
    ));
}
