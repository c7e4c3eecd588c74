//! SQL DDL for a fresh job store.
//!
//! Applied in one transaction when the database has no tables at all; the
//! incremental chain in [`super::migrate`] is skipped in that case. Keep this
//! in step with the last entry of [`super::migrate::MIGRATIONS`].

/// Full schema at [`super::migrate::CURRENT_VERSION`].
///
/// - `users.email` is UNIQUE
/// - `is_premium` is stored as INTEGER 0/1
/// - statuses are the lowercase strings of `FileStatus` / `JobStatus`
/// - `date_created` is RFC 3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    is_premium INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    date_created TEXT NOT NULL,
    status TEXT DEFAULT 'not started',
    num_files INTEGER DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS file_names (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    output_file_name TEXT NOT NULL,
    status TEXT DEFAULT 'not started',
    error TEXT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id)
);

CREATE INDEX IF NOT EXISTS idx_file_names_job_id ON file_names(job_id)
"#;

/// Split a DDL script into single statements.
///
/// sqlx prepares one statement per query, so scripts are executed piecewise.
pub fn statements(script: &str) -> impl Iterator<Item = &str> {
    script.split(';').map(str::trim).filter(|s| !s.is_empty())
}
