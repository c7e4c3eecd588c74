use super::migrate::{self, MigrationReport};
use super::models::{FileRecord, FileStatus, Job, JobStatus, NewFile, User};
use crate::config::StoreConfig;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Connection, Pool, Row, Sqlite, SqliteConnection};
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

const FILE_COLUMNS: &str = "id, job_id, file_name, output_file_name, status, error";

/// Switch to WAL and confirm SQLite accepted it.
async fn enable_wal(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let mode: String = sqlx::query_scalar("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(StoreError::JournalMode(mode));
    }
    debug!("Journal mode set to {}", mode);
    Ok(())
}

/// Job/file store backed by SQLite.
///
/// Cloning is cheap; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    report: MigrationReport,
}

impl Store {
    /// Open (or create) the store, run migrations, then switch to WAL.
    ///
    /// No other query is issued before the migration engine has finished.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = &config.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        // Migrate and switch journal mode on a lone connection: SQLite refuses
        // the switch while another connection holds a read lock.
        let mut conn = SqliteConnection::connect_with(&opts).await?;
        let report = migrate::run(&mut conn).await?;
        enable_wal(&mut conn).await?;
        conn.close().await?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(opts.journal_mode(SqliteJournalMode::Wal))
            .await?;

        info!(
            "Opened store {} at version {} (fresh: {}, applied: {:?}, patched: {:?})",
            path.display(),
            report.version,
            report.fresh_install,
            report.applied,
            report.patched
        );
        Ok(Self { pool, report })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// What the migration engine did when this store was opened.
    pub fn migration_report(&self) -> &MigrationReport {
        &self.report
    }

    /// True when no user has registered yet.
    pub async fn is_first_run(&self) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }

    // ── Users ────────────────────────────────────────────────────────────

    /// Insert a user. `password_hash` is stored as given.
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let id = sqlx::query("INSERT INTO users (email, password, is_premium) VALUES (?, ?, 0)")
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        debug!("Created user {}", id);
        Ok(User {
            id,
            email: email.to_string(),
            password: password_hash.to_string(),
            is_premium: false,
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password, COALESCE(is_premium, 0) AS is_premium
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_premium(&self, user_id: i64, premium: bool) -> Result<(), StoreError> {
        let premium_i = if premium { 1 } else { 0 };
        let done = sqlx::query("UPDATE users SET is_premium = ? WHERE id = ?")
            .bind(premium_i)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        Ok(())
    }

    // ── Jobs and files ───────────────────────────────────────────────────

    /// Create a job and one `not started` file row per input, atomically.
    pub async fn create_job(&self, user_id: i64, files: &[NewFile]) -> Result<Job, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let job_id = sqlx::query(
            "INSERT INTO jobs (user_id, date_created, status, num_files) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(JobStatus::NotStarted.as_str())
        .bind(files.len() as i64)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for file in files {
            sqlx::query(
                "INSERT INTO file_names (job_id, file_name, output_file_name, status)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(job_id)
            .bind(&file.file_name)
            .bind(&file.output_file_name)
            .bind(FileStatus::NotStarted.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Created job {} with {} files", job_id, files.len());
        self.get_job(job_id).await
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Job, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, date_created, status, num_files FROM jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "job",
            id: job_id,
        })?;
        Self::row_to_job(row)
    }

    /// Files of a job in creation order.
    pub async fn list_files(&self, job_id: i64) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM file_names WHERE job_id = ? ORDER BY id"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_file).collect()
    }

    /// Files of a job that ended in `failed`, with their error text.
    pub async fn failed_files(&self, job_id: i64) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM file_names WHERE job_id = ? AND status = ? ORDER BY id"
        ))
        .bind(job_id)
        .bind(FileStatus::Failed.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_file).collect()
    }

    /// Move a file to `status`. `error` is stored only for failures and
    /// cleared otherwise.
    pub async fn set_file_status(
        &self,
        file_id: i64,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let error = if status == FileStatus::Failed { error } else { None };
        let done = sqlx::query("UPDATE file_names SET status = ?, error = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(error)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "file",
                id: file_id,
            });
        }
        debug!("File {} → {}", file_id, status);
        Ok(())
    }

    /// Recompute the job's status from its files and store it.
    pub async fn refresh_job_status(&self, job_id: i64) -> Result<JobStatus, StoreError> {
        let statuses: Vec<FileStatus> = self
            .list_files(job_id)
            .await?
            .into_iter()
            .map(|f| f.status)
            .collect();
        let status = JobStatus::from_files(&statuses);

        let done = sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "job",
                id: job_id,
            });
        }
        Ok(status)
    }

    fn row_to_job(row: SqliteRow) -> Result<Job, StoreError> {
        let id: i64 = row.try_get("id")?;
        let user_id: i64 = row.try_get("user_id")?;
        let date_str: String = row.try_get("date_created")?;
        let status_str: Option<String> = row.try_get("status")?;
        let num_files: Option<i64> = row.try_get("num_files")?;

        let date_created: DateTime<Utc> = DateTime::parse_from_rfc3339(&date_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);
        let status = match status_str {
            Some(s) => s.parse()?,
            None => JobStatus::NotStarted,
        };

        Ok(Job {
            id,
            user_id,
            date_created,
            status,
            num_files: num_files.unwrap_or(0),
        })
    }

    fn row_to_file(row: SqliteRow) -> Result<FileRecord, StoreError> {
        let status_str: Option<String> = row.try_get("status")?;
        let status = match status_str {
            Some(s) => s.parse()?,
            None => FileStatus::NotStarted,
        };
        Ok(FileRecord {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            file_name: row.try_get("file_name")?,
            output_file_name: row.try_get("output_file_name")?,
            status,
            error: row.try_get("error")?,
        })
    }
}
