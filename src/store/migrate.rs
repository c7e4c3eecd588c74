//! Versioned schema migrations keyed on `PRAGMA user_version`.
//!
//! Startup sequence:
//!
//! 1. No tables at all: create [`SQLITE_INIT`] and set the marker to
//!    [`CURRENT_VERSION`] in one transaction.
//! 2. Otherwise walk [`MIGRATIONS`] in order. Before every step the marker is
//!    re-read from the database; step `N → N+1` runs only when it reads `N`.
//!    Each step commits its structural change and the marker bump together,
//!    with the bump last.
//! 3. Patch pass: every column an applied step should have added is looked
//!    up in `PRAGMA table_info` and added if absent, and every `IF NOT EXISTS`
//!    statement is re-run. The marker is untouched.
//!
//! Every change is re-entrant, so running the whole sequence twice is a
//! no-op. A marker newer than [`CURRENT_VERSION`] is refused.

use super::schema::{statements, SQLITE_INIT};
use crate::error::StoreError;
use serde::Serialize;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};

/// Schema version this build expects.
pub const CURRENT_VERSION: i64 = 3;

/// One idempotent structural change.
#[derive(Debug, Clone, Copy)]
pub enum Change {
    /// `ALTER TABLE .. ADD COLUMN`, skipped when the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    /// A statement that is safe to repeat (`CREATE .. IF NOT EXISTS`).
    Execute(&'static str),
}

/// The step that moves the marker from `to - 1` to `to`.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub to: i64,
    pub description: &'static str,
    pub changes: &'static [Change],
}

/// Ordered migration chain. Append only.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        to: 1,
        description: "track per-file conversion status",
        changes: &[Change::AddColumn {
            table: "file_names",
            column: "status",
            definition: "TEXT DEFAULT 'not started'",
        }],
    },
    Migration {
        to: 2,
        description: "premium flag on users",
        changes: &[Change::AddColumn {
            table: "users",
            column: "is_premium",
            definition: "INTEGER DEFAULT 0",
        }],
    },
    Migration {
        to: 3,
        description: "per-file error text and job lookup index",
        changes: &[
            Change::AddColumn {
                table: "file_names",
                column: "error",
                definition: "TEXT NULL",
            },
            Change::Execute(
                "CREATE INDEX IF NOT EXISTS idx_file_names_job_id ON file_names(job_id)",
            ),
        ],
    },
];

/// What [`run`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// The database was empty and got the full schema directly.
    pub fresh_install: bool,
    /// Target versions of the steps applied, ascending.
    pub applied: Vec<i64>,
    /// Missing columns added by the patch pass, as `table.column`.
    pub patched: Vec<String>,
    /// Marker value after the run.
    pub version: i64,
}

/// Bring the store behind `conn` to [`CURRENT_VERSION`].
///
/// Must run before any other component touches the store. Everything runs
/// on the one connection so no pooled reader holds a lock afterwards.
///
/// # Errors
/// Any failure is [`StoreError::MigrationFailed`] naming the step's target
/// version; the store must not be used afterwards.
pub async fn run(conn: &mut SqliteConnection) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();

    if table_count(conn).await? == 0 {
        fresh_install(conn).await?;
        info!("Initialised fresh store at version {}", CURRENT_VERSION);
        report.fresh_install = true;
        report.version = CURRENT_VERSION;
        return Ok(report);
    }

    let start = read_version(conn).await?;
    if start > CURRENT_VERSION {
        return Err(StoreError::MigrationFailed {
            version: start,
            detail: format!(
                "store is at version {start}, newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    debug!("Store at version {}", start);

    for step in MIGRATIONS {
        let mut tx = conn.begin().await?;
        let live = read_version(&mut tx).await?;
        if live != step.to - 1 {
            continue;
        }
        apply_step(&mut tx, step).await?;
        tx.commit().await.map_err(|e| step_failed(step.to, e))?;
        info!("Migrated store to version {} ({})", step.to, step.description);
        report.applied.push(step.to);
    }

    let version = read_version(conn).await?;
    if version != CURRENT_VERSION {
        return Err(StoreError::MigrationFailed {
            version,
            detail: format!("migration chain stopped at version {version}"),
        });
    }

    report.patched = patch_missing(conn, version).await?;
    report.version = version;
    Ok(report)
}

/// Read `PRAGMA user_version`.
pub async fn read_version(conn: &mut SqliteConnection) -> Result<i64, StoreError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    Ok(version)
}

/// Whether `table` has a column named `column`, from live metadata.
pub async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?) WHERE name = ?)",
    )
    .bind(table)
    .bind(column)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

async fn table_count(conn: &mut SqliteConnection) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn fresh_install(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let fail = |e: sqlx::Error| step_failed(CURRENT_VERSION, e);
    let mut tx = conn.begin().await.map_err(fail)?;
    for stmt in statements(SQLITE_INIT) {
        sqlx::query(stmt).execute(&mut *tx).await.map_err(fail)?;
    }
    set_version(&mut tx, CURRENT_VERSION).await.map_err(fail)?;
    tx.commit().await.map_err(fail)
}

async fn apply_step(tx: &mut SqliteConnection, step: &Migration) -> Result<(), StoreError> {
    for change in step.changes {
        apply_change(tx, change)
            .await
            .map_err(|e| match e {
                StoreError::Database(db) => step_failed(step.to, db),
                other => other,
            })?;
    }
    set_version(tx, step.to)
        .await
        .map_err(|e| step_failed(step.to, e))
}

async fn apply_change(conn: &mut SqliteConnection, change: &Change) -> Result<(), StoreError> {
    match *change {
        Change::AddColumn {
            table,
            column,
            definition,
        } => {
            if column_exists(conn, table, column).await? {
                debug!("{}.{} already present", table, column);
                return Ok(());
            }
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} {definition}"
            ))
            .execute(&mut *conn)
            .await?;
        }
        Change::Execute(sql) => {
            sqlx::query(sql).execute(&mut *conn).await?;
        }
    }
    Ok(())
}

/// Restore anything an applied step should have created but that is missing.
///
/// Columns are looked up in live metadata and added only when absent.
/// `Execute` changes are all `IF NOT EXISTS` statements and are simply
/// re-run.
async fn patch_missing(
    conn: &mut SqliteConnection,
    version: i64,
) -> Result<Vec<String>, StoreError> {
    let mut patched = Vec::new();
    for step in MIGRATIONS.iter().filter(|m| m.to <= version) {
        for change in step.changes {
            if let Change::AddColumn { table, column, .. } = *change {
                if column_exists(conn, table, column).await? {
                    continue;
                }
                warn!("Patching {}: adding missing column {}", table, column);
                patched.push(format!("{table}.{column}"));
            }
            apply_change(conn, change)
                .await
                .map_err(|e| match e {
                    StoreError::Database(db) => step_failed(step.to, db),
                    other => other,
                })?;
        }
    }
    Ok(patched)
}

async fn set_version(conn: &mut SqliteConnection, version: i64) -> Result<(), sqlx::Error> {
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {version}"))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn step_failed(version: i64, e: sqlx::Error) -> StoreError {
    StoreError::MigrationFailed {
        version,
        detail: e.to_string(),
    }
}
