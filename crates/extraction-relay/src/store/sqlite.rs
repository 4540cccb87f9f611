//! SQLite job store
//!
//! One row per job. Sub-job references are flattened into per-kind columns so
//! the row stays readable from the `sqlite3` shell.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::JobStore;
use crate::error::{Error, Result};
use crate::types::{JobRecord, JobStatus, JobUpdate, SubJobKind, SubJobRef};

const SELECT_COLUMNS: &str = "job_id, user_id, filename, parse_job_id, parse_status, \
     extract_job_id, extract_status, overall_status, parsed_content, extracted_data, \
     error_message, options_json, created_at, updated_at";

/// SQLite-based job store
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::store(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::store(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate(true)?;
        tracing::info!("Opened job store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate(false)?;
        Ok(store)
    }

    fn migrate(&self, wal: bool) -> Result<()> {
        let conn = self.conn.lock();

        if wal {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
            "#,
            )
            .map_err(|e| Error::store(format!("Failed to set pragmas: {}", e)))?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS extraction_jobs (
                job_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                parse_job_id TEXT,
                parse_status TEXT,
                extract_job_id TEXT,
                extract_status TEXT,
                overall_status TEXT NOT NULL,
                parsed_content TEXT,
                extracted_data TEXT,
                error_message TEXT,
                options_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_extraction_jobs_user_id ON extraction_jobs(user_id);
        "#,
        )
        .map_err(|e| Error::store(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    fn get_sync(conn: &Connection, job_id: &str) -> Result<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM extraction_jobs WHERE job_id = ?1", SELECT_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::store(format!("Failed to prepare query: {}", e)))?;

        let record = stmt
            .query_row(params![job_id], row_to_job_record)
            .optional()
            .map_err(|e| Error::store(format!("Failed to get job: {}", e)))?;

        Ok(record)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let conn = self.conn.lock();
        Self::get_sync(&conn, job_id)
    }

    async fn create(&self, record: &JobRecord) -> Result<()> {
        let conn = self.conn.lock();

        let sub_job = |kind: SubJobKind| record.sub_jobs.get(&kind);
        let options_json = record
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"
            INSERT INTO extraction_jobs (
                job_id, user_id, filename, parse_job_id, parse_status, extract_job_id,
                extract_status, overall_status, parsed_content, extracted_data,
                error_message, options_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record.job_id,
                record.user_id,
                record.filename,
                sub_job(SubJobKind::Parse).map(|s| s.external_id.as_str()),
                sub_job(SubJobKind::Parse).and_then(|s| s.status).map(|s| s.as_str()),
                sub_job(SubJobKind::Extract).map(|s| s.external_id.as_str()),
                sub_job(SubJobKind::Extract).and_then(|s| s.status).map(|s| s.as_str()),
                record.status.as_str(),
                record.parsed_content,
                record.extracted_data,
                record.error_message,
                options_json,
                format_timestamp(&record.created_at),
                format_timestamp(&record.updated_at),
            ],
        )
        .map_err(|e| Error::store(format!("Failed to create job {}: {}", record.job_id, e)))?;

        Ok(())
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<JobRecord> {
        let conn = self.conn.lock();

        let sub_status = |kind: SubJobKind| update.sub_job_statuses.get(&kind).map(|s| s.as_str());

        // A non-terminal status never replaces a terminal one; sub-job columns
        // are only written for configured kinds
        let changed = conn
            .execute(
                r#"
                UPDATE extraction_jobs SET
                    parse_status = CASE WHEN parse_job_id IS NOT NULL
                        THEN COALESCE(?2, parse_status) ELSE parse_status END,
                    extract_status = CASE WHEN extract_job_id IS NOT NULL
                        THEN COALESCE(?3, extract_status) ELSE extract_status END,
                    overall_status = ?4,
                    parsed_content = COALESCE(?5, parsed_content),
                    extracted_data = COALESCE(?6, extracted_data),
                    error_message = COALESCE(?7, error_message),
                    updated_at = ?8
                WHERE job_id = ?1
                  AND (overall_status NOT IN ('SUCCESS', 'FAILED')
                       OR ?4 IN ('SUCCESS', 'FAILED'))
                "#,
                params![
                    job_id,
                    sub_status(SubJobKind::Parse),
                    sub_status(SubJobKind::Extract),
                    update.status.as_str(),
                    update.parsed_content,
                    update.extracted_data,
                    update.error_message,
                    format_timestamp(&update.updated_at),
                ],
            )
            .map_err(|e| Error::store(format!("Failed to update job {}: {}", job_id, e)))?;

        let record = Self::get_sync(&conn, job_id)?.ok_or(Error::NotFound)?;

        if changed == 0 {
            tracing::debug!(
                "[{}] Ignoring {} update over terminal {}",
                job_id,
                update.status,
                record.status
            );
        }

        Ok(record)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>> {
        let conn = self.conn.lock();

        let sql = format!(
            "SELECT {} FROM extraction_jobs WHERE user_id = ?1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::store(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map(params![user_id], row_to_job_record)
            .map_err(|e| Error::store(format!("Failed to list jobs: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_job_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let parse_job_id: Option<String> = row.get(3)?;
    let parse_status: Option<String> = row.get(4)?;
    let extract_job_id: Option<String> = row.get(5)?;
    let extract_status: Option<String> = row.get(6)?;
    let overall_status: String = row.get(7)?;
    let options_json: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    let mut sub_jobs = BTreeMap::new();
    for (kind, external_id, status) in [
        (SubJobKind::Parse, parse_job_id, parse_status),
        (SubJobKind::Extract, extract_job_id, extract_status),
    ] {
        if let Some(external_id) = external_id {
            sub_jobs.insert(
                kind,
                SubJobRef {
                    external_id,
                    status: status.as_deref().and_then(JobStatus::parse),
                },
            );
        }
    }

    Ok(JobRecord {
        job_id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        sub_jobs,
        status: JobStatus::parse(&overall_status).unwrap_or(JobStatus::Pending),
        parsed_content: row.get(8)?,
        extracted_data: row.get(9)?,
        error_message: row.get(10)?,
        options: options_json.and_then(|j| serde_json::from_str(&j).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn record(job_id: &str, user_id: &str) -> JobRecord {
        JobRecord::new(
            job_id,
            user_id,
            "invoice.pdf",
            [
                (SubJobKind::Parse, format!("p-{}", job_id)),
                (SubJobKind::Extract, format!("e-{}", job_id)),
            ],
        )
    }

    fn update(status: JobStatus) -> JobUpdate {
        JobUpdate {
            sub_job_statuses: BTreeMap::from([
                (SubJobKind::Parse, status),
                (SubJobKind::Extract, status),
            ]),
            status,
            parsed_content: None,
            extracted_data: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SqliteJobStore::in_memory().unwrap();
        let record =
            record("job-1", "user-1").with_options(Some(json!({"extraction_mode": "FAST"})));
        store.create(&record).await.unwrap();

        let loaded = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "user-1");
        assert_eq!(loaded.status, JobStatus::Pending);
        assert_eq!(loaded.sub_job_id(SubJobKind::Parse), Some("p-job-1"));
        assert_eq!(loaded.sub_job_status(SubJobKind::Extract), None);
        assert_eq!(loaded.options, Some(json!({"extraction_mode": "FAST"})));

        assert!(store.get("job-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(&record("job-1", "user-1")).await.unwrap();
        let err = store.create(&record("job-1", "user-1")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(&record("job-1", "user-1")).await.unwrap();

        let mut first = update(JobStatus::Processing);
        first.parsed_content = Some("# Title".to_string());
        store.update("job-1", &first).await.unwrap();

        let mut second = update(JobStatus::Failed);
        second.error_message = Some("Extract: Invalid extraction data".to_string());
        let stored = store.update("job-1", &second).await.unwrap();

        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.parsed_content.as_deref(), Some("# Title"));
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Extract: Invalid extraction data")
        );
        assert_eq!(stored.sub_job_status(SubJobKind::Parse), Some(JobStatus::Failed));
    }

    #[tokio::test]
    async fn test_terminal_guard() {
        let store = SqliteJobStore::in_memory().unwrap();
        store.create(&record("job-1", "user-1")).await.unwrap();

        let mut done = update(JobStatus::Success);
        done.extracted_data = Some(r#"{"a":1}"#.to_string());
        let done = store.update("job-1", &done).await.unwrap();

        let after = store
            .update("job-1", &update(JobStatus::Processing))
            .await
            .unwrap();
        assert_eq!(after, done);
    }

    #[tokio::test]
    async fn test_unconfigured_kind_stays_empty() {
        let store = SqliteJobStore::in_memory().unwrap();
        let single = JobRecord::new(
            "job-1",
            "user-1",
            "scan.pdf",
            [(SubJobKind::Extract, "e-1".to_string())],
        );
        store.create(&single).await.unwrap();

        let stored = store
            .update("job-1", &update(JobStatus::Processing))
            .await
            .unwrap();
        assert!(!stored.sub_jobs.contains_key(&SubJobKind::Parse));
        assert_eq!(
            stored.sub_job_status(SubJobKind::Extract),
            Some(JobStatus::Processing)
        );
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        let err = store
            .update("missing", &update(JobStatus::Processing))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first() {
        let store = SqliteJobStore::in_memory().unwrap();
        let mut older = record("job-1", "user-1");
        older.created_at = Utc::now() - Duration::hours(1);
        store.create(&older).await.unwrap();
        store.create(&record("job-2", "user-1")).await.unwrap();
        store.create(&record("job-3", "user-2")).await.unwrap();

        let jobs = store.list_for_user("user-1").await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-2", "job-1"]);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("extraction-relay-{}", std::process::id()));
        let path = dir.join("nested").join("jobs.db");

        let store = SqliteJobStore::open(&path);
        assert!(store.is_ok());
        assert!(path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
