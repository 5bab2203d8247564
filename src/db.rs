use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use std::path::PathBuf;

use crate::models::{Job, NewJob, SearchEntry, SearchKey, Status};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Result of a bulk insert: what went in, and how many links we already knew.
#[derive(Debug, Default)]
pub struct StoreOutcome {
    pub accepted: Vec<Job>,
    pub duplicates: usize,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "autoapply") {
            Ok(proj_dirs.data_dir().join("autoapply.db"))
        } else {
            Ok(PathBuf::from("autoapply.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                keywords TEXT NOT NULL DEFAULT '',
                board TEXT NOT NULL,
                country TEXT NOT NULL DEFAULT 'global',
                location_type TEXT NOT NULL DEFAULT 'remote',
                starts_at INTEGER NOT NULL DEFAULT 1,
                timestamp TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_id INTEGER NOT NULL REFERENCES searches(id),
                title TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE,
                description TEXT,
                details TEXT,
                board TEXT NOT NULL,
                resume TEXT,
                custom_fields TEXT NOT NULL DEFAULT '[]',
                custom_fields_answers TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'Discovered' CHECK (status IN (
                    'Discovered', 'Scraped', 'Reviewed', 'Prepared', 'Applied',
                    'Rejected', 'Timeout', 'Not Found', 'Not Qualified',
                    'Not Interested', 'Not Ready', 'Ready')),
                timestamp TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_searches_key
                ON searches(query, keywords, board, country, location_type);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'autoapply init' first."
            ));
        }
        Ok(())
    }

    // --- Job operations ---

    /// Insert newly discovered jobs. A uniqueness violation on the canonical
    /// link is counted and skipped; insertion continues with the rest.
    pub fn store_jobs(&self, jobs: &[NewJob]) -> Result<StoreOutcome> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO jobs (search_id, title, link, board, resume) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        let mut outcome = StoreOutcome::default();
        for job in jobs {
            match stmt.execute(params![
                job.search_id,
                job.title,
                job.link,
                job.board,
                job.resume
            ]) {
                Ok(_) => {
                    let id = self.conn.last_insert_rowid();
                    let stored = self
                        .get_job_by_id(id)?
                        .ok_or_else(|| anyhow!("Job #{} vanished after insert", id))?;
                    outcome.accepted.push(stored);
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    outcome.duplicates += 1;
                }
                Err(e) => return Err(e).context("Failed to store discovered job"),
            }
        }

        Ok(outcome)
    }

    /// Oldest job currently in the given status, if any.
    pub fn get_job(&self, status: Status) -> Result<Option<Job>> {
        let result = self.conn.query_row(
            &format!("{JOB_SELECT} WHERE status = ?1 ORDER BY id LIMIT 1"),
            [status.as_str()],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_jobs(&self, status: Status, limit: usize) -> Result<Vec<Job>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{JOB_SELECT} WHERE status = ?1 ORDER BY id LIMIT ?2"))?;
        let rows = stmt.query_map(params![status.as_str(), limit as i64], Self::row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs by status")
    }

    pub fn get_job_by_id(&self, id: i64) -> Result<Option<Job>> {
        let result = self.conn.query_row(
            &format!("{JOB_SELECT} WHERE id = ?1"),
            [id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_jobs(&self, status: Option<Status>) -> Result<Vec<Job>> {
        let mut sql = JOB_SELECT.to_string();
        if status.is_some() {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map([s.as_str()], Self::row_to_job)?
        } else {
            stmt.query_map([], Self::row_to_job)?
        };

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    /// Per-row update keyed by job identity. Everything a stage may touch.
    pub fn update_job(&self, job: &Job) -> Result<()> {
        self.conn.execute(
            "UPDATE jobs SET description = ?1, details = ?2, custom_fields = ?3,
             custom_fields_answers = ?4, resume = ?5, status = ?6 WHERE id = ?7",
            params![
                job.description,
                job.details
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                serde_json::to_string(&job.custom_fields)?,
                serde_json::to_string(&job.custom_fields_answers)?,
                job.resume,
                job.status.as_str(),
                job.id,
            ],
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let details: Option<String> = row.get(5)?;
        let custom_fields: String = row.get(8)?;
        let answers: String = row.get(9)?;
        let status: String = row.get(10)?;

        Ok(Job {
            id: row.get(0)?,
            search_id: row.get(1)?,
            title: row.get(2)?,
            link: row.get(3)?,
            description: row.get(4)?,
            // Tolerate malformed JSON left by older versions instead of
            // refusing to load the row.
            details: details.and_then(|d| serde_json::from_str(&d).ok()),
            board: row.get(6)?,
            resume: row.get(7)?,
            custom_fields: serde_json::from_str(&custom_fields).unwrap_or_default(),
            custom_fields_answers: serde_json::from_str(&answers).unwrap_or_default(),
            status: status.parse().map_err(|e: anyhow::Error| {
                rusqlite::Error::FromSqlConversionFailure(
                    10,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            timestamp: row.get(11)?,
        })
    }

    // --- Search operations ---

    /// Latest page fetched for this (query, keywords, board, country,
    /// location_type) tuple. The engine resumes pagination from here.
    pub fn get_last_search(&self, key: &SearchKey) -> Result<Option<SearchEntry>> {
        let result = self.conn.query_row(
            "SELECT id, query, keywords, board, country, location_type, starts_at, timestamp
             FROM searches
             WHERE query = ?1 AND keywords = ?2 AND board = ?3
               AND country = ?4 AND location_type = ?5
             ORDER BY id DESC LIMIT 1",
            params![
                key.query,
                key.keywords,
                key.board,
                key.country,
                key.location_type.as_str()
            ],
            Self::row_to_search,
        );
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store_search(&self, key: &SearchKey, starts_at: u32) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO searches (query, keywords, board, country, location_type, starts_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.query,
                key.keywords,
                key.board,
                key.country,
                key.location_type.as_str(),
                starts_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn row_to_search(row: &rusqlite::Row) -> rusqlite::Result<SearchEntry> {
        let location_type: String = row.get(5)?;
        Ok(SearchEntry {
            id: row.get(0)?,
            query: row.get(1)?,
            keywords: row.get(2)?,
            board: row.get(3)?,
            country: row.get(4)?,
            location_type: location_type.parse().map_err(|e: anyhow::Error| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
            })?,
            starts_at: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }
}

const JOB_SELECT: &str = "SELECT id, search_id, title, link, description, details, board, resume,
     custom_fields, custom_fields_answers, status, timestamp FROM jobs";
