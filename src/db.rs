use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Application, ApplicationPatch, Cv, NewApplication, NewCv, SalaryRange, TimelineEvent};
use crate::store::{ApplicationStore, Listing};

const APPLICATION_COLUMNS: &str = "id, owner_id, job_title, company, location, is_remote, job_url, \
     job_description, salary_min, salary_max, salary_currency, status, source, priority, cv_id, \
     cover_letter, recruiter_name, recruiter_email, notes, tags, match_score, applied_date, \
     response_date, interview_date, offer_date, last_follow_up_date, next_follow_up_date, \
     timeline, created_at, updated_at";

const CV_COLUMNS: &str = "id, owner_id, name, file_name, file_url, file_size, tags, category, \
     version, description, created_at, updated_at";

const APPLICATIONS_INDEX: &str = "idx_applications_owner_created";
const CVS_INDEX: &str = "idx_cvs_owner_created";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cvs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_url TEXT NOT NULL,
                file_size INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                category TEXT,
                version INTEGER NOT NULL DEFAULT 1,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                job_title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                is_remote INTEGER NOT NULL DEFAULT 0,
                job_url TEXT,
                job_description TEXT,
                salary_min INTEGER,
                salary_max INTEGER,
                salary_currency TEXT NOT NULL DEFAULT 'USD',
                status TEXT NOT NULL DEFAULT 'saved',
                source TEXT NOT NULL DEFAULT 'other',
                priority TEXT NOT NULL DEFAULT 'medium',
                cv_id TEXT,
                cover_letter TEXT,
                recruiter_name TEXT,
                recruiter_email TEXT,
                notes TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                match_score REAL,
                applied_date TEXT,
                response_date TEXT,
                interview_date TEXT,
                offer_date TEXT,
                last_follow_up_date TEXT,
                next_follow_up_date TEXT,
                timeline TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_applications_owner_created ON applications(owner_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_cvs_owner_created ON cvs(owner_id, created_at DESC);
            "#,
        )?;
        info!(path = %self.path.display(), "database initialized");
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::Unavailable(
                "Database not initialized. Run 'applytrack init' first.".to_string(),
            ));
        }
        Ok(())
    }

    fn has_index(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // --- Application operations ---

    pub fn create_application(&self, owner_id: &str, new: NewApplication) -> Result<Application, StoreError> {
        let app = Application::create(owner_id, new, Utc::now())?;
        self.conn.execute(
            &format!(
                "INSERT INTO applications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, \
                 ?27, ?28, ?29, ?30)",
                APPLICATION_COLUMNS
            ),
            params![
                app.id,
                app.owner_id,
                app.job_title,
                app.company,
                app.location,
                app.is_remote,
                app.job_url,
                app.job_description,
                app.salary.min,
                app.salary.max,
                app.salary.currency,
                app.status.as_str(),
                app.source.as_str(),
                app.priority.as_str(),
                app.cv_id,
                app.cover_letter,
                app.recruiter_name,
                app.recruiter_email,
                app.notes,
                serde_json::to_string(&app.tags)?,
                app.match_score,
                app.applied_date.as_ref().map(format_ts),
                app.response_date.as_ref().map(format_ts),
                app.interview_date.as_ref().map(format_ts),
                app.offer_date.as_ref().map(format_ts),
                app.last_follow_up_date.as_ref().map(format_ts),
                app.next_follow_up_date.as_ref().map(format_ts),
                serde_json::to_string(&app.timeline)?,
                format_ts(&app.created_at),
                format_ts(&app.updated_at),
            ],
        )?;
        info!(id = %app.id, company = %app.company, status = %app.status, "application created");
        Ok(app)
    }

    pub fn delete_application(&self, id: &str) -> Result<(), StoreError> {
        let removed = self.conn.execute("DELETE FROM applications WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(id, "application deleted");
        Ok(())
    }

    pub fn add_timeline_event(&self, id: &str, event: TimelineEvent) -> Result<(), StoreError> {
        let patch = ApplicationPatch {
            append_events: vec![event],
            ..Default::default()
        };
        self.patch_application(id, &patch)
    }

    /// Looks for an existing application that is probably the same posting:
    /// same URL, or near-identical title at a near-identical company.
    pub fn find_duplicate(
        &self,
        owner_id: &str,
        title: &str,
        company: &str,
        url: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let existing = self.list_applications(owner_id)?.applications;

        if let Some(url) = url.filter(|u| !u.is_empty()) {
            if let Some(app) = existing.iter().find(|a| a.job_url.as_deref() == Some(url)) {
                return Ok(Some(app.id.clone()));
            }
        }

        let title = title.trim().to_lowercase();
        let company = company.trim().to_lowercase();
        Ok(existing
            .iter()
            .find(|a| {
                strsim::jaro_winkler(&a.job_title.to_lowercase(), &title) >= 0.92
                    && strsim::jaro_winkler(&a.company.to_lowercase(), &company) >= 0.90
            })
            .map(|a| a.id.clone()))
    }

    fn write_application(&self, app: &Application) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE applications SET status = ?1, priority = ?2, notes = ?3, applied_date = ?4,
                    response_date = ?5, interview_date = ?6, offer_date = ?7,
                    last_follow_up_date = ?8, next_follow_up_date = ?9, timeline = ?10,
                    updated_at = ?11
             WHERE id = ?12",
            params![
                app.status.as_str(),
                app.priority.as_str(),
                app.notes,
                app.applied_date.as_ref().map(format_ts),
                app.response_date.as_ref().map(format_ts),
                app.interview_date.as_ref().map(format_ts),
                app.offer_date.as_ref().map(format_ts),
                app.last_follow_up_date.as_ref().map(format_ts),
                app.next_follow_up_date.as_ref().map(format_ts),
                serde_json::to_string(&app.timeline)?,
                format_ts(&app.updated_at),
                app.id,
            ],
        )?;
        Ok(())
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let status: String = row.get(11)?;
        let source: String = row.get(12)?;
        let priority: String = row.get(13)?;
        Ok(Application {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            job_title: row.get(2)?,
            company: row.get(3)?,
            location: row.get(4)?,
            is_remote: row.get(5)?,
            job_url: row.get(6)?,
            job_description: row.get(7)?,
            salary: SalaryRange {
                min: row.get(8)?,
                max: row.get(9)?,
                currency: row.get(10)?,
            },
            status: status.into(),
            source: source.into(),
            priority: priority.parse().unwrap_or_default(),
            cv_id: row.get(14)?,
            cover_letter: row.get(15)?,
            recruiter_name: row.get(16)?,
            recruiter_email: row.get(17)?,
            notes: row.get(18)?,
            tags: json_column(row, 19)?,
            match_score: row.get(20)?,
            applied_date: optional_ts(row, 21)?,
            response_date: optional_ts(row, 22)?,
            interview_date: optional_ts(row, 23)?,
            offer_date: optional_ts(row, 24)?,
            last_follow_up_date: optional_ts(row, 25)?,
            next_follow_up_date: optional_ts(row, 26)?,
            timeline: json_column(row, 27)?,
            created_at: required_ts(row, 28)?,
            updated_at: required_ts(row, 29)?,
        })
    }

    // --- CV operations ---

    pub fn add_cv(&self, owner_id: &str, new: NewCv) -> Result<Cv, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Invalid("CV name is required".to_string()));
        }

        let previous: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM cvs WHERE owner_id = ?1 AND LOWER(name) = LOWER(?2)",
            params![owner_id, new.name],
            |row| row.get(0),
        )?;

        let now = Utc::now();
        let cv = Cv {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: new.name,
            file_name: new.file_name,
            file_url: new.file_url,
            file_size: new.file_size,
            tags: new.tags,
            category: new.category,
            version: previous as u32 + 1,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            &format!(
                "INSERT INTO cvs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                CV_COLUMNS
            ),
            params![
                cv.id,
                cv.owner_id,
                cv.name,
                cv.file_name,
                cv.file_url,
                cv.file_size as i64,
                serde_json::to_string(&cv.tags)?,
                cv.category,
                cv.version,
                cv.description,
                format_ts(&cv.created_at),
                format_ts(&cv.updated_at),
            ],
        )?;
        info!(id = %cv.id, name = %cv.name, version = cv.version, "cv added");
        Ok(cv)
    }

    /// Newest first; sorted in memory if the owner index is missing.
    pub fn list_cvs(&self, owner_id: &str) -> Result<Vec<Cv>, StoreError> {
        let ordered = self.has_index(CVS_INDEX)?;
        let mut sql = format!("SELECT {} FROM cvs WHERE owner_id = ?1", CV_COLUMNS);
        if ordered {
            sql.push_str(" ORDER BY created_at DESC");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut cvs = stmt
            .query_map([owner_id], Self::row_to_cv)?
            .collect::<Result<Vec<_>, _>>()?;

        if !ordered {
            debug!("cv index missing, sorting in memory");
            cvs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(cvs)
    }

    pub fn get_cv(&self, id: &str) -> Result<Option<Cv>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM cvs WHERE id = ?1", CV_COLUMNS),
                [id],
                Self::row_to_cv,
            )
            .optional()?)
    }

    /// Removes the CV and detaches it from any application that used it.
    pub fn delete_cv(&self, id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM cvs WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tx.execute("UPDATE applications SET cv_id = NULL WHERE cv_id = ?1", [id])?;
        tx.commit()?;
        info!(id, "cv deleted");
        Ok(())
    }

    fn row_to_cv(row: &rusqlite::Row) -> rusqlite::Result<Cv> {
        let file_size: i64 = row.get(5)?;
        Ok(Cv {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            file_name: row.get(3)?,
            file_url: row.get(4)?,
            file_size: file_size.max(0) as u64,
            tags: json_column(row, 6)?,
            category: row.get(7)?,
            version: row.get(8)?,
            description: row.get(9)?,
            created_at: required_ts(row, 10)?,
            updated_at: required_ts(row, 11)?,
        })
    }
}

impl ApplicationStore for Database {
    fn list_applications(&self, owner_id: &str) -> Result<Listing, StoreError> {
        let ordered = self.has_index(APPLICATIONS_INDEX)?;
        let mut sql = format!("SELECT {} FROM applications WHERE owner_id = ?1", APPLICATION_COLUMNS);
        if ordered {
            sql.push_str(" ORDER BY created_at DESC");
        } else {
            debug!("application index missing, returning unordered listing");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner_id], |row| {
            let id: String = row.get(0)?;
            Ok((id, Self::row_to_application(row)))
        })?;

        // Rows that fail to decode are skipped
        let mut applications = Vec::new();
        for row in rows {
            match row? {
                (_, Ok(app)) => applications.push(app),
                (id, Err(error)) => warn!(id = %id, error = %error, "skipping malformed application row"),
            }
        }

        Ok(Listing { applications, ordered })
    }

    fn get_application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM applications WHERE id = ?1", APPLICATION_COLUMNS),
                [id],
                Self::row_to_application,
            )
            .optional()?)
    }

    fn patch_application(&self, id: &str, patch: &ApplicationPatch) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut app = self
            .get_application(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(&mut app, Utc::now())?;
        self.write_application(&app)?;
        tx.commit()?;
        debug!(id, events = patch.append_events.len(), "application patched");
        Ok(())
    }
}

// --- Column helpers ---

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn required_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn optional_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
