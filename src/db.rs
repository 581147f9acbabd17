use anyhow::{anyhow, Context, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{EnrichedRecord, LinkUpdate, SavedLink, EMPLOYMENT_TYPES, LINK_STATUSES};

const LINK_COLUMNS: &str = "id, owner, url, normalized_url, title, company, location, job_type,
     source, status, relatedness, richness, tags, email_subject, email_sender, notes,
     created_at, updated_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub total: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_source: Vec<(String, i64)>,
}

impl Database {
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path())
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // XDG data directory, or the current directory
        match directories::ProjectDirs::from("", "", "jobsift") {
            Some(proj_dirs) => proj_dirs.data_dir().join("jobsift.db"),
            None => PathBuf::from("jobsift.db"),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT,
                job_type TEXT,
                source TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'saved' CHECK (status IN ('saved', 'applied', 'interview', 'rejected', 'offer')),
                relatedness TEXT NOT NULL,
                richness TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                email_subject TEXT,
                email_sender TEXT,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (owner, normalized_url)
            );

            CREATE INDEX IF NOT EXISTS idx_links_owner_status ON job_links(owner, status);
            CREATE INDEX IF NOT EXISTS idx_links_owner_source ON job_links(owner, source);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='job_links'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'jobsift init' first."));
        }
        Ok(())
    }

    // The subset of `identities` already stored for `owner`.
    pub fn known_identities(&self, owner: &str, identities: &[String]) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM job_links WHERE owner = ?1 AND normalized_url = ?2")?;
        let mut known = HashSet::new();
        for identity in identities {
            if stmt.exists(params![owner, identity])? {
                known.insert(identity.clone());
            }
        }
        Ok(known)
    }

    // Inserts records, skipping any whose identity the owner already has.
    // Returns how many rows were actually written.
    pub fn insert_records(&self, owner: &str, records: &[EnrichedRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO job_links
                    (owner, url, normalized_url, title, company, location, job_type, source,
                     relatedness, richness, tags, email_subject, email_sender)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for record in records {
                let tags = serde_json::to_string(&record.tags)?;
                let context = record.context.as_ref();
                let changed = stmt.execute(params![
                    owner,
                    record.url,
                    record.normalized_url,
                    record.title,
                    record.company,
                    record.location,
                    record.job_type,
                    record.source.as_str(),
                    record.relatedness.as_str(),
                    record.richness.as_str(),
                    tags,
                    context.and_then(|c| c.subject.as_deref()),
                    context.and_then(|c| c.sender.as_deref()),
                ])?;
                if changed == 0 {
                    debug!(url = %record.url, "identity already stored, skipped");
                }
                inserted += changed;
            }
        }
        tx.commit()?;
        info!(owner = %owner, inserted, offered = records.len(), "stored job links");
        Ok(inserted)
    }

    pub fn list_links(
        &self,
        owner: &str,
        status: Option<&str>,
        source: Option<&str>,
    ) -> Result<Vec<SavedLink>> {
        let mut sql = format!("SELECT {} FROM job_links WHERE owner = ?1", LINK_COLUMNS);
        let mut params: Vec<String> = vec![owner.to_string()];

        if let Some(s) = status {
            params.push(s.to_string());
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }

        if let Some(s) = source {
            params.push(s.to_lowercase());
            sql.push_str(&format!(" AND source = ?{}", params.len()));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_link)?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list job links")
    }

    pub fn get_link(&self, owner: &str, id: i64) -> Result<Option<SavedLink>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM job_links WHERE owner = ?1 AND id = ?2", LINK_COLUMNS),
            params![owner, id],
            Self::row_to_link,
        );
        match result {
            Ok(link) => Ok(Some(link)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // Applies manual overrides. Returns false when no such link exists.
    pub fn update_link(&self, owner: &str, id: i64, update: &LinkUpdate) -> Result<bool> {
        if update.is_empty() {
            return Err(anyhow!("Nothing to update"));
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = &update.status {
            if !LINK_STATUSES.contains(&status.as_str()) {
                return Err(anyhow!(
                    "Invalid status '{}'. Use: {}",
                    status,
                    LINK_STATUSES.join(", ")
                ));
            }
            sets.push("status".to_string());
            values.push(Value::Text(status.clone()));
        }

        for (column, value) in [("title", &update.title), ("company", &update.company)] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(anyhow!("{} cannot be empty", column));
                }
                sets.push(column.to_string());
                values.push(Value::Text(value.trim().to_string()));
            }
        }

        if let Some(job_type) = &update.job_type {
            if !job_type.is_empty() && !EMPLOYMENT_TYPES.contains(&job_type.as_str()) {
                return Err(anyhow!(
                    "Invalid job type '{}'. Use: {}",
                    job_type,
                    EMPLOYMENT_TYPES.join(", ")
                ));
            }
        }

        // Empty string clears the column
        for (column, value) in [
            ("location", &update.location),
            ("job_type", &update.job_type),
            ("notes", &update.notes),
        ] {
            if let Some(value) = value {
                sets.push(column.to_string());
                values.push(if value.is_empty() {
                    Value::Null
                } else {
                    Value::Text(value.clone())
                });
            }
        }

        if let Some(tags) = &update.tags {
            sets.push("tags".to_string());
            values.push(Value::Text(serde_json::to_string(tags)?));
        }

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        values.push(Value::Text(owner.to_string()));
        values.push(Value::Integer(id));

        let sql = format!(
            "UPDATE job_links SET {}, updated_at = datetime('now') WHERE owner = ?{} AND id = ?{}",
            assignments.join(", "),
            values.len() - 1,
            values.len()
        );
        let changed = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(changed > 0)
    }

    pub fn delete_link(&self, owner: &str, id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM job_links WHERE owner = ?1 AND id = ?2",
            params![owner, id],
        )?;
        Ok(changed > 0)
    }

    pub fn stats(&self, owner: &str) -> Result<LinkStats> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM job_links WHERE owner = ?1",
            [owner],
            |row| row.get(0),
        )?;

        let mut by_status = Vec::new();
        for status in LINK_STATUSES {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM job_links WHERE owner = ?1 AND status = ?2",
                params![owner, status],
                |row| row.get(0),
            )?;
            by_status.push((status.to_string(), count));
        }

        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*) FROM job_links WHERE owner = ?1
             GROUP BY source ORDER BY COUNT(*) DESC, source",
        )?;
        let by_source: Vec<(String, i64)> = stmt
            .query_map([owner], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to count job links by source")?;

        Ok(LinkStats {
            total,
            by_status,
            by_source,
        })
    }

    fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<SavedLink> {
        let tags: String = row.get(12)?;
        let tags: Vec<String> = serde_json::from_str(&tags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;
        Ok(SavedLink {
            id: row.get(0)?,
            owner: row.get(1)?,
            url: row.get(2)?,
            normalized_url: row.get(3)?,
            title: row.get(4)?,
            company: row.get(5)?,
            location: row.get(6)?,
            job_type: row.get(7)?,
            source: row.get(8)?,
            status: row.get(9)?,
            relatedness: row.get(10)?,
            richness: row.get(11)?,
            tags,
            email_subject: row.get(13)?,
            email_sender: row.get(14)?,
            notes: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}
