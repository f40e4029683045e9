use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{IncidentHistory, StoredIncident, similarity_keyword};
use crate::core::incident::{
    IncidentClassification, IncidentInput, IncidentReport, SimilarIncident,
};

pub struct SqliteHistory {
    db: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    /// Open (or create) the store at `db_path`. Safe to call repeatedly.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = Connection::open(db_path)?;
        Self::create_schema(&db)?;
        info!("Incident history ready at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Self::create_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn create_schema(db: &Connection) -> Result<()> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                created_at TEXT DEFAULT (datetime('now')),
                model TEXT,
                error_code INTEGER,
                error_message TEXT,
                fault_domain TEXT,
                severity TEXT,
                report TEXT
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_incidents_created_at ON incidents(created_at)",
            [],
        )?;
        Ok(())
    }
}

/// Escape LIKE wildcards so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl IncidentHistory for SqliteHistory {
    async fn save_incident(
        &self,
        input: &IncidentInput,
        classification: &IncidentClassification,
        report: &IncidentReport,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let report_json = serde_json::to_string(report)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO incidents (id, model, error_code, error_message, fault_domain, severity, report)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                input.model,
                input.error.code,
                input.error.message,
                classification.fault_domain.as_str(),
                classification.severity.as_str(),
                report_json
            ],
        )?;
        debug!("Stored incident {}", id);
        Ok(id)
    }

    async fn find_similar(&self, message: &str, limit: usize) -> Result<Vec<SimilarIncident>> {
        let Some(keyword) = similarity_keyword(message) else {
            return Ok(Vec::new());
        };

        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, created_at, error_message, fault_domain, severity FROM incidents \
             WHERE error_message LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![like_pattern(keyword), limit as i64], |row| {
            Ok(SimilarIncident {
                id: row.get(0)?,
                created_at: row.get(1)?,
                error_message: row.get(2)?,
                fault_domain: row.get(3)?,
                severity: row.get(4)?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredIncident>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, created_at, model, error_code, error_message, fault_domain, severity \
             FROM incidents ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(StoredIncident {
                id: row.get(0)?,
                created_at: row.get(1)?,
                model: row.get(2)?,
                error_code: row.get(3)?,
                error_message: row.get(4)?,
                fault_domain: row.get(5)?,
                severity: row.get(6)?,
            })
        })?;
        let mut incidents = Vec::new();
        for row in rows {
            incidents.push(row?);
        }
        Ok(incidents)
    }

    async fn load_report(&self, id: &str) -> Result<Option<IncidentReport>> {
        let db = self.db.lock().await;
        let report_json: Option<String> = db
            .query_row(
                "SELECT report FROM incidents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match report_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
