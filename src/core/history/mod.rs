mod sqlite;

pub use sqlite::SqliteHistory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::incident::{IncidentClassification, IncidentInput, IncidentReport, SimilarIncident};

/// Summary row of a previously analyzed incident.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIncident {
    pub id: String,
    pub created_at: String,
    pub model: Option<String>,
    pub error_code: i64,
    pub error_message: String,
    pub fault_domain: String,
    pub severity: String,
}

/// Insert-only record of analyzed incidents.
#[async_trait]
pub trait IncidentHistory: Send + Sync {
    /// Persist one analysis and return its id.
    async fn save_incident(
        &self,
        input: &IncidentInput,
        classification: &IncidentClassification,
        report: &IncidentReport,
    ) -> Result<String>;

    /// Most recent incidents whose message contains the first significant
    /// word of `message`.
    async fn find_similar(&self, message: &str, limit: usize) -> Result<Vec<SimilarIncident>>;

    async fn recent(&self, limit: usize) -> Result<Vec<StoredIncident>>;

    async fn load_report(&self, id: &str) -> Result<Option<IncidentReport>>;
}

/// First word longer than three characters, the only term similarity
/// matching looks at.
pub fn similarity_keyword(message: &str) -> Option<&str> {
    message.split_whitespace().find(|w| w.chars().count() > 3)
}
