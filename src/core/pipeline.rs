use std::sync::Arc;
use tracing::{info, warn};

use super::classifier::Classifier;
use super::explainer::Explainer;
use super::guard::{InputRejection, validate_input};
use super::history::IncidentHistory;
use super::incident::{
    Analysis, IncidentClassification, IncidentInput, IncidentReport, SimilarIncident,
};
use super::normalizer::normalize;

pub struct AnalyzerConfig {
    pub max_input_chars: usize,
    pub similar_limit: usize,
}

/// Runs normalize -> classify -> explain for one request and attaches
/// matching history when a store is available.
pub struct IncidentAnalyzer {
    classifier: Classifier,
    explainer: Explainer,
    history: Option<Arc<dyn IncidentHistory>>,
    config: AnalyzerConfig,
}

impl IncidentAnalyzer {
    pub fn new(
        classifier: Classifier,
        explainer: Explainer,
        history: Option<Arc<dyn IncidentHistory>>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            classifier,
            explainer,
            history,
            config,
        }
    }

    pub fn history(&self) -> Option<&Arc<dyn IncidentHistory>> {
        self.history.as_ref()
    }

    pub fn max_input_chars(&self) -> usize {
        self.config.max_input_chars
    }

    pub async fn analyze(&self, raw: &str) -> Result<Analysis, InputRejection> {
        if let Err(rejection) = validate_input(raw, self.config.max_input_chars) {
            info!("Rejected input: {:?}", rejection);
            return Err(rejection);
        }

        let incident = normalize(raw);
        info!(
            "Analyzing {} incident (code={}, model={})",
            incident.input_type.as_str(),
            incident.error.code,
            incident.model.as_deref().unwrap_or("-")
        );

        let classification = self.classifier.classify(&incident).await;
        let mut report = self.explainer.explain(&incident, &classification).await;

        if let Some(similar) = self.augment(&incident, &classification, &report).await {
            report.similar_incidents = Some(similar);
        }

        Ok(Analysis {
            incident,
            classification,
            report,
        })
    }

    /// Look up similar incidents, then record this one. Store failures are
    /// logged and never reach the caller.
    async fn augment(
        &self,
        incident: &IncidentInput,
        classification: &IncidentClassification,
        report: &IncidentReport,
    ) -> Option<Vec<SimilarIncident>> {
        let history = self.history.as_ref()?;

        let similar = match history
            .find_similar(&incident.error.message, self.config.similar_limit)
            .await
        {
            Ok(similar) => similar,
            Err(e) => {
                warn!("History lookup failed, continuing without it: {:#}", e);
                Vec::new()
            }
        };

        match history.save_incident(incident, classification, report).await {
            Ok(id) => info!("Recorded incident {}", id),
            Err(e) => warn!("Could not record incident: {:#}", e),
        }

        (!similar.is_empty()).then_some(similar)
    }
}
