//! Failure analysis for one entity: cluster its failure reasons, mine
//! rules per cluster, and fall back to the top highlight when nothing is
//! mined.

use super::cluster::{Cluster, FailureClusterer};
use super::rules::{reason_lookup, ClusterRules, RuleMiner};
use crate::config::{ClusteringConfig, MiningConfig};
use crate::records::{EntityRow, FailureRecord};
use crate::source::ReferenceData;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Outcome class of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The entity has no failure records
    NoRecords,
    /// Too few records to cluster or mine
    InsufficientData,
    /// Clustering and mining ran
    Complete,
}

/// Failure analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    /// Outcome class
    pub status: AnalysisStatus,
    /// Informational message for the non-complete statuses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Reported clusters
    pub cluster_data: Vec<Cluster>,
    /// Rules per cluster
    pub predictions: Vec<ClusterRules>,
    /// Silhouette of the chosen clustering
    pub silhouette_score: f64,
}

impl FailureAnalysis {
    fn empty(status: AnalysisStatus, message: String) -> Self {
        Self {
            status,
            message: Some(message),
            cluster_data: Vec::new(),
            predictions: Vec::new(),
            silhouette_score: 0.0,
        }
    }
}

/// Composes the clusterer and the rule miner for one entity.
#[derive(Debug, Clone, Copy)]
pub struct FailureAnalysisOrchestrator<'a> {
    clustering: &'a ClusteringConfig,
    mining: &'a MiningConfig,
}

impl<'a> FailureAnalysisOrchestrator<'a> {
    /// Create an orchestrator.
    #[must_use]
    pub const fn new(clustering: &'a ClusteringConfig, mining: &'a MiningConfig) -> Self {
        Self { clustering, mining }
    }

    /// Load failure records and analyse `entity` (id or registration).
    ///
    /// # Errors
    ///
    /// Returns error only if the reference data cannot be loaded
    pub fn analyze<S: ReferenceData + ?Sized>(&self, source: &S, entity: &str) -> Result<FailureAnalysis> {
        let records = source.failure_records()?;
        let entities = source.entities()?;
        Ok(self.analyze_records(&records, &entities, entity))
    }

    /// Analyse `entity` over already-loaded records.
    ///
    /// The reason lookup is built from every record, not just the entity's.
    #[must_use]
    pub fn analyze_records(
        &self,
        records: &[FailureRecord],
        entities: &[EntityRow],
        entity: &str,
    ) -> FailureAnalysis {
        let lookup = reason_lookup(records);
        let entity_ids: Vec<&str> = entities
            .iter()
            .filter(|e| e.registration == entity)
            .map(|e| e.entity_id.as_str())
            .collect();
        let selected: Vec<&FailureRecord> = records
            .iter()
            .filter(|r| r.entity_id == entity || entity_ids.contains(&r.entity_id.as_str()))
            .collect();

        if selected.is_empty() {
            return FailureAnalysis::empty(
                AnalysisStatus::NoRecords,
                format!("No failure records found for entity: {entity}"),
            );
        }

        let reasons: Vec<&str> = selected.iter().map(|r| r.reason_text.as_str()).collect();
        let clusterer = FailureClusterer::new(self.clustering);
        let Some(clustering) = clusterer.cluster(reasons.as_slice()).into_value() else {
            tracing::debug!(entity, records = selected.len(), "not enough failure records");
            return FailureAnalysis::empty(
                AnalysisStatus::InsufficientData,
                "Not enough data to perform clustering or rules".to_string(),
            );
        };

        let mut predictions =
            RuleMiner::new(self.mining).mine_partitioned(&selected, &clustering.labels, &lookup);
        if predictions.iter().all(|p| p.rules.is_empty()) {
            if let Some(top) = clustering.clusters.first() {
                tracing::debug!(entity, cluster = top.cluster, "no rules mined, using highlight");
                predictions = vec![ClusterRules {
                    cluster: top.cluster,
                    rules: vec![top.highlight.clone()],
                }];
            }
        }

        FailureAnalysis {
            status: AnalysisStatus::Complete,
            message: None,
            cluster_data: clustering.clusters,
            predictions,
            silhouette_score: clustering.best_score,
        }
    }
}
