//! Failure reason analysis
//!
//! ```text
//! reasons ──> TfIdf ──> KMeans (k = 2..) ──> silhouette ──> Clustering
//!                                                             │ labels
//! records ──> transactions per event ──> Apriori per cluster ─┴─> FailureAnalysis
//! ```

pub mod analysis;
pub mod cluster;
pub mod kmeans;
pub mod rules;
pub mod silhouette;
pub mod tfidf;

pub use analysis::{AnalysisStatus, FailureAnalysis, FailureAnalysisOrchestrator};
pub use cluster::{Cluster, Clustering, FailureClusterer};
pub use rules::{AssociationRule, ClusterRules, ReasonLookup, RuleMiner};
