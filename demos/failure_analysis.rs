//! Failure Analysis: cluster failure reasons and mine co-occurrence rules
//!
//! Run with: cargo run --example failure_analysis
//! Verbose:  RUST_LOG=fleet_maintenance=debug cargo run --example failure_analysis

use fleet_maintenance::records::{EntityRow, FailureRecord};
use fleet_maintenance::source::InMemorySource;
use fleet_maintenance::{Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Fleet Maintenance: Failure Analysis ===\n");

    let events: &[(&str, &[&str])] = &[
        ("E1", &["worn belt", "oil leak"]),
        ("E2", &["worn belt", "oil leak", "engine overheating"]),
        ("E3", &["worn belt", "oil leak"]),
        ("E4", &["brake pad worn", "worn belt", "oil leak"]),
        ("E5", &["brake pad worn"]),
        ("E6", &["engine overheating", "coolant leak"]),
        ("E7", &["coolant leak", "engine overheating"]),
    ];
    let failures = events
        .iter()
        .flat_map(|(event, reasons)| {
            reasons
                .iter()
                .map(move |reason| FailureRecord::new(*event, *reason, "V1"))
        })
        .collect();

    let source = InMemorySource {
        entities: vec![EntityRow {
            entity_id: "V1".into(),
            registration: "KA-01-1234".into(),
        }],
        failures,
        ..InMemorySource::default()
    };

    let engine = Engine::builder()
        .config(EngineConfig::default().with_env_overrides())
        .build_in_memory()?;

    for entity in ["KA-01-1234", "V9"] {
        let analysis = engine.failure_analysis(&source, entity)?;
        println!("--- {entity} ({:?}) ---", analysis.status);
        if let Some(message) = &analysis.message {
            println!("  {message}");
            continue;
        }
        println!("  silhouette: {:.3}", analysis.silhouette_score);
        for cluster in &analysis.cluster_data {
            println!(
                "  cluster {} ({} reasons): {}",
                cluster.cluster, cluster.cluster_size, cluster.highlight
            );
        }
        for prediction in &analysis.predictions {
            println!("  cluster {} rules: {:?}", prediction.cluster, prediction.rules);
        }
        println!();
    }

    Ok(())
}
