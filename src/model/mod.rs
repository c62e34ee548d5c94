//! Forecast model persistence
//!
//! ## Layout
//!
//! ```text
//! ForecastModelStore ──> ArtifactBackend (memory | filesystem)
//!        │                     └── <key> → ModelArtifact { metadata, model }
//!        └── StalenessPolicy + Clock
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use fleet_maintenance::model::{ForecastModelStore, Provenance};
//! use fleet_maintenance::records::PairKey;
//!
//! let store = ForecastModelStore::in_memory();
//! let pair = PairKey::new("V1", "P1");
//!
//! let first = store
//!     .get_or_refit(&pair, &[1.0, 2.0][..], |s: &[f64]| Ok(s.iter().sum::<f64>()))?;
//! assert_eq!(first.provenance, Provenance::Trained);
//!
//! let second = store
//!     .get_or_refit(&pair, &[9.0][..], |s: &[f64]| Ok(s.iter().sum::<f64>()))?;
//! assert_eq!(second.provenance, Provenance::Cached);
//! # Ok::<(), fleet_maintenance::Error>(())
//! ```

mod artifact;
mod backend;
mod policy;
mod store;

pub use artifact::{ModelArtifact, ModelMetadata, FORMAT_VERSION};
pub use backend::{ArtifactBackend, FsArtifactStore, MemoryArtifactStore};
pub use policy::{Clock, FixedClock, StalenessPolicy, SystemClock};
pub use store::{Fetched, ForecastModelStore, Provenance};
