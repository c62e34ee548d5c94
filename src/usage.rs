//! Usage accumulation between consecutive replacements
//!
//! Each telemetry sample contributes `speed × hours since the entity's prior
//! sample`. A replacement's usage is the sum of contributions of the entity's
//! samples in `(prev_replaced_on, replaced_on]`.
//!
//! Samples with `speed <= 0` are idle and dropped before differencing, so the
//! elapsed time of a moving sample is measured from the previous moving one.
//! The first moving sample of an entity has no predecessor and contributes
//! nothing, although it still counts as "a sample in the window".

use crate::records::{PairKey, ReplacementEvent, UsageSample, UsageWindow};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Per-entity cumulative usage, indexed by sample time.
struct EntityTimeline {
    timestamps: Vec<DateTime<Utc>>,
    /// `cumulative[i]` = usage of samples `0..i`
    cumulative: Vec<f64>,
}

impl EntityTimeline {
    fn build(mut samples: Vec<&UsageSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);

        let mut timestamps = Vec::with_capacity(samples.len());
        let mut cumulative = Vec::with_capacity(samples.len() + 1);
        cumulative.push(0.0);

        let mut prior: Option<DateTime<Utc>> = None;
        let mut running = 0.0;
        for sample in samples {
            let contribution = prior.map_or(0.0, |p| {
                #[allow(clippy::cast_precision_loss)]
                let hours = (sample.timestamp - p).num_milliseconds() as f64
                    / 1000.0
                    / SECONDS_PER_HOUR;
                sample.speed * hours
            });
            running += contribution;
            timestamps.push(sample.timestamp);
            cumulative.push(running);
            prior = Some(sample.timestamp);
        }

        Self {
            timestamps,
            cumulative,
        }
    }

    /// Usage of samples in `(start, end]`, or `None` if there are none.
    fn usage_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        let lo = self.timestamps.partition_point(|t| *t <= start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        if hi <= lo {
            return None;
        }
        Some((self.cumulative[hi] - self.cumulative[lo]).max(0.0))
    }
}

/// Compute one usage window per replacement event.
///
/// Windows are returned grouped by (entity, part) in key order and sorted by
/// `replaced_on` within a group. Pure: inputs are only borrowed.
#[must_use]
pub fn compute_usage_windows(
    events: &[ReplacementEvent],
    samples: &[UsageSample],
) -> Vec<UsageWindow> {
    let mut per_entity: FxHashMap<&str, Vec<&UsageSample>> = FxHashMap::default();
    for sample in samples.iter().filter(|s| s.speed > 0.0 && s.speed.is_finite()) {
        per_entity.entry(sample.entity_id.as_str()).or_default().push(sample);
    }
    let timelines: FxHashMap<&str, EntityTimeline> = per_entity
        .into_iter()
        .map(|(entity, samples)| (entity, EntityTimeline::build(samples)))
        .collect();

    let mut groups: FxHashMap<PairKey, Vec<DateTime<Utc>>> = FxHashMap::default();
    for event in events {
        groups.entry(event.pair()).or_default().push(event.replaced_on);
    }
    let mut keys: Vec<PairKey> = groups.keys().cloned().collect();
    keys.sort();

    let mut windows = Vec::with_capacity(events.len());
    for key in keys {
        let Some(mut dates) = groups.remove(&key) else {
            continue;
        };
        dates.sort();
        let timeline = timelines.get(key.entity_id.as_str());

        let mut prev: Option<DateTime<Utc>> = None;
        for replaced_on in dates {
            let usage = match (prev, timeline) {
                (Some(start), Some(timeline)) => timeline.usage_between(start, replaced_on),
                _ => None,
            };
            windows.push(UsageWindow {
                entity_id: key.entity_id.clone(),
                part_id: key.part_id.clone(),
                replaced_on,
                prev_replaced_on: prev,
                usage_before_replacement: usage,
            });
            prev = Some(replaced_on);
        }
    }
    windows
}

/// Group usage windows by (entity, part), preserving window order.
#[must_use]
pub fn group_windows(windows: Vec<UsageWindow>) -> Vec<(PairKey, Vec<UsageWindow>)> {
    let mut grouped: Vec<(PairKey, Vec<UsageWindow>)> = Vec::new();
    let mut index: FxHashMap<PairKey, usize> = FxHashMap::default();
    for window in windows {
        let key = PairKey::new(window.entity_id.clone(), window.part_id.clone());
        if let Some(&slot) = index.get(&key) {
            grouped[slot].1.push(window);
        } else {
            index.insert(key.clone(), grouped.len());
            grouped.push((key, vec![window]));
        }
    }
    grouped
}

/// Most recent known usage of a group, if any.
#[must_use]
pub fn last_known_usage(windows: &[UsageWindow]) -> Option<f64> {
    windows
        .iter()
        .rev()
        .find_map(|w| w.usage_before_replacement)
}
