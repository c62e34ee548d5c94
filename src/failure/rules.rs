//! Association rule mining over failure transactions (Apriori)
//!
//! A transaction is the set of distinct reasons recorded for one
//! replacement event. Frequent item sets are grown level by level from
//! integer support counts; every frequent set of 2+ items yields one rule
//! per non-empty proper antecedent subset.
//!
//! ```text
//! support(A→B)    = count(A∪B) / n
//! confidence(A→B) = count(A∪B) / count(A)
//! lift(A→B)       = count(A∪B) · n / (count(A) · count(B))
//! ```

use crate::config::MiningConfig;
use crate::outcome::Outcome;
use crate::records::FailureRecord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Item (reason) to display text.
pub type ReasonLookup = FxHashMap<String, String>;

/// One mined rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    /// Left-hand side
    pub antecedents: BTreeSet<String>,
    /// Right-hand side
    pub consequents: BTreeSet<String>,
    /// Share of transactions containing both sides
    pub support: f64,
    /// Share of antecedent transactions also containing the consequent
    pub confidence: f64,
    /// Co-occurrence relative to independence
    pub lift: f64,
}

/// Rules of one cluster, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRules {
    /// Cluster id
    pub cluster: usize,
    /// Top consequents, strongest first
    pub rules: Vec<String>,
}

/// Group records into transactions by event id, in first-seen order.
#[must_use]
pub fn transactions(records: &[&FailureRecord]) -> Vec<BTreeSet<String>> {
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut out: Vec<BTreeSet<String>> = Vec::new();
    for record in records {
        let slot = *index.entry(record.event_id.as_str()).or_insert_with(|| {
            out.push(BTreeSet::new());
            out.len() - 1
        });
        out[slot].insert(record.reason_text.clone());
    }
    out
}

/// Event id to reason text, first reason per event wins.
#[must_use]
pub fn reason_lookup(records: &[FailureRecord]) -> ReasonLookup {
    let mut lookup = ReasonLookup::default();
    for record in records {
        lookup
            .entry(record.event_id.clone())
            .or_insert_with(|| record.reason_text.clone());
    }
    lookup
}

/// Apriori rule miner.
#[derive(Debug, Clone, Copy)]
pub struct RuleMiner<'a> {
    config: &'a MiningConfig,
}

impl<'a> RuleMiner<'a> {
    /// Create a miner.
    #[must_use]
    pub const fn new(config: &'a MiningConfig) -> Self {
        Self { config }
    }

    /// Mine one flat rule list, sorted by lift descending.
    ///
    /// `Insufficient` below `min_transactions`; an empty `Computed` list when
    /// nothing is frequent or no rule reaches the lift threshold.
    #[must_use]
    pub fn mine_global(&self, transactions: &[BTreeSet<String>]) -> Outcome<Vec<AssociationRule>> {
        let n = transactions.len();
        let required = self.config.min_transactions.max(1);
        if n < required {
            return Outcome::insufficient(n, required);
        }

        let items: Vec<&String> = transactions
            .iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoded: Vec<Vec<usize>> = transactions
            .iter()
            .map(|t| {
                t.iter()
                    .filter_map(|item| items.binary_search(&item).ok())
                    .collect()
            })
            .collect();

        let frequent = self.frequent_itemsets(&encoded, items.len());
        let mut rules = self.derive_rules(&frequent, n, &items);
        rules.sort_by(|a, b| b.lift.total_cmp(&a.lift));
        tracing::debug!(
            transactions = n,
            itemsets = frequent.len(),
            rules = rules.len(),
            "mined association rules"
        );
        Outcome::computed(rules)
    }

    /// Display strings of the top rules: consequents mapped through
    /// `lookup` (unknown items shown as-is) and joined with ", ".
    #[must_use]
    pub fn predictions(&self, rules: &[AssociationRule], lookup: &ReasonLookup) -> Vec<String> {
        rules
            .iter()
            .take(self.config.top_rules)
            .map(|rule| {
                rule.consequents
                    .iter()
                    .map(|item| lookup.get(item).map_or(item.as_str(), String::as_str))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }

    /// Mine each cluster's records independently.
    ///
    /// `labels[i]` is the cluster of `records[i]`. Returns one entry per
    /// cluster in ascending id order; a cluster too small to mine gets an
    /// empty list.
    #[must_use]
    pub fn mine_partitioned(
        &self,
        records: &[&FailureRecord],
        labels: &[usize],
        lookup: &ReasonLookup,
    ) -> Vec<ClusterRules> {
        let mut partitions: std::collections::BTreeMap<usize, Vec<&FailureRecord>> =
            std::collections::BTreeMap::new();
        for (&record, &label) in records.iter().zip(labels) {
            partitions.entry(label).or_default().push(record);
        }

        partitions
            .into_iter()
            .map(|(cluster, members)| {
                let rules = self
                    .mine_global(&transactions(&members))
                    .map(|rules| self.predictions(&rules, lookup))
                    .unwrap_or_default();
                ClusterRules { cluster, rules }
            })
            .collect()
    }

    /// Frequent item sets with their counts, ordered by size then items.
    #[allow(clippy::cast_precision_loss)]
    fn frequent_itemsets(&self, encoded: &[Vec<usize>], item_count: usize) -> Vec<(Vec<usize>, usize)> {
        let n = encoded.len() as f64;
        let is_frequent = |count: usize| count > 0 && count as f64 / n >= self.config.min_support;
        let max_len = self.config.max_itemset_len.unwrap_or(usize::MAX);

        let mut singles = vec![0_usize; item_count];
        for t in encoded {
            for &i in t {
                singles[i] += 1;
            }
        }
        let mut level: Vec<(Vec<usize>, usize)> = singles
            .into_iter()
            .enumerate()
            .filter(|&(_, c)| is_frequent(c))
            .map(|(i, c)| (vec![i], c))
            .collect();

        let mut all = Vec::new();
        let mut size = 1;
        while !level.is_empty() {
            all.extend(level.iter().cloned());
            if size >= max_len {
                break;
            }
            let known: BTreeSet<&Vec<usize>> = level.iter().map(|(s, _)| s).collect();
            let mut next = Vec::new();
            for (a, (left, _)) in level.iter().enumerate() {
                for (right, _) in &level[a + 1..] {
                    if left[..size - 1] != right[..size - 1] {
                        continue;
                    }
                    let mut candidate = left.clone();
                    candidate.push(right[size - 1]);
                    candidate.sort_unstable();
                    let closed = (0..candidate.len()).all(|skip| {
                        let subset: Vec<usize> = candidate
                            .iter()
                            .enumerate()
                            .filter(|&(j, _)| j != skip)
                            .map(|(_, &v)| v)
                            .collect();
                        known.contains(&subset)
                    });
                    if !closed {
                        continue;
                    }
                    let count = encoded
                        .iter()
                        .filter(|t| candidate.iter().all(|i| t.binary_search(i).is_ok()))
                        .count();
                    if is_frequent(count) {
                        next.push((candidate, count));
                    }
                }
            }
            next.sort();
            level = next;
            size += 1;
        }
        all
    }

    #[allow(clippy::cast_precision_loss)]
    fn derive_rules(
        &self,
        frequent: &[(Vec<usize>, usize)],
        n: usize,
        items: &[&String],
    ) -> Vec<AssociationRule> {
        let counts: FxHashMap<&[usize], usize> =
            frequent.iter().map(|(s, c)| (s.as_slice(), *c)).collect();
        let name = |set: &[usize]| -> BTreeSet<String> {
            set.iter().map(|&i| items[i].clone()).collect()
        };

        let mut rules = Vec::new();
        for (set, count) in frequent.iter().filter(|(s, _)| (2..64).contains(&s.len())) {
            for mask in 1..(1_u64 << set.len()) - 1 {
                let mut lhs = Vec::new();
                let mut rhs = Vec::new();
                for (j, &item) in set.iter().enumerate() {
                    if mask & (1 << j) == 0 {
                        rhs.push(item);
                    } else {
                        lhs.push(item);
                    }
                }
                let (Some(&count_a), Some(&count_b)) =
                    (counts.get(lhs.as_slice()), counts.get(rhs.as_slice()))
                else {
                    continue;
                };
                let lift = (count * n) as f64 / (count_a * count_b) as f64;
                if lift < self.config.min_lift {
                    continue;
                }
                rules.push(AssociationRule {
                    antecedents: name(&lhs),
                    consequents: name(&rhs),
                    support: *count as f64 / n as f64,
                    confidence: *count as f64 / count_a as f64,
                    lift,
                });
            }
        }
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn scenario() -> Vec<BTreeSet<String>> {
        vec![
            set(&["worn belt", "oil leak"]),
            set(&["worn belt", "oil leak", "flat tyre"]),
            set(&["worn belt", "oil leak"]),
            set(&["worn belt", "oil leak"]),
            set(&["flat tyre"]),
        ]
    }

    #[test]
    fn test_strong_pair_is_surfaced_first() {
        let config = MiningConfig::default();
        let rules = RuleMiner::new(&config).mine_global(&scenario()).into_value().unwrap();

        let belt_to_oil = rules
            .iter()
            .find(|r| r.antecedents == set(&["worn belt"]) && r.consequents == set(&["oil leak"]))
            .unwrap();
        assert!((belt_to_oil.support - 0.8).abs() < 1e-12);
        assert!((belt_to_oil.lift - 1.25).abs() < 1e-12);
        assert!((belt_to_oil.confidence - 1.0).abs() < 1e-12);
        assert!((rules[0].lift - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_rules_sorted_and_above_min_lift() {
        let config = MiningConfig::default();
        let rules = RuleMiner::new(&config).mine_global(&scenario()).into_value().unwrap();
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.lift >= 1.0));
        assert!(rules.windows(2).all(|w| w[0].lift >= w[1].lift));
        // worn belt -> flat tyre has lift 0.625
        assert!(!rules
            .iter()
            .any(|r| r.antecedents == set(&["worn belt"]) && r.consequents == set(&["flat tyre"])));
    }

    #[test]
    fn test_single_transaction_is_insufficient() {
        let config = MiningConfig::default();
        let outcome = RuleMiner::new(&config).mine_global(&[set(&["a", "b"])]);
        assert_eq!(outcome, Outcome::insufficient(1, 2));
    }

    #[test]
    fn test_min_transactions_is_configurable() {
        let strict = MiningConfig {
            min_transactions: 6,
            ..MiningConfig::default()
        };
        assert_eq!(
            RuleMiner::new(&strict).mine_global(&scenario()),
            Outcome::insufficient(5, 6)
        );

        let lenient = MiningConfig {
            min_transactions: 1,
            ..MiningConfig::default()
        };
        let rules = RuleMiner::new(&lenient)
            .mine_global(&[set(&["a", "b"])])
            .into_value()
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| (r.lift - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_disjoint_transactions_yield_no_rules() {
        let config = MiningConfig::default();
        let outcome = RuleMiner::new(&config).mine_global(&[set(&["a"]), set(&["b"])]);
        assert_eq!(outcome, Outcome::computed(vec![]));
    }

    #[test]
    fn test_min_support_prunes_rare_sets() {
        let config = MiningConfig {
            min_support: 0.5,
            ..MiningConfig::default()
        };
        let rules = RuleMiner::new(&config).mine_global(&scenario()).into_value().unwrap();
        assert!(rules.iter().all(|r| r.support >= 0.5));
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_predictions_map_through_lookup() {
        let config = MiningConfig {
            top_rules: 1,
            ..MiningConfig::default()
        };
        let miner = RuleMiner::new(&config);
        let rule = AssociationRule {
            antecedents: set(&["a"]),
            consequents: set(&["R7", "oil leak"]),
            support: 0.5,
            confidence: 1.0,
            lift: 2.0,
        };
        let mut lookup = ReasonLookup::default();
        lookup.insert("R7".into(), "worn belt".into());

        let shown = miner.predictions(&[rule.clone(), rule], &lookup);
        assert_eq!(shown, vec!["worn belt, oil leak".to_string()]);
    }

    #[test]
    fn test_transactions_group_by_event() {
        let records = [
            FailureRecord::new("E1", "worn belt", "V1"),
            FailureRecord::new("E2", "flat tyre", "V1"),
            FailureRecord::new("E1", "oil leak", "V1"),
            FailureRecord::new("E1", "worn belt", "V1"),
        ];
        let refs: Vec<&FailureRecord> = records.iter().collect();
        assert_eq!(
            transactions(&refs),
            vec![set(&["worn belt", "oil leak"]), set(&["flat tyre"])]
        );
        let lookup = reason_lookup(&records);
        assert_eq!(lookup["E1"], "worn belt");
    }

    #[test]
    fn test_partitioned_mining_is_per_cluster() {
        let config = MiningConfig::default();
        let records = [
            FailureRecord::new("E1", "worn belt", "V1"),
            FailureRecord::new("E1", "oil leak", "V1"),
            FailureRecord::new("E2", "worn belt", "V1"),
            FailureRecord::new("E2", "oil leak", "V1"),
            FailureRecord::new("E3", "flat tyre", "V1"),
            FailureRecord::new("E4", "worn belt", "V1"),
        ];
        let refs: Vec<&FailureRecord> = records.iter().collect();
        let labels = [1, 1, 1, 1, 0, 1];

        let partitioned =
            RuleMiner::new(&config).mine_partitioned(&refs, &labels, &ReasonLookup::default());

        assert_eq!(partitioned.len(), 2);
        assert_eq!(partitioned[0], ClusterRules { cluster: 0, rules: vec![] });
        assert_eq!(partitioned[1].cluster, 1);
        // E1, E2 = {belt, oil}, E4 = {belt}: oil -> belt has lift 1.0
        assert_eq!(partitioned[1].rules.first().map(String::as_str), Some("worn belt"));
    }
}
