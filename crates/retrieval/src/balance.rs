//! Round-robin selection of a working set across sources.

use std::collections::HashMap;

use crate::types::{CandidatePool, Document, SourceKey, WorkingSet};
use geochain_core::{AppError, AppResult, SourceCapPolicy};

#[derive(Debug, Clone)]
pub struct SourceBalancer {
    target_size: usize,
    caps: Option<SourceCapPolicy>,
}

impl SourceBalancer {
    /// Without a cap policy a single source may fill the whole budget once
    /// every other source is exhausted.
    pub fn new(target_size: usize, caps: Option<SourceCapPolicy>) -> AppResult<Self> {
        if target_size == 0 {
            return Err(AppError::Retrieval(
                "Working set size must be at least 1".to_string(),
            ));
        }
        Ok(Self { target_size, caps })
    }

    /// Pick up to `target_size` documents from `pool`.
    ///
    /// Groups are ordered by first appearance in the pool. Round `r` takes
    /// the `r`-th document of every group that still has one and is below
    /// its cap, so counts between sources never drift apart by more than
    /// one round.
    pub fn select(&self, pool: &CandidatePool) -> WorkingSet {
        let groups = group_by_source(pool.documents());
        let cap = self
            .caps
            .as_ref()
            .map_or(usize::MAX, |policy| policy.cap_for(groups.len()));

        let mut documents = Vec::with_capacity(self.target_size.min(pool.len()));
        let mut taken = vec![0usize; groups.len()];

        'rounds: for round in 0.. {
            let mut progressed = false;
            for (i, (_, docs)) in groups.iter().enumerate() {
                if documents.len() >= self.target_size {
                    break 'rounds;
                }
                if round >= cap {
                    continue;
                }
                if let Some(doc) = docs.get(round) {
                    documents.push((*doc).clone());
                    taken[i] += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        let per_source: Vec<(SourceKey, usize)> = groups
            .into_iter()
            .zip(taken)
            .filter(|(_, count)| *count > 0)
            .map(|((key, _), count)| (key, count))
            .collect();

        tracing::debug!(
            cap = if cap == usize::MAX { None } else { Some(cap) },
            selected = documents.len(),
            per_source = ?per_source
                .iter()
                .map(|(key, count)| format!("{}: {}", key, count))
                .collect::<Vec<_>>(),
            "Balanced working set"
        );

        WorkingSet {
            documents,
            per_source,
        }
    }
}

fn group_by_source(documents: &[Document]) -> Vec<(SourceKey, Vec<&Document>)> {
    let mut order: HashMap<SourceKey, usize> = HashMap::new();
    let mut groups: Vec<(SourceKey, Vec<&Document>)> = Vec::new();

    for doc in documents {
        let key = doc.source_key();
        match order.get(&key) {
            Some(&i) => groups[i].1.push(doc),
            None => {
                order.insert(key.clone(), groups.len());
                groups.push((key, vec![doc]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use geochain_core::CapTier;

    fn pool(layout: &[(&str, usize)]) -> CandidatePool {
        let docs = layout.iter().flat_map(|(source, n)| {
            (0..*n).map(move |i| Document::new(format!("{} passage {}", source, i)).with_source(*source, "2021"))
        });
        CandidatePool::from_documents(docs, 200)
    }

    fn counts(ws: &WorkingSet) -> Vec<(String, usize)> {
        ws.per_source
            .iter()
            .map(|(key, n)| (key.name.clone(), *n))
            .collect()
    }

    #[test]
    fn test_zero_target_rejected() {
        assert!(SourceBalancer::new(0, None).is_err());
    }

    #[test]
    fn test_round_robin_alternates() {
        let balancer = SourceBalancer::new(4, None).unwrap();
        let ws = balancer.select(&pool(&[("A", 5), ("B", 5)]));

        let names: Vec<String> = ws.documents.iter().map(Document::source_name).collect();
        assert_eq!(names, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn test_exhausted_group_frees_budget() {
        let balancer = SourceBalancer::new(6, None).unwrap();
        let ws = balancer.select(&pool(&[("A", 1), ("B", 10)]));
        assert_eq!(counts(&ws), vec![("A".to_string(), 1), ("B".to_string(), 5)]);
    }

    #[test]
    fn test_cap_tiers_by_distinct_sources() {
        let policy = SourceCapPolicy::default();
        let balancer = SourceBalancer::new(15, Some(policy)).unwrap();

        // five sources: two each
        let ws = balancer.select(&pool(&[("A", 5), ("B", 5), ("C", 5), ("D", 5), ("E", 5)]));
        assert_eq!(ws.len(), 10);
        assert!(ws.per_source.iter().all(|(_, n)| *n == 2));

        // three sources: four each
        let ws = balancer.select(&pool(&[("A", 10), ("B", 10), ("C", 10)]));
        assert_eq!(ws.len(), 12);

        // one source: fallback of eight
        let ws = balancer.select(&pool(&[("A", 20)]));
        assert_eq!(ws.len(), 8);
    }

    #[test]
    fn test_custom_tiers() {
        let policy = SourceCapPolicy {
            tiers: vec![CapTier {
                more_than: 1,
                cap: 1,
            }],
            fallback_cap: 3,
        };
        let balancer = SourceBalancer::new(10, Some(policy)).unwrap();
        assert_eq!(balancer.select(&pool(&[("A", 5), ("B", 5)])).len(), 2);
        assert_eq!(balancer.select(&pool(&[("A", 5)])).len(), 3);
    }

    #[test]
    fn test_no_source_starved() {
        let balancer = SourceBalancer::new(2, Some(SourceCapPolicy::default())).unwrap();
        let ws = balancer.select(&pool(&[("A", 10), ("B", 1)]));
        assert_eq!(counts(&ws), vec![("A".to_string(), 1), ("B".to_string(), 1)]);
    }

    #[test]
    fn test_counts_differ_by_at_most_one() {
        let balancer = SourceBalancer::new(7, None).unwrap();
        let ws = balancer.select(&pool(&[("A", 5), ("B", 5), ("C", 5)]));
        let values: Vec<usize> = ws.per_source.iter().map(|(_, n)| *n).collect();
        assert_eq!(values, vec![3, 2, 2]);
    }

    #[test]
    fn test_deterministic() {
        let balancer = SourceBalancer::new(5, Some(SourceCapPolicy::default())).unwrap();
        let p = pool(&[("A", 4), ("B", 3), ("C", 2)]);
        let first: Vec<String> = balancer.select(&p).documents.into_iter().map(|d| d.content).collect();
        let second: Vec<String> = balancer.select(&p).documents.into_iter().map(|d| d.content).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_pool() {
        let balancer = SourceBalancer::new(5, None).unwrap();
        assert!(balancer.select(&CandidatePool::new(200)).is_empty());
    }
}
