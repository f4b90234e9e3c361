//! Dependency resolution between lead times.
//!
//! A lead time can be converted once its immediate predecessor is also
//! available. Arrivals may come in any order, so each arrival checks both
//! neighbours: its predecessor (it completes a pair as the later member) and
//! its successor (it completes a pair as the earlier member). Both checks are
//! set lookups; nothing is rescanned.
//!
//! Offset zero has no predecessor and is never the current member of a pair.
//! Gaps in the hour sequence are not bridged.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ResolverError;
use crate::job::ConversionJob;
use crate::lead_time::LeadTimeId;

#[derive(Debug, Default)]
struct ResolverState {
    /// Lead times whose raw grid is stored locally
    available: HashSet<LeadTimeId>,
    /// Pairs already handed out for conversion
    scheduled: HashSet<ConversionJob>,
}

/// Tracks available lead times and hands out each eligible pair once.
///
/// All mutation happens under a single lock, so concurrent arrivals of both
/// members of a pair yield that pair exactly once.
#[derive(Debug, Default)]
pub struct DependencyResolver {
    cycle: Option<DateTime<Utc>>,
    state: Mutex<ResolverState>,
}

impl DependencyResolver {
    /// A resolver accepting lead times of any run.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver bound to one model run; other runs are rejected.
    pub fn for_cycle(issued: DateTime<Utc>) -> Self {
        Self {
            cycle: Some(issued),
            state: Mutex::default(),
        }
    }

    /// Record that the raw grid for `id` is available.
    ///
    /// Returns the pairs that became eligible because of this arrival, at
    /// most two. Marking an identifier twice returns nothing the second time.
    pub fn mark_available(&self, id: LeadTimeId) -> Result<Vec<ConversionJob>, ResolverError> {
        if let Some(expected) = self.cycle {
            if id.issued != expected {
                return Err(ResolverError::ForeignCycle { expected, got: id });
            }
        }

        let mut state = self.lock();
        let newly_available = state.available.insert(id);

        let candidates = [
            id.predecessor().map(|previous| (previous, id)),
            id.successor().map(|next| (id, next)),
        ];

        let mut eligible = Vec::with_capacity(2);
        for (previous, current) in candidates.into_iter().flatten() {
            if !state.available.contains(&previous) || !state.available.contains(&current) {
                continue;
            }
            if let Some(job) = ConversionJob::new(previous, current) {
                if state.scheduled.insert(job) {
                    eligible.push(job);
                }
            }
        }

        debug!(
            id = %id,
            newly_available = newly_available,
            eligible = eligible.len(),
            "Marked lead time available"
        );

        Ok(eligible)
    }

    pub fn is_available(&self, id: &LeadTimeId) -> bool {
        self.lock().available.contains(id)
    }

    pub fn is_scheduled(&self, job: &ConversionJob) -> bool {
        self.lock().scheduled.contains(job)
    }

    pub fn available_count(&self) -> usize {
        self.lock().available.len()
    }

    pub fn scheduled_count(&self) -> usize {
        self.lock().scheduled.len()
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        // Sets only grow; a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn h(offset: u32) -> LeadTimeId {
        LeadTimeId::new(issued(), offset)
    }

    fn job(previous: u32, current: u32) -> ConversionJob {
        ConversionJob::new(h(previous), h(current)).unwrap()
    }

    fn permutations(items: &[u32]) -> Vec<Vec<u32>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_forward_arrival() {
        let resolver = DependencyResolver::new();
        assert!(resolver.mark_available(h(0)).unwrap().is_empty());
        assert_eq!(resolver.mark_available(h(1)).unwrap(), vec![job(0, 1)]);
        assert_eq!(resolver.mark_available(h(2)).unwrap(), vec![job(1, 2)]);
    }

    #[test]
    fn test_successor_before_predecessor() {
        let resolver = DependencyResolver::new();
        assert!(resolver.mark_available(h(3)).unwrap().is_empty());
        assert_eq!(resolver.mark_available(h(2)).unwrap(), vec![job(2, 3)]);
    }

    #[test]
    fn test_arrival_completing_two_pairs() {
        let resolver = DependencyResolver::new();
        resolver.mark_available(h(1)).unwrap();
        resolver.mark_available(h(3)).unwrap();

        let jobs: BTreeSet<_> = resolver.mark_available(h(2)).unwrap().into_iter().collect();
        assert_eq!(jobs, BTreeSet::from([job(1, 2), job(2, 3)]));
    }

    #[test]
    fn test_offset_zero_alone_yields_nothing() {
        let resolver = DependencyResolver::new();
        assert!(resolver.mark_available(h(0)).unwrap().is_empty());
        assert_eq!(resolver.scheduled_count(), 0);
    }

    #[test]
    fn test_remarking_is_idempotent() {
        let resolver = DependencyResolver::new();
        resolver.mark_available(h(0)).unwrap();
        assert_eq!(resolver.mark_available(h(1)).unwrap().len(), 1);
        assert!(resolver.mark_available(h(1)).unwrap().is_empty());
        assert!(resolver.mark_available(h(0)).unwrap().is_empty());
        assert_eq!(resolver.available_count(), 2);
        assert_eq!(resolver.scheduled_count(), 1);
    }

    #[test]
    fn test_gaps_are_not_bridged() {
        let resolver = DependencyResolver::new();
        resolver.mark_available(h(1)).unwrap();
        assert!(resolver.mark_available(h(3)).unwrap().is_empty());
        assert_eq!(resolver.scheduled_count(), 0);
    }

    #[test]
    fn test_every_order_yields_every_pair_once() {
        let offsets = [0, 1, 2, 3, 5];
        let expected = BTreeSet::from([job(0, 1), job(1, 2), job(2, 3)]);

        for order in permutations(&offsets) {
            let resolver = DependencyResolver::new();
            let mut seen = Vec::new();
            for offset in &order {
                seen.extend(resolver.mark_available(h(*offset)).unwrap());
            }
            let unique: BTreeSet<_> = seen.iter().copied().collect();
            assert_eq!(unique.len(), seen.len(), "duplicate job for order {:?}", order);
            assert_eq!(unique, expected, "order {:?}", order);
        }
    }

    #[test]
    fn test_runs_do_not_mix() {
        let resolver = DependencyResolver::new();
        let later_run = issued() + Duration::hours(3);
        resolver.mark_available(h(0)).unwrap();
        assert!(resolver
            .mark_available(LeadTimeId::new(later_run, 1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_bound_cycle_rejects_other_runs() {
        let resolver = DependencyResolver::for_cycle(issued());
        let foreign = LeadTimeId::new(issued() + Duration::hours(6), 1);
        assert!(matches!(
            resolver.mark_available(foreign),
            Err(ResolverError::ForeignCycle { .. })
        ));
        assert!(!resolver.is_available(&foreign));
    }

    #[test]
    fn test_concurrent_arrivals_schedule_each_pair_once() {
        let resolver = Arc::new(DependencyResolver::new());
        let total: u32 = 48;

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || {
                    let mut jobs = Vec::new();
                    // Each thread marks every offset, in a different order.
                    for i in 0..total {
                        let offset = (i * 7 + worker * 11) % total;
                        jobs.extend(resolver.mark_available(h(offset)).unwrap());
                    }
                    jobs
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        let unique: BTreeSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), (total - 1) as usize);
        assert_eq!(unique.len(), all.len());
        assert!(unique.iter().all(|j| resolver.is_scheduled(j)));
    }
}
