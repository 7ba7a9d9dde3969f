use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters describing the requests passing through the front door
#[derive(Debug, Default)]
pub struct RequestMetrics {
    produced: AtomicU64,
    collected: AtomicU64,
    lost: AtomicU64,
    active: AtomicUsize,
}

/// Point in time copy of the [`RequestMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Requests published to the workers
    pub produced: u64,
    /// Requests answered with at least one facet
    pub collected: u64,
    /// Requests for which nothing arrived in time
    pub lost: u64,
    /// Requests currently being handled
    pub active: usize,
}

impl RequestMetrics {
    pub(super) fn produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn collected(&self) {
        self.collected.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn lost(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request as active until the returned guard is dropped
    pub(super) fn track(&self) -> ActiveRequest<'_> {
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveRequest(self)
    }

    /// Current values of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            collected: self.collected.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
        }
    }
}

pub(super) struct ActiveRequest<'a>(&'a RequestMetrics);

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn track_active_requests() {
        let metrics = RequestMetrics::default();

        {
            let _first = metrics.track();
            let _second = metrics.track();
            assert_eq!(metrics.snapshot().active, 2);
        }

        metrics.produced();
        metrics.lost();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                produced: 1,
                collected: 0,
                lost: 1,
                active: 0,
            }
        );
    }
}
