use serde::{Deserialize, Serialize};

/// What happened during one Gibbs sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepStats {
    /// 1-based sweep number.
    pub sweep: usize,
    pub temperature: f64,
    /// Regions holding at least one token after the sweep.
    pub live_regions: usize,
    /// Region ids ever instantiated (`currentR`).
    pub current_regions: usize,
    /// Allocated region capacity (`expectedR`).
    pub capacity: usize,
    /// Tokens whose region changed.
    pub moved_tokens: usize,
    /// New regions opened by toponym draws.
    pub opened_regions: usize,
    /// Word tokens moved out of regions that lost their last toponym.
    pub recycled_tokens: usize,
    pub kappa: f64,
    /// Whether this sweep was recorded into the posterior average.
    pub collected: bool,
}

/// Interface for objects that inspect the sweep loop while it is running.
///
/// Called once after every sweep, after resizing and posterior collection.
pub trait SweepObserver {
    fn observe(&mut self, stats: &SweepStats);
}

/// Observes nothing.
impl SweepObserver for () {
    fn observe(&mut self, _stats: &SweepStats) {}
}

/// Keeps every sweep record.
#[derive(Debug, Clone, Default)]
pub struct SweepTrace {
    records: Vec<SweepStats>,
}

impl SweepTrace {
    pub fn records(&self) -> &[SweepStats] {
        &self.records
    }

    pub fn last(&self) -> Option<&SweepStats> {
        self.records.last()
    }

    /// Largest number of live regions seen in any sweep.
    pub fn peak_live_regions(&self) -> usize {
        self.records.iter().map(|r| r.live_regions).max().unwrap_or(0)
    }

    pub fn total_moves(&self) -> usize {
        self.records.iter().map(|r| r.moved_tokens).sum()
    }
}

impl SweepObserver for SweepTrace {
    fn observe(&mut self, stats: &SweepStats) {
        self.records.push(*stats);
    }
}

impl<T: SweepObserver + ?Sized> SweepObserver for &mut T {
    fn observe(&mut self, stats: &SweepStats) {
        (**self).observe(stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_summaries() {
        let mut trace = SweepTrace::default();
        for (sweep, live, moved) in [(1, 4, 10), (2, 6, 3), (3, 5, 0)] {
            trace.observe(&SweepStats {
                sweep,
                live_regions: live,
                moved_tokens: moved,
                ..Default::default()
            });
        }
        assert_eq!(trace.peak_live_regions(), 6);
        assert_eq!(trace.total_moves(), 13);
        assert_eq!(trace.last().map(|r| r.sweep), Some(3));
    }

    #[test]
    fn test_observer_through_mut_ref() {
        fn feed(mut obs: impl SweepObserver) {
            obs.observe(&SweepStats::default());
        }
        let mut trace = SweepTrace::default();
        feed(&mut trace);
        feed(());
        assert_eq!(trace.records().len(), 1);
    }
}
