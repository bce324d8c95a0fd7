use crate::sync::{AtomicUsize, Ordering, fence};

/// Per-execution counter of the parents a node is still waiting for.
///
/// Every completing parent calls [`ArrivalCounter::arrive`] exactly once after
/// publishing its outputs. The call that brings the counter to zero returns
/// `true`, and the caller is then responsible for running the node.
///
/// Each arrival is a Release operation, and the last one is followed by an
/// Acquire fence, so the thread that runs the node observes every write its
/// parents made before arriving.
#[must_use]
#[derive(Debug)]
#[repr(align(128))]
pub struct ArrivalCounter {
    /// Total number of parents.
    parents_total: usize,
    /// Number of parents that haven't arrived yet.
    parents_left: AtomicUsize,
}

impl ArrivalCounter {
    /// Counter expecting `parents_total` arrivals.
    pub fn new(parents_total: usize) -> Self {
        Self {
            parents_total,
            parents_left: AtomicUsize::new(parents_total),
        }
    }

    /// Total number of parents this counter was created for.
    #[must_use]
    pub fn parents_total(&self) -> usize {
        self.parents_total
    }

    /// Record the arrival of one parent.
    ///
    /// Returns `true` for the last arrival only.
    ///
    /// # Panics
    /// If called more times than there are parents.
    #[must_use]
    pub fn arrive(&self) -> bool {
        let left = self.parents_left.fetch_sub(1, Ordering::Release);
        assert_ne!(left, 0, "ArrivalCounter::arrive: [1]");
        if left == 1 {
            fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }
}
