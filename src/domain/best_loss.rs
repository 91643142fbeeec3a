// ============================================================
// Layer 3 — Best-Loss Tracker
// ============================================================
// Remembers the lowest held-out loss seen during one run.
//
// Only a strictly lower value counts as an improvement:
//   - a tie does not trigger a new checkpoint
//   - NaN compares false against everything, so a diverged
//     epoch is never treated as the best model
//
// The tracker lives for one orchestrator run. The checkpoint
// file on disk is what survives between runs.

/// Lowest loss observed so far. Starts at +infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestLossTracker {
    best: f64,
}

impl Default for BestLossTracker {
    fn default() -> Self {
        Self { best: f64::INFINITY }
    }
}

impl BestLossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and updates the best value when `loss` improves on it.
    pub fn observe(&mut self, loss: f64) -> bool {
        if loss < self.best {
            self.best = loss;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_infinity() {
        assert_eq!(BestLossTracker::new().best(), f64::INFINITY);
    }

    #[test]
    fn test_only_strict_improvements_count() {
        let mut t = BestLossTracker::new();
        let saved: Vec<f64> = [10.0, 8.0, 8.0, 9.0, 5.0]
            .into_iter()
            .filter(|&l| t.observe(l))
            .collect();
        assert_eq!(saved, vec![10.0, 8.0, 5.0]);
        assert_eq!(t.best(), 5.0);
    }

    #[test]
    fn test_nan_never_improves() {
        let mut t = BestLossTracker::new();
        assert!(!t.observe(f64::NAN));
        assert!(t.observe(3.0));
        assert!(!t.observe(f64::NAN));
        assert_eq!(t.best(), 3.0);
    }
}
