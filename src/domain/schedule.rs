// ============================================================
// Layer 3 — Annealing Schedules
// ============================================================
// Pure functions of the epoch index. Nothing here is stateful:
// the orchestrator recomputes every value from the epoch number.
//
//   temperature(e) = max(begin * exp(-anneal_rate * e), min)
//
//   lr_factor(e)   = 1.0     while e <  threshold_epoch
//                    factor  once  e >= threshold_epoch
//
// Reference: Jang et al. (2017) Categorical Reparameterization
//            with Gumbel-Softmax, §4 (temperature annealing)

use serde::{Deserialize, Serialize};

/// Exponential decay clamped to a floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnealSchedule {
    pub begin:       f64,
    pub min:         f64,
    pub anneal_rate: f64,
}

impl AnnealSchedule {
    /// Panics if `begin < min` — the floor must be reachable from above.
    pub fn new(begin: f64, min: f64, anneal_rate: f64) -> Self {
        assert!(
            begin >= min,
            "anneal schedule must start at or above its floor ({begin} < {min})"
        );
        Self { begin, min, anneal_rate }
    }

    /// Value for 0-based epoch `epoch`.
    pub fn at(&self, epoch: usize) -> f64 {
        (self.begin * (-self.anneal_rate * epoch as f64).exp()).max(self.min)
    }

    pub fn floor(&self) -> f64 {
        self.min
    }
}

/// The pair of temperatures fed to a forward pass.
///
/// The Gumbel VAE only reads `state`; the Cube Sae uses `state` for the
/// binary latent and `action` for the categorical action code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub state:  f64,
    pub action: f64,
}

impl Temperature {
    pub fn single(t: f64) -> Self {
        Self { state: t, action: t }
    }
}

/// One or two independent anneal schedules, depending on the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TemperatureSchedule {
    Single(AnnealSchedule),
    Dual {
        state:  AnnealSchedule,
        action: AnnealSchedule,
    },
}

impl TemperatureSchedule {
    pub fn at(&self, epoch: usize) -> Temperature {
        match self {
            Self::Single(s)               => Temperature::single(s.at(epoch)),
            Self::Dual { state, action }  => Temperature {
                state:  state.at(epoch),
                action: action.at(epoch),
            },
        }
    }

    /// The schedule floor(s), used when evaluating at the coldest setting.
    pub fn floor(&self) -> Temperature {
        match self {
            Self::Single(s)               => Temperature::single(s.floor()),
            Self::Dual { state, action }  => Temperature {
                state:  state.floor(),
                action: action.floor(),
            },
        }
    }
}

/// Step-down learning-rate multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLrSchedule {
    pub threshold_epoch: usize,
    pub factor:          f64,
}

impl StepLrSchedule {
    pub fn new(threshold_epoch: usize, factor: f64) -> Self {
        Self { threshold_epoch, factor }
    }

    /// A schedule that never reduces the rate.
    pub fn constant() -> Self {
        Self { threshold_epoch: usize::MAX, factor: 1.0 }
    }

    pub fn factor_at(&self, step: usize) -> f64 {
        if step < self.threshold_epoch { 1.0 } else { self.factor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_epoch_is_begin() {
        let s = AnnealSchedule::new(1.0, 0.5, 0.05);
        assert_eq!(s.at(0), 1.0);
    }

    #[test]
    fn test_never_drops_below_floor_and_never_rises() {
        let s = AnnealSchedule::new(5.0, 0.7, 0.03);
        let mut prev = f64::INFINITY;
        for e in 0..1_000 {
            let t = s.at(e);
            assert!(t >= 0.7, "epoch {e}: {t} below floor");
            assert!(t <= prev, "epoch {e}: {t} rose above {prev}");
            prev = t;
        }
        // Far enough out the floor is all that is left
        assert_eq!(s.at(999), 0.7);
    }

    #[test]
    fn test_matches_closed_form() {
        let s = AnnealSchedule::new(1.0, 0.5, 0.05);
        let expected = (-0.05f64 * 3.0).exp();
        assert!((s.at(3) - expected).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_begin_below_floor_is_rejected() {
        let _ = AnnealSchedule::new(0.1, 0.5, 0.05);
    }

    #[test]
    fn test_dual_schedules_are_independent() {
        let sched = TemperatureSchedule::Dual {
            state:  AnnealSchedule::new(5.0, 0.7, 0.03),
            action: AnnealSchedule::new(1.0, 0.5, 0.05),
        };
        let t = sched.at(10);
        assert!((t.state  - 5.0 * (-0.3f64).exp()).abs() < 1e-12);
        assert!((t.action - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(sched.floor(), Temperature { state: 0.7, action: 0.5 });
    }

    #[test]
    fn test_lr_steps_down_once() {
        let lr = StepLrSchedule::new(100, 0.1);
        assert_eq!(lr.factor_at(0),   1.0);
        assert_eq!(lr.factor_at(99),  1.0);
        assert_eq!(lr.factor_at(100), 0.1);
        assert_eq!(lr.factor_at(500), 0.1);
        assert_eq!(StepLrSchedule::constant().factor_at(usize::MAX - 1), 1.0);
    }
}
