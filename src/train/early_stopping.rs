/// What the trainer should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    /// The configured target error was reached.
    Converged,
    /// The validation error stopped improving for longer than the patience.
    Stop,
}

/// Stagnation-based stopping on the worst validation channel.
///
/// An epoch counts as an improvement only if the worst channel error drops
/// below the best value seen so far by more than `tolerance`. Training stops
/// once more than `patience` consecutive epochs fail to improve.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    tolerance: f64,
    patience: usize,
    target_error: Option<f64>,
    best_error: f64,
    stagnation: usize,
}

impl EarlyStopping {
    pub fn new(tolerance: f64, patience: usize) -> Self {
        Self {
            tolerance,
            patience,
            target_error: None,
            best_error: f64::INFINITY,
            stagnation: 0,
        }
    }

    pub fn with_target_error(mut self, target_error: Option<f64>) -> Self {
        self.target_error = target_error;
        self
    }

    pub fn best_error(&self) -> f64 {
        self.best_error
    }

    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    fn check_improvement(&mut self, error: f64) -> bool {
        if error < self.best_error - self.tolerance {
            self.best_error = error;
            self.stagnation = 0;
            true
        } else {
            self.stagnation += 1;
            false
        }
    }

    /// Feeds the per-channel validation loss of one epoch.
    pub fn update(&mut self, val_loss: &[f64]) -> StopDecision {
        let worst = worst_error(val_loss);
        self.check_improvement(worst);

        if self.target_error.is_some_and(|target| worst <= target) {
            StopDecision::Converged
        } else if self.stagnation > self.patience {
            StopDecision::Stop
        } else {
            StopDecision::Continue
        }
    }
}

/// Largest entry of a per-channel loss vector.
pub fn worst_error(losses: &[f64]) -> f64 {
    losses.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_patience_epochs_after_last_improvement() {
        let patience = 4;
        let mut es = EarlyStopping::new(1e-11, patience);

        // Improves on epochs 1..=3, flat afterwards.
        let losses = [3.0, 2.0, 1.0];
        let mut stopped_at = None;
        for epoch in 1..=50 {
            let loss = losses.get(epoch - 1).copied().unwrap_or(1.0);
            if es.update(&[loss]) == StopDecision::Stop {
                stopped_at = Some(epoch);
                break;
            }
        }
        // Epoch 4 is the first one without improvement.
        assert_eq!(stopped_at, Some(4 + patience));
    }

    #[test]
    fn only_the_worst_channel_counts() {
        let mut es = EarlyStopping::new(1e-3, 0);
        assert_eq!(es.update(&[0.5, 2.0]), StopDecision::Continue);
        // The first channel improves, the worst one does not.
        assert_eq!(es.update(&[0.1, 2.0]), StopDecision::Stop);
        assert_eq!(es.best_error(), 2.0);
    }

    #[test]
    fn improvements_smaller_than_tolerance_do_not_reset() {
        let mut es = EarlyStopping::new(0.1, 10);
        es.update(&[1.0]);
        es.update(&[0.95]);
        assert_eq!(es.stagnation(), 1);
        es.update(&[0.5]);
        assert_eq!(es.stagnation(), 0);
    }

    #[test]
    fn target_error_converges() {
        let mut es = EarlyStopping::new(1e-11, 100).with_target_error(Some(1e-3));
        assert_eq!(es.update(&[1e-2]), StopDecision::Continue);
        assert_eq!(es.update(&[1e-3, 5e-4]), StopDecision::Converged);
    }

    #[test]
    fn worst_error_of_vector() {
        assert_eq!(worst_error(&[0.1, 0.7, 0.3]), 0.7);
    }
}
