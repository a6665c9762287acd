//! Scheduling the exponent of importance weight for PER.
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent of importance weight for PER.
///
/// $\beta$ grows linearly from `beta_0` to `beta_final` over `n_opts_final`
/// priority updates and stays there.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f32,

    /// Final value of $\beta$.
    pub beta_final: f32,

    /// Number of updates when beta reaches its final value.
    pub n_opts_final: usize,

    /// Current number of updates.
    pub n_opts: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, n_opts_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_opts_final,
            n_opts: 0,
        }
    }

    /// Gets the exponents of importance sampling weight.
    pub fn beta(&self) -> f32 {
        let n_opts = self.n_opts;
        if n_opts >= self.n_opts_final {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (n_opts as f32 / self.n_opts_final as f32)
        }
    }

    /// Counts a priority update.
    pub fn add_n_opts(&mut self) {
        self.n_opts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_schedule() {
        let mut s = IwScheduler::new(0.4, 1.0, 4);
        assert_eq!(s.beta(), 0.4);
        s.add_n_opts();
        s.add_n_opts();
        assert!((s.beta() - 0.7).abs() < 1e-6);
        (0..10).for_each(|_| s.add_n_opts());
        assert_eq!(s.beta(), 1.0);
    }
}
