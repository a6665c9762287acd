//! Exploration strategy of value-based agents.
use anyhow::Result;
use candle_core::{shape::D, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer with exponential decay over training episodes.
///
/// `eps = eps_end + (eps_start - eps_end) * exp(-n_episodes / eps_decay)`
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    pub n_episodes: usize,
    pub eps_start: f64,
    pub eps_end: f64,
    pub eps_decay: f64,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            n_episodes: 0,
            eps_start: 1.0,
            eps_end: 0.05,
            eps_decay: 5000.0,
        }
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new(eps_start: f64, eps_end: f64, eps_decay: f64) -> Self {
        Self {
            n_episodes: 0,
            eps_start,
            eps_end,
            eps_decay,
        }
    }

    /// The current value of epsilon.
    pub fn eps(&self) -> f64 {
        let decay = (-(self.n_episodes as f64) / self.eps_decay.max(f64::MIN_POSITIVE)).exp();
        self.eps_end + (self.eps_start - self.eps_end) * decay
    }

    /// Advances the schedule by one episode.
    pub fn end_episode(&mut self) {
        self.n_episodes += 1;
    }

    /// Takes an action based on action values of shape `[1, n_actions]`.
    pub fn action(&self, q: &Tensor, rng: &mut impl Rng) -> Result<i64> {
        if rng.gen::<f64>() < self.eps() {
            let n_actions = q.dims()[q.dims().len() - 1];
            Ok(rng.gen_range(0..n_actions) as i64)
        } else {
            greedy(q)
        }
    }

    /// Set the epsilon value at the end.
    pub fn eps_end(mut self, v: f64) -> Self {
        self.eps_end = v;
        self
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the decay constant in episodes.
    pub fn eps_decay(mut self, v: f64) -> Self {
        self.eps_decay = v;
        self
    }
}

/// Index of the maximum of action values of shape `[1, n_actions]`.
pub(crate) fn greedy(q: &Tensor) -> Result<i64> {
    let a = q.argmax(D::Minus1)?.flatten_all()?.to_vec1::<u32>()?;
    Ok(a.first().copied().unwrap_or(0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_eps_schedule() {
        let mut explorer = EpsilonGreedy::default();
        assert!((explorer.eps() - 1.0).abs() < 1e-12);
        explorer.n_episodes = 5000;
        let expected = 0.05 + 0.95 * (-1f64).exp();
        assert!((explorer.eps() - expected).abs() < 1e-12);
        explorer.n_episodes = 1_000_000;
        assert!((explorer.eps() - 0.05).abs() < 1e-6);
        explorer.end_episode();
        assert_eq!(explorer.n_episodes, 1_000_001);
    }

    #[test]
    fn test_action() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let q = Tensor::from_slice(&[0.1f32, 0.9, 0.3], (1, 3), &Device::Cpu)?;
        let explorer = EpsilonGreedy::new(0.0, 0.0, 1.0);
        for _ in 0..10 {
            assert_eq!(explorer.action(&q, &mut rng)?, 1);
        }

        let explorer = EpsilonGreedy::new(1.0, 1.0, 1.0);
        let acts = (0..100)
            .map(|_| explorer.action(&q, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        assert!(acts.iter().all(|&a| (0..3).contains(&a)));
        assert!(acts.iter().any(|&a| a != 1));
        Ok(())
    }
}
