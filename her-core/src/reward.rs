//! Goal-conditioned reward functions.
//!
//! The reward function is shared by the replay buffer, which recomputes rewards
//! of relabeled transitions, and the evaluator, which judges episode success.
use serde::{Deserialize, Serialize};

/// Computes the reward of reaching `achieved` when `desired` is the goal.
pub trait RewardFn: Clone {
    /// Reward for the pair of goals.
    fn reward(&self, achieved: &[f32], desired: &[f32]) -> f32;

    /// Returns `true` if `achieved` is regarded as reaching `desired`.
    fn is_success(&self, achieved: &[f32], desired: &[f32]) -> bool;
}

/// Sparse reward based on the Euclidean distance between goals.
///
/// The reward is `success_reward` if the distance is within `threshold`,
/// `failure_reward` otherwise.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SparseReward {
    /// Distance threshold.
    pub threshold: f32,

    /// Reward when the goal is reached.
    pub success_reward: f32,

    /// Reward when the goal is not reached.
    pub failure_reward: f32,
}

impl Default for SparseReward {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            success_reward: 0.0,
            failure_reward: -1.0,
        }
    }
}

impl SparseReward {
    /// Constructs a sparse reward with the given threshold and the default
    /// values `0` and `-1`.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Sets the rewards of success and failure.
    pub fn rewards(mut self, success_reward: f32, failure_reward: f32) -> Self {
        self.success_reward = success_reward;
        self.failure_reward = failure_reward;
        self
    }
}

pub(crate) fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl RewardFn for SparseReward {
    fn reward(&self, achieved: &[f32], desired: &[f32]) -> f32 {
        if self.is_success(achieved, desired) {
            self.success_reward
        } else {
            self.failure_reward
        }
    }

    fn is_success(&self, achieved: &[f32], desired: &[f32]) -> bool {
        distance(achieved, desired) <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_reward() {
        let f = SparseReward::new(0.1);
        assert_eq!(f.reward(&[0.0, 0.0], &[0.0, 0.05]), 0.0);
        assert_eq!(f.reward(&[0.0, 0.0], &[0.3, 0.4]), -1.0);
        assert!(!f.is_success(&[1.0], &[0.0]));

        let f = f.rewards(1.0, 0.0);
        assert_eq!(f.reward(&[1.0], &[1.0]), 1.0);
    }
}
