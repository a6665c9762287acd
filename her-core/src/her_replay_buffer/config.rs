//! Configuration of [`HerReplayBuffer`](super::HerReplayBuffer).
use super::WeightNormalizer::{self, All};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration for prioritized experience replay (PER).
///
/// ```rust
/// use her_core::{PerConfig, WeightNormalizer};
///
/// let config = PerConfig::default()
///     .alpha(0.6)
///     .beta_0(0.4)
///     .beta_final(1.0)
///     .n_opts_final(500_000)
///     .normalize(WeightNormalizer::All);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent for prioritization. A value of 0 results in uniform sampling.
    pub alpha: f32,

    /// Initial value of the importance sampling exponent.
    pub beta_0: f32,

    /// Final value of the importance sampling exponent.
    pub beta_final: f32,

    /// Number of priority updates after which `beta` reaches its final value.
    pub n_opts_final: usize,

    /// Method for normalizing importance sampling weights.
    pub normalize: WeightNormalizer,

    /// Added to the absolute TD error so that every priority stays positive.
    /// Must be greater than 0.
    pub eps: f32,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_final: 1.0,
            n_opts_final: 500_000,
            normalize: All,
            eps: 1e-6,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance sampling exponent `beta_0`.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final importance sampling exponent `beta_final`.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the number of priority updates to reach the final beta value.
    pub fn n_opts_final(mut self, n_opts_final: usize) -> Self {
        self.n_opts_final = n_opts_final;
        self
    }

    /// Sets the method for normalizing importance weights.
    pub fn normalize(mut self, normalize: WeightNormalizer) -> Self {
        self.normalize = normalize;
        self
    }

    /// Sets the priority floor.
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }
}

/// How substitute goals are chosen when relabeling a transition at time `t`
/// of an episode of length `T`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum GoalStrategy {
    /// Achieved goal of a step sampled uniformly from `[t, T)`.
    Future,

    /// Achieved goal of the last step.
    Final,

    /// Achieved goal of a step sampled uniformly from `[0, T)`.
    Episode,
}

/// Configuration of [`HerReplayBuffer`](super::HerReplayBuffer).
///
/// ```rust
/// use her_core::{GoalStrategy, HerReplayBufferConfig, PerConfig};
///
/// let config = HerReplayBufferConfig::default()
///     .capacity(100_000)
///     .strategy(GoalStrategy::Future)
///     .sampled_goal_num(4)
///     .per_config(Some(PerConfig::default()));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct HerReplayBufferConfig {
    /// Maximum number of flattened transitions.
    pub capacity: usize,

    /// Random seed for sampling and goal selection.
    pub seed: u64,

    /// Goal selection strategy.
    pub strategy: GoalStrategy,

    /// Number of relabeled copies per original transition.
    pub sampled_goal_num: usize,

    /// If `true`, episodes end when their goal is reached, and the termination
    /// flag of a relabeled transition is recomputed for its new goal.
    pub done_on_success: bool,

    /// Optional configuration for prioritized experience replay.
    pub per_config: Option<PerConfig>,
}

impl Default for HerReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            seed: 42,
            strategy: GoalStrategy::Future,
            sampled_goal_num: 4,
            done_on_success: true,
            per_config: None,
        }
    }
}

impl HerReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the goal selection strategy.
    pub fn strategy(mut self, strategy: GoalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the number of relabeled copies per transition.
    pub fn sampled_goal_num(mut self, k: usize) -> Self {
        self.sampled_goal_num = k;
        self
    }

    /// Sets if reaching the goal terminates an episode.
    pub fn done_on_success(mut self, v: bool) -> Self {
        self.done_on_success = v;
        self
    }

    /// Sets the configuration for prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_her_replay_buffer_config() -> Result<()> {
        let config = HerReplayBufferConfig::default()
            .capacity(100)
            .strategy(GoalStrategy::Final)
            .per_config(Some(PerConfig::default().alpha(0.7)));

        let dir = TempDir::new("her_replay_buffer_config")?;
        let path = dir.path().join("her_replay_buffer_config.yaml");
        config.save(&path)?;
        let config_ = HerReplayBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
