//! Configuration of DQN agent.
use super::{explorer::EpsilonGreedy, DqnModelConfig};
use crate::{
    model::SubModel1,
    util::{CriticLoss, OutDim},
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use her_core::NormalizerConfig;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub model_config: DqnModelConfig<Q::Config>,
    pub soft_update_interval: usize,
    pub n_updates_per_opt: usize,
    pub batch_size: usize,
    pub discount_factor: f64,
    pub tau: f64,
    pub double_dqn: bool,

    /// Range of bootstrapped targets.
    pub clip_target: Option<(f64, f64)>,
    pub critic_loss: CriticLoss,
    pub explorer: EpsilonGreedy,
    pub normalizer_config: NormalizerConfig,
    pub device: Device,

    /// Seed of the random number generator for exploration.
    pub seed: u64,
}

impl<Q> Clone for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            model_config: self.model_config.clone(),
            soft_update_interval: self.soft_update_interval,
            n_updates_per_opt: self.n_updates_per_opt,
            batch_size: self.batch_size,
            discount_factor: self.discount_factor,
            tau: self.tau,
            double_dqn: self.double_dqn,
            clip_target: self.clip_target,
            critic_loss: self.critic_loss.clone(),
            explorer: self.explorer.clone(),
            normalizer_config: self.normalizer_config.clone(),
            device: self.device,
            seed: self.seed,
        }
    }
}

impl<Q> Default for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            soft_update_interval: 1,
            n_updates_per_opt: 2,
            batch_size: 512,
            discount_factor: 0.99,
            tau: 0.5,
            double_dqn: false,
            clip_target: Some((0.0, 5.0)),
            critic_loss: CriticLoss::SmoothL1,
            explorer: EpsilonGreedy::default(),
            normalizer_config: NormalizerConfig::default(),
            device: Device::default(),
            seed: 42,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Sets soft update interval.
    pub fn soft_update_interval(mut self, v: usize) -> Self {
        self.soft_update_interval = v;
        self
    }

    /// Sets the numper of parameter update steps per call of `learn`.
    pub fn n_updates_per_opt(mut self, v: usize) -> Self {
        self.n_updates_per_opt = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Use double DQN targets.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Range of bootstrapped targets, `None` disables clamping.
    pub fn clip_target(mut self, v: Option<(f64, f64)>) -> Self {
        self.clip_target = v;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: EpsilonGreedy) -> Self {
        self.explorer = v;
        self
    }

    /// Configuration of the action-value function.
    pub fn model_config(mut self, v: DqnModelConfig<Q::Config>) -> Self {
        self.model_config = v;
        self
    }

    /// Sets the output dimension of the action-value function.
    pub fn out_dim(mut self, v: usize) -> Self {
        self.model_config = self.model_config.out_dim(v);
        self
    }

    /// Input normalizer.
    pub fn normalizer_config(mut self, v: NormalizerConfig) -> Self {
        self.normalizer_config = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let c = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {:?}", path_);
        Ok(c)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {:?}", path_);
        Ok(())
    }
}
