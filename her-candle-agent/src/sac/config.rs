//! Configuration of SAC agent.
use super::EntCoefMode;
use crate::{
    model::{SubModel1, SubModel2},
    util::{CriticLoss, GaussianActorConfig, MultiCriticConfig, OutDim},
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

/// Configuration of [`Sac`](super::Sac).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct SacConfig<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Configuration of the actor model.
    pub actor_config: GaussianActorConfig<P::Config>,

    /// Configuration of the critic model.
    pub critic_config: MultiCriticConfig<Q::Config>,

    /// Discount factor.
    pub gamma: f64,

    /// How to update entropy coefficient.
    pub ent_coef_mode: EntCoefMode,

    /// Number of parameter updates per call of `learn`.
    pub n_updates_per_opt: usize,

    /// Batch size for training.
    pub batch_size: usize,

    /// The actor and the entropy coefficient are updated every this number of
    /// critic updates.
    pub actor_update_interval: usize,

    /// The target critics are updated every this number of critic updates.
    pub critic_target_update_interval: usize,

    /// If `true`, terminal transitions are bootstrapped as well.
    pub discard_time_limit: bool,

    /// Range of bootstrapped targets.
    pub target_clip: Option<(f64, f64)>,

    /// Type of critic loss function.
    pub critic_loss: CriticLoss,

    /// Input normalizer.
    pub normalizer_config: NormalizerConfig,

    /// Device for actor/critic models.
    pub device: Device,
}

impl<Q, P> Clone for SacConfig<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            gamma: self.gamma,
            ent_coef_mode: self.ent_coef_mode.clone(),
            n_updates_per_opt: self.n_updates_per_opt,
            batch_size: self.batch_size,
            actor_update_interval: self.actor_update_interval,
            critic_target_update_interval: self.critic_target_update_interval,
            discard_time_limit: self.discard_time_limit,
            target_clip: self.target_clip,
            critic_loss: self.critic_loss.clone(),
            normalizer_config: self.normalizer_config.clone(),
            device: self.device,
        }
    }
}

impl<Q, P> Default for SacConfig<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.98,
            ent_coef_mode: EntCoefMode::Auto(1.0, 0.001),
            n_updates_per_opt: 40,
            batch_size: 128,
            actor_update_interval: 1,
            critic_target_update_interval: 1,
            discard_time_limit: false,
            target_clip: Some((-50.0, 0.0)),
            critic_loss: CriticLoss::Mse,
            normalizer_config: NormalizerConfig::default(),
            device: Device::default(),
        }
    }
}

impl<Q, P> SacConfig<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Sets the number of parameter updates per call of `learn`.
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
        self.gamma = v;
        self
    }

    /// SAC-alpha.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
        self
    }

    /// Interval of actor updates.
    pub fn actor_update_interval(mut self, v: usize) -> Self {
        self.actor_update_interval = v;
        self
    }

    /// Interval of target critic updates.
    pub fn critic_target_update_interval(mut self, v: usize) -> Self {
        self.critic_target_update_interval = v;
        self
    }

    /// Bootstrap from terminal transitions too.
    pub fn discard_time_limit(mut self, v: bool) -> Self {
        self.discard_time_limit = v;
        self
    }

    /// Range of bootstrapped targets, `None` disables clamping.
    pub fn target_clip(mut self, v: Option<(f64, f64)>) -> Self {
        self.target_clip = v;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: GaussianActorConfig<P::Config>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: MultiCriticConfig<Q::Config>) -> Self {
        self.critic_config = critic_config;
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

    /// Constructs [`SacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`SacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC agent into {:?}", path_);
        Ok(())
    }
}
