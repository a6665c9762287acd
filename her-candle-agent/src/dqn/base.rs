//! DQN agent implemented with candle.
use super::{
    config::DqnConfig,
    explorer::{greedy, EpsilonGreedy},
    model::DqnModel,
};
use crate::{
    model::SubModel1,
    util::{
        abs_td_err, clamp_target, critic_loss, discrete_act_tensor, input_tensor, not_terminated,
        obs_tensor, track, vec_tensor, CriticLoss, OutDim,
    },
};
use anyhow::Result;
use candle_core::{shape::D, Device, Tensor};
use her_core::{
    record::{Record, RecordValue},
    util::{ckpt_path, ensure_ckpt_files, normalizer_path},
    Agent, DiscreteAct, Env, GoalObs, GoalTransitionBatch, Normalizer, Policy, ReplayBufferBase,
};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::Debug,
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

const ROLES: [&str; 2] = ["qnet", "qnet_tgt"];

#[allow(clippy::upper_case_acronyms)]
/// DQN agent for goal-conditioned tasks with discrete actions.
///
/// Actions are selected with the online network. The target network is a copy
/// of the online network at construction and tracks it with soft updates.
pub struct Dqn<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub(in crate::dqn) soft_update_interval: usize,
    pub(in crate::dqn) soft_update_counter: usize,
    pub(in crate::dqn) n_updates_per_opt: usize,
    pub(in crate::dqn) batch_size: usize,
    pub(in crate::dqn) qnet: DqnModel<Q>,
    pub(in crate::dqn) qnet_tgt: DqnModel<Q>,
    pub(in crate::dqn) train: bool,
    pub(in crate::dqn) phantom: PhantomData<(E, R)>,
    pub(in crate::dqn) discount_factor: f64,
    pub(in crate::dqn) tau: f64,
    pub(in crate::dqn) explorer: EpsilonGreedy,
    pub(in crate::dqn) normalizer: Normalizer,
    pub(in crate::dqn) device: Device,
    pub(in crate::dqn) n_opts: usize,
    pub(in crate::dqn) double_dqn: bool,
    pub(in crate::dqn) clip_target: Option<(f64, f64)>,
    pub(in crate::dqn) critic_loss: CriticLoss,
    rng: SmallRng,
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env<Act = DiscreteAct>,
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    R: ReplayBufferBase<Batch = GoalTransitionBatch<DiscreteAct>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Constructs DQN agent.
    pub fn build(config: DqnConfig<Q>) -> Result<Self> {
        let device = config.device.build()?;
        let qnet = DqnModel::build(config.model_config.clone(), device.clone())?;
        let qnet_tgt = DqnModel::build(config.model_config, device.clone())?;
        track(qnet_tgt.varmap(), qnet.varmap(), 1.0)?;

        Ok(Dqn {
            qnet,
            qnet_tgt,
            soft_update_interval: config.soft_update_interval.max(1),
            soft_update_counter: 0,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            train: true,
            explorer: config.explorer,
            normalizer: Normalizer::build(&config.normalizer_config)?,
            device,
            n_opts: 0,
            double_dqn: config.double_dqn,
            clip_target: config.clip_target,
            critic_loss: config.critic_loss,
            phantom: PhantomData,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    /// The explorer.
    pub fn explorer(&self) -> &EpsilonGreedy {
        &self.explorer
    }

    /// Number of parameter updates so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The online network.
    pub fn qnet(&self) -> &DqnModel<Q> {
        &self.qnet
    }

    /// The target network.
    pub fn qnet_tgt(&self) -> &DqnModel<Q> {
        &self.qnet_tgt
    }

    fn update_critic(
        &mut self,
        batch: GoalTransitionBatch<DiscreteAct>,
        buffer: &mut R,
    ) -> Result<f32> {
        let (obs, act, next_obs, reward, is_terminated, _, ixs, weight) = batch.unpack();
        let obs = input_tensor(&obs, &self.normalizer, &self.device)?;
        let act = discrete_act_tensor(&act, &self.device)?;
        let next_obs = input_tensor(&next_obs, &self.normalizer, &self.device)?;
        let reward = vec_tensor(&reward, &self.device)?;
        let not_done = not_terminated(&is_terminated, &self.device)?;

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q = if self.double_dqn {
                let y = self.qnet.forward(&next_obs)?.argmax_keepdim(D::Minus1)?;
                self.qnet_tgt
                    .forward(&next_obs)?
                    .gather(&y, D::Minus1)?
                    .squeeze(D::Minus1)?
            } else {
                self.qnet_tgt.forward(&next_obs)?.max(D::Minus1)?
            };
            let tgt = (reward + (not_done * q)?.affine(self.discount_factor, 0.0)?)?;
            clamp_target(tgt, self.clip_target)?.detach()
        };

        let weight = match weight {
            Some(w) => Some(vec_tensor(&w, &self.device)?),
            None => None,
        };
        let loss = critic_loss(&self.critic_loss, &pred, &tgt, weight.as_ref())?;
        self.qnet.backward_step(&loss)?;

        if ixs.is_some() {
            let td_err = abs_td_err(&pred.detach(), &tgt)?;
            buffer.update_priority(&ixs, &Some(td_err));
        }

        Ok(loss.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R, steps: usize, batch_size: usize) -> Result<Option<Record>> {
        if batch_size == 0 || buffer.len() < batch_size {
            return Ok(None);
        }

        let mut loss_critic = 0f32;
        let mut n_updates = 0;

        for _ in 0..steps {
            let batch = match buffer.batch(batch_size)? {
                Some(batch) => batch,
                None => break,
            };
            loss_critic += self.update_critic(batch, buffer)?;
            n_updates += 1;
            self.n_opts += 1;

            self.soft_update_counter += 1;
            if self.soft_update_counter == self.soft_update_interval {
                self.soft_update_counter = 0;
                track(self.qnet_tgt.varmap(), self.qnet.varmap(), self.tau)?;
            }
        }

        if n_updates == 0 {
            return Ok(None);
        }

        Ok(Some(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic / n_updates as f32)),
            ("epsilon", RecordValue::Scalar(self.explorer.eps() as f32)),
        ])))
    }
}

impl<E, Q, R> Policy<E> for Dqn<E, Q, R>
where
    E: Env<Act = DiscreteAct>,
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Epsilon-greedy in training mode, greedy in evaluation mode.
    fn sample(&mut self, obs: &GoalObs) -> Result<DiscreteAct> {
        let x = obs_tensor(obs, &self.normalizer, &self.device)?;
        let q = self.qnet.forward(&x)?;
        let a = match self.train {
            true => self.explorer.action(&q, &mut self.rng)?,
            false => greedy(&q)?,
        };
        Ok(DiscreteAct(a))
    }
}

impl<E, Q, R> Agent<E, R> for Dqn<E, Q, R>
where
    E: Env<Act = DiscreteAct>,
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    R: ReplayBufferBase<Batch = GoalTransitionBatch<DiscreteAct>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn learn(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        self.opt_(buffer, self.n_updates_per_opt, self.batch_size)
    }

    fn learn_steps(
        &mut self,
        buffer: &mut R,
        steps: usize,
        batch_size: usize,
    ) -> Result<Option<Record>> {
        self.opt_(buffer, steps, batch_size)
    }

    fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    fn normalizer_mut(&mut self) -> &mut Normalizer {
        &mut self.normalizer
    }

    /// Updates the normalizer and advances the exploration schedule.
    fn end_episode(&mut self) -> Result<()> {
        self.normalizer.update_mean();
        self.explorer.end_episode();
        Ok(())
    }

    fn save_params(&self, dir: &Path, epoch: usize) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let qnet_path = ckpt_path(dir, ROLES[0], epoch);
        let qnet_tgt_path = ckpt_path(dir, ROLES[1], epoch);
        let norm_path = normalizer_path(dir, epoch);
        self.qnet.save(&qnet_path)?;
        self.qnet_tgt.save(&qnet_tgt_path)?;
        self.normalizer.save(&norm_path)?;
        Ok(vec![qnet_path, qnet_tgt_path, norm_path])
    }

    fn load_params(&mut self, dir: &Path, epoch: usize) -> Result<()> {
        let paths = ensure_ckpt_files(dir, &ROLES, epoch)?;
        self.qnet.load(&paths[0])?;
        self.qnet_tgt.load(&paths[1])?;
        self.normalizer.load(normalizer_path(dir, epoch))?;
        Ok(())
    }
}
