use super::Td3Config;
use crate::{
    dqn::{greedy, DqnModel, EpsilonGreedy},
    model::SubModel1,
    util::{
        abs_td_err, clamp_target, critic_loss, discrete_act_tensor, input_tensor, not_terminated,
        obs_tensor, track, twin_min, vec_tensor, CriticLoss, OutDim,
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

const ROLES: [&str; 4] = ["qnet1", "qnet2", "qnet1_tgt", "qnet2_tgt"];

/// Twin Q-network agent for goal-conditioned tasks with discrete actions.
///
/// Actions are selected with the first online network.
pub struct Td3<E, Q, R>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    qnets: [DqnModel<Q>; 2],
    qnets_tgt: [DqnModel<Q>; 2],
    critic_target_update_interval: usize,
    n_updates_per_opt: usize,
    batch_size: usize,
    discount_factor: f64,
    tau: f64,
    clip_target: Option<(f64, f64)>,
    critic_loss: CriticLoss,
    explorer: EpsilonGreedy,
    normalizer: Normalizer,
    train: bool,
    n_opts: usize,
    device: Device,
    rng: SmallRng,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, R> Td3<E, Q, R>
where
    E: Env<Act = DiscreteAct>,
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    R: ReplayBufferBase<Batch = GoalTransitionBatch<DiscreteAct>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Constructs TD3 agent.
    pub fn build(config: Td3Config<Q>) -> Result<Self> {
        let device = config.device.build()?;
        let model = || DqnModel::build(config.model_config.clone(), device.clone());
        let qnets = [model()?, model()?];
        let qnets_tgt = [model()?, model()?];
        for (qnet_tgt, qnet) in qnets_tgt.iter().zip(qnets.iter()) {
            track(qnet_tgt.varmap(), qnet.varmap(), 1.0)?;
        }

        Ok(Self {
            qnets,
            qnets_tgt,
            critic_target_update_interval: config.critic_target_update_interval.max(1),
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            clip_target: config.clip_target,
            critic_loss: config.critic_loss,
            explorer: config.explorer,
            normalizer: Normalizer::build(&config.normalizer_config)?,
            train: true,
            n_opts: 0,
            device,
            rng: SmallRng::seed_from_u64(config.seed),
            phantom: PhantomData,
        })
    }

    /// Number of parameter updates so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The online networks.
    pub fn qnets(&self) -> &[DqnModel<Q>; 2] {
        &self.qnets
    }

    /// The target networks.
    pub fn qnets_tgt(&self) -> &[DqnModel<Q>; 2] {
        &self.qnets_tgt
    }

    /// Bootstrapped targets of shape `[batch_size]`.
    fn target(&self, next_obs: &Tensor, reward: Tensor, not_done: Tensor) -> Result<Tensor> {
        let next_qs = self
            .qnets_tgt
            .iter()
            .map(|q| Ok(q.forward(next_obs)?.max(D::Minus1)?))
            .collect::<Result<Vec<_>>>()?;
        let next_q = twin_min(&next_qs)?;
        let tgt = (reward + (not_done * next_q)?.affine(self.discount_factor, 0.0)?)?;
        Ok(clamp_target(tgt, self.clip_target)?.detach())
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
        let weight = match weight {
            Some(w) => Some(vec_tensor(&w, &self.device)?),
            None => None,
        };
        let tgt = self.target(&next_obs, reward, not_done)?;

        let mut loss_sum = 0f32;
        let mut td_err = None;
        for (i, qnet) in self.qnets.iter_mut().enumerate() {
            let pred = qnet
                .forward(&obs)?
                .gather(&act, D::Minus1)?
                .squeeze(D::Minus1)?;
            let loss = critic_loss(&self.critic_loss, &pred, &tgt, weight.as_ref())?;
            qnet.backward_step(&loss)?;
            loss_sum += loss.to_scalar::<f32>()?;
            if i == 0 && ixs.is_some() {
                td_err = Some(abs_td_err(&pred.detach(), &tgt)?);
            }
        }

        if td_err.is_some() {
            buffer.update_priority(&ixs, &td_err);
        }

        Ok(loss_sum / 2.0)
    }

    fn soft_update(&self) -> Result<()> {
        for (qnet_tgt, qnet) in self.qnets_tgt.iter().zip(self.qnets.iter()) {
            track(qnet_tgt.varmap(), qnet.varmap(), self.tau)?;
        }
        Ok(())
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

            if self.n_opts % self.critic_target_update_interval == 0 {
                self.soft_update()?;
            }
            self.n_opts += 1;
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

impl<E, Q, R> Policy<E> for Td3<E, Q, R>
where
    E: Env<Act = DiscreteAct>,
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn sample(&mut self, obs: &GoalObs) -> Result<DiscreteAct> {
        let x = obs_tensor(obs, &self.normalizer, &self.device)?;
        let q = self.qnets[0].forward(&x)?;
        let a = match self.train {
            true => self.explorer.action(&q, &mut self.rng)?,
            false => greedy(&q)?,
        };
        Ok(DiscreteAct(a))
    }
}

impl<E, Q, R> Agent<E, R> for Td3<E, Q, R>
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

    fn end_episode(&mut self) -> Result<()> {
        self.normalizer.update_mean();
        self.explorer.end_episode();
        Ok(())
    }

    fn save_params(&self, dir: &Path, epoch: usize) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut paths = Vec::with_capacity(ROLES.len() + 1);
        let models = self.qnets.iter().chain(self.qnets_tgt.iter());
        for (role, model) in ROLES.iter().zip(models) {
            let path = ckpt_path(dir, role, epoch);
            model.save(&path)?;
            paths.push(path);
        }
        let path = normalizer_path(dir, epoch);
        self.normalizer.save(&path)?;
        paths.push(path);
        Ok(paths)
    }

    fn load_params(&mut self, dir: &Path, epoch: usize) -> Result<()> {
        let paths = ensure_ckpt_files(dir, &ROLES, epoch)?;
        let models = self.qnets.iter_mut().chain(self.qnets_tgt.iter_mut());
        for (path, model) in paths.iter().zip(models) {
            model.load(path)?;
        }
        self.normalizer.load(normalizer_path(dir, epoch))?;
        Ok(())
    }
}
