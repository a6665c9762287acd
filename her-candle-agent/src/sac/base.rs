use super::{EntCoef, SacConfig};
use crate::{
    model::{SubModel1, SubModel2},
    util::{
        abs_td_err, clamp_target, continuous_act_tensor, critic_loss, input_tensor,
        not_terminated, obs_tensor, vec_tensor, CriticLoss, GaussianActor, MultiCritic, OutDim,
    },
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use her_core::{
    record::{Record, RecordValue},
    util::{ckpt_path, ensure_ckpt_files, normalizer_path},
    Agent, ContinuousAct, Env, GoalObs, GoalTransitionBatch, Normalizer, Policy, ReplayBufferBase,
};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::Debug,
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

type ActionValue = Result<Tensor>;
type ActMeanLogStd = Result<(Tensor, Tensor)>;

const ROLES: [&str; 4] = ["actor", "critic", "critic_tgt", "ent_coef"];

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Soft actor critic (SAC) agent for goal-conditioned tasks with continuous actions.
///
/// One parameter update proceeds as follows:
///
/// ```mermaid
/// graph TD
///     A[batch from HerReplayBuffer] --> B[scale inputs with Normalizer]
///     B --> C["target: r + gamma * (min Q'(s', a') - alpha * log pi(a'|s'))"]
///     C --> D[clamp target]
///     D --> E[critic loss, PER weighted if given]
///     E --> F{interval?}
///     F -->|critic_target_update_interval| G[soft update of target critics]
///     F -->|actor_update_interval| H[actor loss and entropy coefficient update]
/// ```
pub struct Sac<E, Q, P, R>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel1<Input = Tensor, Output = ActMeanLogStd>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    critic: MultiCritic<Q>,
    actor: GaussianActor<P>,
    ent_coef: EntCoef,
    normalizer: Normalizer,
    gamma: f64,
    n_updates_per_opt: usize,
    batch_size: usize,
    actor_update_interval: usize,
    critic_target_update_interval: usize,
    discard_time_limit: bool,
    target_clip: Option<(f64, f64)>,
    critic_loss: CriticLoss,
    train: bool,
    n_opts: usize,
    device: Device,
    phantom: PhantomData<(E, R)>,
}

impl<E, Q, P, R> Sac<E, Q, P, R>
where
    E: Env<Act = ContinuousAct>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel1<Input = Tensor, Output = ActMeanLogStd>,
    R: ReplayBufferBase<Batch = GoalTransitionBatch<ContinuousAct>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Constructs [`Sac`] agent.
    ///
    /// The target entropy is minus the dimension of the action.
    pub fn build(config: SacConfig<Q, P>) -> Result<Self> {
        let device = config.device.build()?;
        let act_dim = config
            .actor_config
            .policy_config
            .as_ref()
            .map(|c| c.get_out_dim())
            .unwrap_or(1);
        let actor = GaussianActor::build(config.actor_config, device.clone())?;
        let critic = MultiCritic::build(config.critic_config, device.clone())?;
        let ent_coef = EntCoef::new(config.ent_coef_mode, -(act_dim as f64), device.clone())?;
        let normalizer = Normalizer::build(&config.normalizer_config)?;

        Ok(Sac {
            critic,
            actor,
            ent_coef,
            normalizer,
            gamma: config.gamma,
            n_updates_per_opt: config.n_updates_per_opt,
            batch_size: config.batch_size,
            actor_update_interval: config.actor_update_interval.max(1),
            critic_target_update_interval: config.critic_target_update_interval.max(1),
            discard_time_limit: config.discard_time_limit,
            target_clip: config.target_clip,
            critic_loss: config.critic_loss,
            train: true,
            n_opts: 0,
            device,
            phantom: PhantomData,
        })
    }

    /// Number of critic updates so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The critics.
    pub fn critic(&self) -> &MultiCritic<Q> {
        &self.critic
    }

    /// The actor.
    pub fn actor(&self) -> &GaussianActor<P> {
        &self.actor
    }

    /// Current entropy coefficient.
    pub fn alpha(&self) -> Result<f32> {
        self.ent_coef.alpha_scalar()
    }

    fn update_critic(
        &mut self,
        obs: &Tensor,
        batch: GoalTransitionBatch<ContinuousAct>,
        buffer: &mut R,
    ) -> Result<f32> {
        let (_, act, next_obs, reward, is_terminated, _, ixs, weight) = batch.unpack();
        let batch_size = reward.len();
        let act = continuous_act_tensor(&act, &self.device)?;
        let next_obs = input_tensor(&next_obs, &self.normalizer, &self.device)?;
        let reward = vec_tensor(&reward, &self.device)?;
        let not_done = match self.discard_time_limit {
            true => Tensor::ones(batch_size, DType::F32, &self.device)?,
            false => not_terminated(&is_terminated, &self.device)?,
        };
        let weight = match weight {
            Some(w) => Some(vec_tensor(&w, &self.device)?),
            None => None,
        };

        let tgt = {
            let (next_act, next_logp) = self.actor.sample_logp(&next_obs)?;
            let next_q = self.critic.qvals_min_tgt(&next_obs, &next_act)?;
            let next_v = (next_q - self.ent_coef.alpha()?.broadcast_mul(&next_logp)?)?;
            let tgt = (reward + (not_done * next_v)?.affine(self.gamma, 0.0)?)?;
            clamp_target(tgt, self.target_clip)?.detach()
        };
        debug_assert_eq!(tgt.dims(), [batch_size]);

        let qs = self.critic.qvals(obs, &act)?;
        let losses = qs
            .iter()
            .map(|q| critic_loss(&self.critic_loss, q, &tgt, weight.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let loss = Tensor::stack(&losses, 0)?.sum_all()?;
        self.critic.backward_step(&loss)?;

        if ixs.is_some() {
            let td_err = abs_td_err(&qs[0].detach(), &tgt)?;
            buffer.update_priority(&ixs, &Some(td_err));
        }

        Ok(loss.to_scalar::<f32>()? / losses.len() as f32)
    }

    /// Returns the loss of the actor and the estimated entropy of the policy.
    fn update_actor(&mut self, obs: &Tensor) -> Result<(f32, f32)> {
        let (act, logp) = self.actor.sample_logp(obs)?;
        let q = self.critic.qvals_min(obs, &act)?;
        let alpha = self.ent_coef.alpha()?;
        let loss = (alpha.broadcast_mul(&logp)? - &q)?.mean_all()?;
        self.actor.backward_step(&loss)?;
        self.ent_coef.update(&logp)?;

        let entropy = -logp.mean_all()?.to_scalar::<f32>()?;
        Ok((loss.to_scalar::<f32>()?, entropy))
    }

    fn opt_(&mut self, buffer: &mut R, steps: usize, batch_size: usize) -> Result<Option<Record>> {
        if batch_size == 0 || buffer.len() < batch_size {
            return Ok(None);
        }

        let mut loss_critic = 0f32;
        let mut loss_actor = 0f32;
        let mut entropy = 0f32;
        let mut n_critic_updates = 0;
        let mut n_actor_updates = 0;

        for _ in 0..steps {
            let batch = match buffer.batch(batch_size)? {
                Some(batch) => batch,
                None => break,
            };
            let obs = input_tensor(&batch.obs, &self.normalizer, &self.device)?;

            trace!("update_critic()");
            loss_critic += self.update_critic(&obs, batch, buffer)?;
            n_critic_updates += 1;

            if self.n_opts % self.critic_target_update_interval == 0 {
                trace!("soft_update()");
                self.critic.soft_update()?;
            }

            if self.n_opts % self.actor_update_interval == 0 {
                trace!("update_actor()");
                let (l, h) = self.update_actor(&obs)?;
                loss_actor += l;
                entropy += h;
                n_actor_updates += 1;
            }

            self.n_opts += 1;
        }

        if n_critic_updates == 0 {
            return Ok(None);
        }

        let mut record = Record::from_slice(&[
            (
                "loss_critic",
                RecordValue::Scalar(loss_critic / n_critic_updates as f32),
            ),
            ("alpha", RecordValue::Scalar(self.ent_coef.alpha_scalar()?)),
        ]);
        if n_actor_updates > 0 {
            let n = n_actor_updates as f32;
            record.insert("loss_actor", RecordValue::Scalar(loss_actor / n));
            record.insert("policy_entropy", RecordValue::Scalar(entropy / n));
        }

        Ok(Some(record))
    }
}

impl<E, Q, P, R> Policy<E> for Sac<E, Q, P, R>
where
    E: Env<Act = ContinuousAct>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel1<Input = Tensor, Output = ActMeanLogStd>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Samples from the policy in training mode, takes its mode otherwise.
    fn sample(&mut self, obs: &GoalObs) -> Result<ContinuousAct> {
        let x = obs_tensor(obs, &self.normalizer, &self.device)?;
        let act = self.actor.act(&x, !self.train)?;
        Ok(ContinuousAct(act.flatten_all()?.to_vec1::<f32>()?))
    }
}

impl<E, Q, P, R> Agent<E, R> for Sac<E, Q, P, R>
where
    E: Env<Act = ContinuousAct>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    P: SubModel1<Input = Tensor, Output = ActMeanLogStd>,
    R: ReplayBufferBase<Batch = GoalTransitionBatch<ContinuousAct>>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
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

    fn save_params(&self, dir: &Path, epoch: usize) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let paths = ROLES
            .iter()
            .map(|role| ckpt_path(dir, role, epoch))
            .collect::<Vec<_>>();
        self.actor.save(&paths[0])?;
        self.critic.save(&paths[1], &paths[2])?;
        self.ent_coef.save(&paths[3])?;

        let path = normalizer_path(dir, epoch);
        self.normalizer.save(&path)?;

        Ok(paths.into_iter().chain(std::iter::once(path)).collect())
    }

    fn load_params(&mut self, dir: &Path, epoch: usize) -> Result<()> {
        let paths = ensure_ckpt_files(dir, &ROLES, epoch)?;
        self.actor.load(&paths[0])?;
        self.critic.load(&paths[1], &paths[2])?;
        self.ent_coef.load(&paths[3])?;
        self.normalizer.load(normalizer_path(dir, epoch))?;
        Ok(())
    }
}
