mod common;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder};
use common::{snapshot, store_episode, PointEnv};
use her_candle_agent::{
    mlp::{Mlp, Mlp2, MlpConfig},
    model::SubModel2,
    sac::{EntCoefMode, Sac, SacConfig},
    util::{GaussianActorConfig, MultiCritic, MultiCriticConfig},
};
use her_core::{
    Agent, ContinuousAct, GoalObs, HerReplayBuffer, HerReplayBufferConfig, PerConfig, Policy,
    SparseReward,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tempdir::TempDir;
use test_log::test;

type Buffer = HerReplayBuffer<ContinuousAct, SparseReward>;
type SacAgent = Sac<PointEnv, Mlp, Mlp2, Buffer>;

fn sac_config(mode: EntCoefMode) -> SacConfig<Mlp, Mlp2> {
    SacConfig::default()
        .actor_config(
            GaussianActorConfig::default()
                .policy_config(MlpConfig::new(2, vec![16], 1, false))
                .action_scale(0.5),
        )
        .critic_config(MultiCriticConfig::default().q_config(MlpConfig::new(3, vec![16], 1, false)))
        .ent_coef_mode(mode)
        .batch_size(8)
        .n_updates_per_opt(3)
}

fn buffer(per: bool) -> Result<Buffer> {
    let mut config = HerReplayBufferConfig::default().capacity(1000).seed(3);
    if per {
        config = config.per_config(Some(PerConfig::default()));
    }
    Buffer::build(&config, SparseReward::new(0.1))
}

type Snapshot = BTreeMap<String, Vec<f32>>;

/// Entropy coefficient, then actor, critic and target critic parameters.
fn params(agent: &SacAgent) -> Result<(f32, [Snapshot; 3])> {
    Ok((
        agent.alpha()?,
        [
            snapshot(agent.actor().varmap())?,
            snapshot(agent.critic().varmap())?,
            snapshot(agent.critic().varmap_tgt())?,
        ],
    ))
}

#[test]
fn test_sac_does_not_learn_from_small_buffer() -> Result<()> {
    let mut agent = SacAgent::build(sac_config(EntCoefMode::Auto(1.0, 0.001)))?;
    let mut buffer = buffer(false)?;
    store_episode(&mut buffer, 0.0, 1, ContinuousAct(vec![0.5]))?;

    let before = params(&agent)?;
    assert!(agent.learn(&mut buffer)?.is_none());
    assert!(agent.learn_steps(&mut buffer, 2, 0)?.is_none());
    assert_eq!(agent.n_opts(), 0);
    assert_eq!(before, params(&agent)?);
    Ok(())
}

#[test]
fn test_sac_learn() -> Result<()> {
    let mut agent = SacAgent::build(sac_config(EntCoefMode::Auto(1.0, 0.001)))?;
    let mut buffer = buffer(true)?;
    store_episode(&mut buffer, 0.0, 5, ContinuousAct(vec![0.5]))?;

    let actor = snapshot(agent.actor().varmap())?;
    let critic = snapshot(agent.critic().varmap())?;
    let record = agent.learn(&mut buffer)?.unwrap();
    assert_eq!(agent.n_opts(), 3);
    assert!(record.get_scalar("loss_critic")?.is_finite());
    assert!(record.get_scalar("loss_actor")?.is_finite());
    assert!(record.get_scalar("policy_entropy")?.is_finite());
    assert!(record.get_scalar("alpha")? > 0.0);
    assert_ne!(actor, snapshot(agent.actor().varmap())?);
    assert_ne!(critic, snapshot(agent.critic().varmap())?);
    Ok(())
}

#[test]
fn test_sac_fixed_alpha() -> Result<()> {
    let mut agent = SacAgent::build(sac_config(EntCoefMode::Fix(0.2)))?;
    let mut buffer = buffer(false)?;
    store_episode(&mut buffer, 0.0, 5, ContinuousAct(vec![0.5]))?;
    let record = agent.learn(&mut buffer)?.unwrap();
    assert!((record.get_scalar("alpha")? - 0.2).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_sac_actions_are_bounded() -> Result<()> {
    let mut agent = SacAgent::build(sac_config(EntCoefMode::Fix(0.2)))?;
    let obs = GoalObs::new(vec![0.0], vec![0.0], vec![2.0]);
    for _ in 0..20 {
        let a = agent.sample(&obs)?;
        assert_eq!(a.0.len(), 1);
        assert!(a.0[0].abs() <= 0.5);
    }

    agent.eval();
    let a = agent.sample(&obs)?;
    assert_eq!(a, agent.sample(&obs)?);
    Ok(())
}

#[test]
fn test_sac_checkpoint() -> Result<()> {
    let tmp_dir = TempDir::new("sac_ckpt")?;
    let mut agent = SacAgent::build(sac_config(EntCoefMode::Auto(1.0, 0.001)))?;
    let mut buffer = buffer(false)?;
    store_episode(&mut buffer, 0.0, 5, ContinuousAct(vec![0.5]))?;
    agent.learn(&mut buffer)?;

    let paths = agent.save_params(tmp_dir.path(), 2)?;
    assert_eq!(paths.len(), 5);
    assert!(paths.iter().all(|p| p.is_file()));

    let mut agent_ = SacAgent::build(sac_config(EntCoefMode::Auto(1.0, 0.001)))?;
    agent_.load_params(tmp_dir.path(), 2)?;
    assert_eq!(
        snapshot(agent.actor().varmap())?,
        snapshot(agent_.actor().varmap())?
    );
    assert_eq!(
        snapshot(agent.critic().varmap_tgt())?,
        snapshot(agent_.critic().varmap_tgt())?
    );

    agent.eval();
    agent_.eval();
    let obs = GoalObs::new(vec![1.0], vec![1.0], vec![2.0]);
    assert_eq!(agent.sample(&obs)?, agent_.sample(&obs)?);

    assert!(agent_.load_params(tmp_dir.path(), 1).is_err());
    Ok(())
}

#[test]
fn test_sac_delayed_updates() -> Result<()> {
    let config = sac_config(EntCoefMode::Auto(1.0, 0.01))
        .n_updates_per_opt(1)
        .actor_update_interval(2)
        .critic_target_update_interval(2)
        .critic_config(
            MultiCriticConfig::default()
                .q_config(MlpConfig::new(3, vec![16], 1, false))
                .tau(0.5),
        );
    let mut agent = SacAgent::build(config)?;
    let mut buffer = buffer(false)?;
    store_episode(&mut buffer, 0.0, 5, ContinuousAct(vec![0.5]))?;

    // Update 0: everything moves.
    let (alpha0, [actor0, critic0, tgt0]) = params(&agent)?;
    let record = agent.learn(&mut buffer)?.unwrap();
    assert!(record.get_scalar("loss_actor").is_ok());
    let (alpha1, [actor1, critic1, tgt1]) = params(&agent)?;
    assert_ne!(alpha0, alpha1);
    assert_ne!(actor0, actor1);
    assert_ne!(critic0, critic1);
    assert_ne!(tgt0, tgt1);

    // Update 1: only the critics are trained.
    let record = agent.learn(&mut buffer)?.unwrap();
    assert!(record.get_scalar("loss_actor").is_err());
    let (alpha2, [actor2, critic2, tgt2]) = params(&agent)?;
    assert_eq!(alpha1, alpha2);
    assert_eq!(actor1, actor2);
    assert_ne!(critic1, critic2);
    assert_eq!(tgt1, tgt2);

    // Update 2: everything moves again.
    agent.learn(&mut buffer)?.unwrap();
    let (alpha3, [actor3, _, tgt3]) = params(&agent)?;
    assert_ne!(alpha2, alpha3);
    assert_ne!(actor2, actor3);
    assert_ne!(tgt2, tgt3);
    assert_eq!(agent.n_opts(), 3);
    Ok(())
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
struct ConstQConfig;

/// Critic of which the output is a single trainable scalar.
struct ConstQ {
    q: Tensor,
}

impl SubModel2 for ConstQ {
    type Config = ConstQConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Result<Tensor>;

    fn build(vb: VarBuilder, _config: Self::Config) -> Result<Self> {
        let q = vb.get_with_hints(1, "q", Init::Const(0.0))?;
        Ok(Self { q })
    }

    fn forward(&self, obs: &Tensor, _act: &Tensor) -> Self::Output {
        let batch_size = obs.dims()[0];
        Ok(self.q.broadcast_as((batch_size, 1))?.contiguous()?)
    }
}

fn set_var(critic: &MultiCritic<ConstQ>, name: &str, v: f32, target: bool) -> Result<()> {
    let varmap = if target {
        critic.varmap_tgt()
    } else {
        critic.varmap()
    };
    let data = varmap.data().lock().unwrap();
    data.get(name)
        .unwrap()
        .set(&Tensor::new(&[v], &Device::Cpu)?)?;
    Ok(())
}

#[test]
fn test_multi_critic_takes_min_over_targets() -> Result<()> {
    let config = MultiCriticConfig::default().q_config(ConstQConfig).tau(0.5);
    let mut critic = MultiCritic::<ConstQ>::build(config, Device::Cpu)?;
    let obs = Tensor::zeros((3, 2), DType::F32, &Device::Cpu)?;
    let act = Tensor::zeros((3, 1), DType::F32, &Device::Cpu)?;

    set_var(&critic, "critic_tgt0.q", 1.0, true)?;
    set_var(&critic, "critic_tgt1.q", -2.0, true)?;
    let q = critic.qvals_min_tgt(&obs, &act)?;
    assert_eq!(q.dims(), [3]);
    assert_eq!(q.to_vec1::<f32>()?, vec![-2.0; 3]);

    set_var(&critic, "critic0.q", 4.0, false)?;
    set_var(&critic, "critic1.q", 3.0, false)?;
    assert_eq!(critic.qvals_min(&obs, &act)?.to_vec1::<f32>()?, vec![3.0; 3]);

    // Each target moves halfway to its own critic.
    critic.soft_update()?;
    let qs = critic
        .qvals(&obs, &act)?
        .iter()
        .map(|q| Ok(q.to_vec1::<f32>()?[0]))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(qs, vec![4.0, 3.0]);
    assert_eq!(
        critic.qvals_min_tgt(&obs, &act)?.to_vec1::<f32>()?,
        vec![0.5; 3]
    );
    Ok(())
}
