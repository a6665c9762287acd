//! Small goal-conditioned environments and helpers shared by the tests.
#![allow(dead_code)]
use anyhow::Result;
use candle_nn::VarMap;
use her_core::{
    Act, ContinuousAct, DiscreteAct, Env, GoalObs, HerReplayBuffer, RewardFn, SparseReward, Step,
    Transition,
};
use std::collections::BTreeMap;

/// Walk on `0..size` with actions left (0) and right (1).
pub struct LineEnv {
    size: i64,
    pos: i64,
    goal: i64,
}

impl LineEnv {
    fn obs(&self) -> GoalObs {
        GoalObs::new(
            vec![self.pos as f32],
            vec![self.pos as f32],
            vec![self.goal as f32],
        )
    }
}

impl Env for LineEnv {
    type Config = i64;
    type Act = DiscreteAct;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            size: *config,
            pos: 0,
            goal: 1,
        })
    }

    fn reset(&mut self) -> Result<GoalObs> {
        self.reset_with_index(0)
    }

    fn reset_with_index(&mut self, ix: usize) -> Result<GoalObs> {
        self.pos = 0;
        self.goal = 1 + (ix as i64) % (self.size - 1);
        Ok(self.obs())
    }

    fn step(&mut self, a: &DiscreteAct) -> Result<Step<Self>> {
        let d = if a.0 == 0 { -1 } else { 1 };
        self.pos = (self.pos + d).max(0).min(self.size - 1);
        let success = self.pos == self.goal;
        let reward = if success { 0.0 } else { -1.0 };
        Ok(Step::new(self.obs(), *a, reward, success as i8, 0, ()))
    }
}

/// Point on a line moved by a bounded real action.
pub struct PointEnv {
    pos: f32,
    goal: f32,
}

impl PointEnv {
    fn obs(&self) -> GoalObs {
        GoalObs::new(vec![self.pos], vec![self.pos], vec![self.goal])
    }
}

impl Env for PointEnv {
    type Config = f32;
    type Act = ContinuousAct;
    type Info = ();

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            pos: 0.0,
            goal: *config,
        })
    }

    fn reset(&mut self) -> Result<GoalObs> {
        self.pos = 0.0;
        Ok(self.obs())
    }

    fn reset_with_index(&mut self, _ix: usize) -> Result<GoalObs> {
        self.reset()
    }

    fn step(&mut self, a: &ContinuousAct) -> Result<Step<Self>> {
        self.pos += a.0[0].max(-1.0).min(1.0);
        let success = (self.pos - self.goal).abs() <= 0.1;
        let reward = if success { 0.0 } else { -1.0 };
        Ok(Step::new(self.obs(), a.clone(), reward, success as i8, 0, ()))
    }
}

/// Stores an episode of `len` steps moving by `+1` from `start` with action `act`,
/// relabels it and flattens it into the ring.
pub fn store_episode<A: Act>(
    buffer: &mut HerReplayBuffer<A, SparseReward>,
    start: f32,
    len: usize,
    act: A,
) -> Result<()> {
    let goal = start + len as f32;
    let reward_fn = buffer.reward_fn().clone();
    for t in 0..len {
        let p = start + t as f32;
        let obs = GoalObs::new(vec![p], vec![p], vec![goal]);
        let next = GoalObs::new(vec![p + 1.0], vec![p + 1.0], vec![goal]);
        let reward = reward_fn.reward(&next.achieved_goal, &next.desired_goal);
        let is_terminated = (t == len - 1) as i8;
        let tr = Transition::new(&obs, act.clone(), &next, reward, is_terminated, 0);
        buffer.store_experience(t == 0, tr);
    }
    buffer.close_episode();
    buffer.modify_episodes();
    buffer.store_episodes()?;
    Ok(())
}

/// Copies every variable of a [`VarMap`] keyed by its name.
pub fn snapshot(varmap: &VarMap) -> Result<BTreeMap<String, Vec<f32>>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    data.iter()
        .map(|(k, v)| Ok((k.clone(), v.as_tensor().flatten_all()?.to_vec1::<f32>()?)))
        .collect()
}
