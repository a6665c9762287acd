//! Default implementation of the [`Evaluator`] trait.
use super::Evaluator;
use crate::{
    base::Policy,
    record::{Record, RecordValue::Scalar},
    reward::RewardFn,
    Env,
};
use anyhow::Result;
use log::debug;

/// Runs a fixed number of episodes and reports the average return and
/// success rate.
///
/// An episode is successful if the reward function regards the achieved goal
/// of the last observation as reaching its desired goal.
pub struct DefaultEvaluator<E: Env, F: RewardFn> {
    n_episodes: usize,
    max_steps: Option<usize>,
    reward_fn: F,
    env: E,
}

impl<E: Env, F: RewardFn> Evaluator<E> for DefaultEvaluator<E, F> {
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record> {
        let mut r_total = 0f32;
        let mut n_success = 0usize;

        for ix in 0..self.n_episodes {
            let mut obs = self.env.reset_with_index(ix)?;
            let mut t = 0;

            loop {
                let act = policy.sample(&obs)?;
                let step = self.env.step(&act)?;
                r_total += step.reward;
                t += 1;
                let done = step.is_done() || self.max_steps.map_or(false, |m| t >= m);
                obs = step.obs;
                if done {
                    break;
                }
            }

            if self.reward_fn.is_success(&obs.achieved_goal, &obs.desired_goal) {
                n_success += 1;
            }
            debug!("Test episode {}: {} steps", ix, t);
        }

        let n = self.n_episodes.max(1) as f32;
        Ok(Record::from_slice(&[
            ("episode_return", Scalar(r_total / n)),
            ("success_rate", Scalar(n_success as f32 / n)),
        ]))
    }
}

impl<E: Env, F: RewardFn> DefaultEvaluator<E, F> {
    /// Constructs a new [`DefaultEvaluator`].
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize, reward_fn: F) -> Result<Self> {
        Ok(Self {
            n_episodes,
            max_steps: None,
            reward_fn,
            env: E::build(config, seed)?,
        })
    }

    /// Sets the maximum number of steps of a test episode.
    pub fn max_steps(mut self, v: Option<usize>) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the number of test episodes.
    pub fn n_episodes(mut self, v: usize) -> Self {
        self.n_episodes = v;
        self
    }
}
