//! Train [`Agent`].
mod config;
mod state;
use crate::{
    base::{Agent, Env},
    error::HerError,
    evaluator::Evaluator,
    her_replay_buffer::{HerReplayBuffer, Transition},
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    reward::RewardFn,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info};
pub use state::TrainerState;
use std::{marker::PhantomData, path::Path};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// The loop has three levels, Epoch, Cycle and Episode:
///
/// * An episode resets the environment and runs it until it terminates, is truncated
///   by the environment or reaches `max_episode_steps`. Every transition is stored
///   in the buffer and the next observation is added to the normalizer history.
///   At the end of the episode:
///     1. the episode is closed in the buffer,
///     2. [`Agent::end_episode`] folds the history into the normalizer statistics,
///     3. the buffer relabels the episode if `hindsight` is enabled,
///     4. the episode is flattened into the replay ring,
///     5. [`Agent::learn`] is called once.
/// * A cycle runs `episodes` episodes and stores `cycle_return` and
///   `cycle_success_rate` in the recorder.
/// * An epoch runs `cycles` cycles. After epoch `e`, if `(e + 1) % test_interval == 0`,
///   the agent is tested with the [`Evaluator`] in evaluation mode and
///   `epoch_test_return`, `epoch_test_success_rate` are stored.
///   If `(e + 1) % save_interval == 0`, the parameters are saved in `model_dir`
///   with epoch number `e + 1`.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|Env::Act|B[Env]
///     B -->|GoalObs|A
///     B -->|"Step&lt;E: Env&gt;"|C[HerReplayBuffer]
///     C -->|GoalTransitionBatch|A
///     B -->|history_features|D[Normalizer]
///     D -->|scale|A
/// ```
pub struct Trainer<E: Env, F: RewardFn> {
    config: TrainerConfig,
    phantom: PhantomData<(E, F)>,
}

impl<E, F> Trainer<E, F>
where
    E: Env,
    F: RewardFn,
{
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            config,
            phantom: PhantomData,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn save_model<A>(&self, agent: &A, epoch: usize) -> Result<()>
    where
        A: Agent<E, HerReplayBuffer<E::Act, F>>,
    {
        if let Some(model_dir) = self.config.model_dir.as_ref() {
            std::fs::create_dir_all(model_dir)?;
            let paths = agent.save_params(Path::new(model_dir), epoch)?;
            info!("Saved the model of epoch {} in {:?}", epoch, model_dir);
            debug!("{:?}", paths);
        }
        Ok(())
    }

    /// Runs a training episode and returns its return and success.
    fn run_episode<A>(
        &self,
        env: &mut E,
        agent: &mut A,
        buffer: &mut HerReplayBuffer<E::Act, F>,
        recorder: &mut dyn AggregateRecorder,
        state: &mut TrainerState,
    ) -> Result<(f32, bool)>
    where
        A: Agent<E, HerReplayBuffer<E::Act, F>>,
    {
        let mut obs = env.reset()?;
        agent
            .normalizer_mut()
            .store_history(&obs.history_features())?;
        let mut ep_return = 0f32;
        let mut t = 0;

        loop {
            let act = agent.sample(&obs)?;
            let step = env.step(&act)?;
            t += 1;
            state.env_steps += 1;
            ep_return += step.reward;

            let is_truncated = step.is_truncated == 1
                || self.config.max_episode_steps.map_or(false, |m| t >= m);
            let tr = Transition::new(
                &obs,
                act,
                &step.obs,
                step.reward,
                step.is_terminated,
                is_truncated as i8,
            );
            buffer.store_experience(t == 1, tr);
            agent
                .normalizer_mut()
                .store_history(&step.obs.history_features())?;

            let done = step.is_terminated == 1 || is_truncated;
            obs = step.obs;
            if done {
                break;
            }
        }

        buffer.close_episode();
        agent.end_episode()?;
        if self.config.hindsight {
            buffer.modify_episodes();
        }
        buffer.store_episodes()?;

        if let Some(record) = agent.learn(buffer)? {
            state.opt_steps += 1;
            recorder.store(record);
        }
        state.episodes += 1;

        let success = buffer.is_success(&obs.achieved_goal, &obs.desired_goal);
        Ok((ep_return, success))
    }

    /// Runs a test pass with the agent in evaluation mode.
    fn test<A, D>(&self, agent: &mut A, evaluator: &mut D) -> Result<(f32, f32)>
    where
        A: Agent<E, HerReplayBuffer<E::Act, F>>,
        D: Evaluator<E>,
    {
        agent.eval();
        let record = evaluator.evaluate(agent);
        agent.train();
        let record = record?;
        Ok((
            record.get_scalar("episode_return")?,
            record.get_scalar("success_rate")?,
        ))
    }

    /// Train the agent.
    pub fn train<A, D>(
        &mut self,
        env: &mut E,
        agent: &mut A,
        buffer: &mut HerReplayBuffer<E::Act, F>,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
    ) -> Result<TrainerState>
    where
        A: Agent<E, HerReplayBuffer<E::Act, F>>,
        D: Evaluator<E>,
    {
        let mut state = TrainerState::default();
        let n_episodes = self.config.episodes.max(1) as f32;
        agent.train();
        info!("Start training");

        for epoch in 0..self.config.epochs {
            state.epoch = epoch;

            for cycle in 0..self.config.cycles {
                state.cycle = cycle;
                let mut cycle_return = 0f32;
                let mut cycle_success = 0usize;

                for _ in 0..self.config.episodes {
                    let (ep_return, success) =
                        self.run_episode(env, agent, buffer, recorder, &mut state)?;
                    cycle_return += ep_return;
                    cycle_success += success as usize;
                }

                let cycle_return = cycle_return / n_episodes;
                let cycle_success_rate = cycle_success as f32 / n_episodes;
                state.cycle_returns.push(cycle_return);
                state.cycle_success_rates.push(cycle_success_rate);
                recorder.store(Record::from_slice(&[
                    ("cycle_return", Scalar(cycle_return)),
                    ("cycle_success_rate", Scalar(cycle_success_rate)),
                ]));
                recorder.flush((epoch * self.config.cycles + cycle) as i64);
                info!(
                    "Epoch {} Cycle {} avg. return {:.1} success rate {:.2}",
                    epoch, cycle, cycle_return, cycle_success_rate
                );
            }

            if self.config.test_interval > 0 && (epoch + 1) % self.config.test_interval == 0 {
                let (test_return, test_success_rate) = self.test(agent, evaluator)?;
                state.test_returns.push(test_return);
                state.test_success_rates.push(test_success_rate);
                recorder.store(Record::from_slice(&[
                    ("epoch_test_return", Scalar(test_return)),
                    ("epoch_test_success_rate", Scalar(test_success_rate)),
                ]));
                recorder.flush(((epoch + 1) * self.config.cycles) as i64);
                info!(
                    "Epoch {} test avg. return {:.1} success rate {:.2}",
                    epoch, test_return, test_success_rate
                );
            }

            if self.config.save_interval > 0 && (epoch + 1) % self.config.save_interval == 0 {
                self.save_model(agent, epoch + 1)?;
            }
        }

        info!("Finished training");
        Ok(state)
    }

    /// Evaluates the agent without training.
    ///
    /// If `load_epoch` is given, the parameters saved for that epoch in `model_dir`
    /// are loaded first; a missing file is an error.
    pub fn evaluate<A, D>(
        &self,
        agent: &mut A,
        evaluator: &mut D,
        load_epoch: Option<usize>,
    ) -> Result<Record>
    where
        A: Agent<E, HerReplayBuffer<E::Act, F>>,
        D: Evaluator<E>,
    {
        if let Some(epoch) = load_epoch {
            let model_dir = self.config.model_dir.as_ref().ok_or_else(|| {
                HerError::InvalidConfig("model_dir is required to load parameters".to_string())
            })?;
            agent.load_params(Path::new(model_dir), epoch)?;
            info!("Loaded the model of epoch {} from {:?}", epoch, model_dir);
        }
        info!("Start testing");
        agent.eval();
        evaluator.evaluate(agent)
    }
}
