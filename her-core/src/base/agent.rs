//! Agent.
use super::{Env, Policy, ReplayBufferBase};
use crate::{normalizer::Normalizer, record::Record};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Represents a trainable policy on a goal-conditioned environment.
///
/// The agent owns its networks, optimizers and the input [`Normalizer`].
/// The replay buffer is owned by the caller and lent to [`Agent::learn`].
pub trait Agent<E: Env, R: ReplayBufferBase>: Policy<E> {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs the configured number of optimization steps with the
    /// configured batch size.
    ///
    /// Returns `Ok(None)` without touching any parameter if the buffer holds fewer
    /// transitions than the batch size.
    fn learn(&mut self, buffer: &mut R) -> Result<Option<Record>>;

    /// Performs `steps` optimization steps with batches of `batch_size` transitions.
    fn learn_steps(
        &mut self,
        buffer: &mut R,
        steps: usize,
        batch_size: usize,
    ) -> Result<Option<Record>>;

    /// Input normalizer of the agent.
    fn normalizer(&self) -> &Normalizer;

    /// Mutable access to the input normalizer, used to accumulate history.
    fn normalizer_mut(&mut self) -> &mut Normalizer;

    /// Called by the trainer at the end of every training episode.
    ///
    /// The default implementation folds the accumulated history into the
    /// normalizer statistics.
    fn end_episode(&mut self) -> Result<()> {
        self.normalizer_mut().update_mean();
        Ok(())
    }

    /// Saves the parameters of the agent for the given epoch in `dir`.
    ///
    /// Returns the paths of the written files.
    fn save_params(&self, dir: &Path, epoch: usize) -> Result<Vec<PathBuf>>;

    /// Loads the parameters saved for the given epoch in `dir`.
    ///
    /// Fails if a file of any role of the agent is missing.
    fn load_params(&mut self, dir: &Path, epoch: usize) -> Result<()>;
}
