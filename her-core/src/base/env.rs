//! Environment.
use super::{Act, GoalObs, Info, Step};
use anyhow::Result;

/// Represents a goal-conditioned environment.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<GoalObs>;

    /// Resets the environment with a given index.
    ///
    /// The index is used in an arbitrary way, e.g., as a random seed of the episode.
    /// [`DefaultEvaluator`](crate::DefaultEvaluator) calls this method with the
    /// episode index so that test runs are reproducible.
    fn reset_with_index(&mut self, ix: usize) -> Result<GoalObs>;

    /// Performs an environment step.
    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;
}
