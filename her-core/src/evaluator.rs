//! Evaluate a policy.
use crate::{base::Policy, record::Record, Env};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate a policy.
pub trait Evaluator<E: Env> {
    /// Runs test episodes with `policy`.
    ///
    /// The caller of this method needs to handle the internal state of the agent,
    /// like training/evaluation mode. The returned record contains `episode_return`
    /// and `success_rate` averaged over the test episodes.
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record>;
}
