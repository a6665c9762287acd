//! Core functionalities.
mod act;
mod agent;
mod env;
mod obs;
mod policy;
mod replay_buffer;
mod step;
pub use act::{ContinuousAct, DiscreteAct};
pub use agent::Agent;
pub use env::Env;
pub(crate) use obs::concat;
pub use obs::GoalObs;
pub use policy::Policy;
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
use std::fmt::Debug;
pub use step::{Info, Step};

/// An action of the environment.
pub trait Act: Clone + Debug {
    /// Returns the number of elements of the action.
    fn len(&self) -> usize;
}
