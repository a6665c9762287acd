//! Environment step.
use super::{Env, GoalObs};

/// Additional information to `GoalObs` and `Act`.
pub trait Info {}

impl Info for () {}

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// with some additional information.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Observation after the action.
    pub obs: GoalObs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: i8,

    /// Flag denoting if episode is truncated.
    pub is_truncated: i8,

    /// Information defined by user.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: GoalObs,
        act: E::Act,
        reward: f32,
        is_terminated: i8,
        is_truncated: i8,
        info: E::Info,
    ) -> Self {
        Step {
            act,
            obs,
            reward,
            is_terminated,
            is_truncated,
            info,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated == 1 || self.is_truncated == 1
    }
}
