//! Hindsight experience replay buffer.
//!
//! Transitions are collected per episode. Closed episodes are relabeled with
//! goals achieved later in the same episode ([`HerReplayBuffer::modify_episodes`])
//! and then flattened into a fixed-capacity ring ([`HerReplayBuffer::store_episodes`]),
//! from which minibatches are drawn uniformly or by priority.
mod base;
mod batch;
mod config;
mod episode;
mod transition;
pub use base::{HerReplayBuffer, IwScheduler, SumTree, WeightNormalizer};
pub use batch::GoalTransitionBatch;
pub use config::{GoalStrategy, HerReplayBufferConfig, PerConfig};
pub use episode::Episode;
pub use transition::Transition;
