#![warn(missing_docs)]
//! Core components for goal-conditioned reinforcement learning with
//! hindsight experience replay (HER).
//!
//! This crate is independent of any tensor backend. It provides
//!
//! * the interfaces [`Env`], [`Policy`], [`Agent`] and [`ReplayBufferBase`],
//! * [`HerReplayBuffer`], a replay buffer relabeling episodes with achieved goals,
//!   optionally with prioritized sampling,
//! * [`Normalizer`], scaling network inputs with statistics updated per episode,
//! * [`Trainer`], running the Epoch, Cycle and Episode loop of the HER paper.
//!
//! Agents are implemented in backend crates.
pub mod error;
pub mod her_replay_buffer;
pub mod normalizer;
pub mod record;
pub mod reward;
pub mod util;

mod base;
pub use base::{
    Act, Agent, ContinuousAct, DiscreteAct, Env, ExperienceBufferBase, GoalObs, Info, Policy,
    ReplayBufferBase, Step,
};
pub use her_replay_buffer::{
    GoalStrategy, GoalTransitionBatch, HerReplayBuffer, HerReplayBufferConfig, PerConfig,
    Transition, WeightNormalizer,
};
pub use normalizer::{Normalizer, NormalizerConfig};
pub use reward::{RewardFn, SparseReward};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Trainer, TrainerConfig, TrainerState};
