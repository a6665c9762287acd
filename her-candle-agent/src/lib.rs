//! Goal-conditioned RL agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`dqn::Dqn`]: DQN with epsilon-greedy exploration decaying over episodes.
//! * [`td3::Td3`]: twin Q-networks for discrete actions.
//! * [`sac::Sac`]: soft actor-critic with a tanh-squashed Gaussian policy.
//!
//! All agents implement [`her_core::Agent`] on [`her_core::HerReplayBuffer`] and
//! scale their inputs with an [`her_core::Normalizer`].
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod sac;
pub mod td3;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device of the given ordinal.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Device {
    /// Creates the [`candle_core::Device`].
    pub fn build(&self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(*n)?),
        }
    }
}
