//! Optimizers of Q-networks, actors, critics and the entropy coefficient.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Optimizer of a network, written in the agent configuration.
///
/// ```rust
/// use her_candle_agent::opt::OptimizerConfig;
///
/// let adam = OptimizerConfig::default().learning_rate(1e-3);
/// let adam_w = OptimizerConfig::adam_w(1e-3, 1e-2);
/// assert_eq!(adam_w.lr(), 1e-3);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam from `candle-optimisers`.
    Adam { lr: f64 },

    /// AdamW from `candle-nn`, moment decay rates and epsilon left at their defaults.
    AdamW { lr: f64, weight_decay: f64 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 1e-4 }
    }
}

impl OptimizerConfig {
    /// AdamW with the given learning rate and weight decay.
    pub fn adam_w(lr: f64, weight_decay: f64) -> Self {
        Self::AdamW { lr, weight_decay }
    }

    /// Learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => *lr,
        }
    }

    /// Replaces the learning rate, keeping the kind of optimizer.
    pub fn learning_rate(mut self, v: f64) -> Self {
        match &mut self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => *lr = v,
        }
        self
    }

    /// Builds an optimizer updating `vars`.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        let opt = match *self {
            Self::Adam { lr } => {
                let params = ParamsAdam {
                    lr,
                    ..ParamsAdam::default()
                };
                Optimizer::Adam(Adam::new(vars, params)?)
            }
            Self::AdamW { lr, weight_decay } => {
                let params = ParamsAdamW {
                    lr,
                    weight_decay,
                    ..ParamsAdamW::default()
                };
                Optimizer::AdamW(AdamW::new(vars, params)?)
            }
        };
        Ok(opt)
    }
}

/// Optimizer built from [`OptimizerConfig`].
pub enum Optimizer {
    Adam(Adam),
    AdamW(AdamW),
}

impl Optimizer {
    /// Computes the gradients of `loss` and applies one update.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.backward_step(loss)?,
            Self::AdamW(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}
