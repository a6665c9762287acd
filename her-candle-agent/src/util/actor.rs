//! Actor with Gaussian policy.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Log density of `N(mean, std)` at `mean + std * z`, summed over the last dimension.
fn normal_logp(z: &Tensor, log_std: &Tensor) -> Result<Tensor> {
    let c = -0.5 * (2.0 * std::f64::consts::PI).ln();
    let tmp = ((-0.5 * z.sqr()?)? - log_std)?;
    Ok((tmp + c)?.sum(D::Minus1)?)
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianActor`].
pub struct GaussianActorConfig<P: OutDim> {
    pub policy_config: Option<P>,
    pub opt_config: OptimizerConfig,
    pub min_log_std: f64,
    pub max_log_std: f64,

    /// Actions in `[-1, 1]` are multiplied by this value.
    pub action_scale: f64,

    /// Added inside the logarithm of the tanh Jacobian.
    pub epsilon: f64,
}

impl<P: OutDim> Default for GaussianActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            min_log_std: -20.0,
            max_log_std: 2.0,
            action_scale: 1.0,
            epsilon: 1e-6,
        }
    }
}

impl<P> GaussianActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the minimum value of log std.
    pub fn min_log_std(mut self, v: f64) -> Self {
        self.min_log_std = v;
        self
    }

    /// Sets the maximum value of log std.
    pub fn max_log_std(mut self, v: f64) -> Self {
        self.max_log_std = v;
        self
    }

    /// Sets the scale of actions.
    pub fn action_scale(mut self, v: f64) -> Self {
        self.action_scale = v;
        self
    }

    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(pi_config) = &mut self.policy_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`GaussianActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Actor with a tanh-squashed Gaussian policy.
///
/// Actions are sampled with the reparameterization trick, so the log
/// probabilities returned by [`GaussianActor::sample_logp`] are differentiable
/// with respect to the parameters of the policy.
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: usize,

    policy: P,
    opt: Optimizer,

    min_log_std: f64,
    max_log_std: f64,
    action_scale: f64,
    epsilon: f64,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = Result<(Tensor, Tensor)>>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianActor`].
    pub fn build(config: GaussianActorConfig<P::Config>, device: Device) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let out_dim = policy_config.get_out_dim();
        let varmap = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, policy_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            out_dim,
            policy,
            opt,
            min_log_std: config.min_log_std,
            max_log_std: config.max_log_std,
            action_scale: config.action_scale,
            epsilon: config.epsilon,
        })
    }

    /// Returns the mean and the clamped log standard deviation, both of shape
    /// `(batch_size, action_dimension)`.
    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.policy.forward(x)?;
        debug_assert_eq!(mean.dims()[1], self.out_dim);
        let log_std = log_std.clamp(self.min_log_std, self.max_log_std)?;
        Ok((mean, log_std))
    }

    /// Samples actions and returns them with their log probabilities.
    ///
    /// The shapes are `(batch_size, action_dimension)` and `(batch_size,)`.
    pub fn sample_logp(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.forward(obs)?;
        let z = Tensor::randn(0f32, 1f32, mean.dims(), &self.device)?;
        let u = ((log_std.exp()? * &z)? + &mean)?;
        let a = u.tanh()?;

        // Change of variables through tanh and the scaling
        let log_jacobian = (((1.0 - a.sqr()?)? + self.epsilon)?.log()? + self.action_scale.ln())?
            .sum(D::Minus1)?;
        let logp = (normal_logp(&z, &log_std)? - log_jacobian)?;

        Ok(((a * self.action_scale)?, logp))
    }

    /// Returns actions.
    ///
    /// If `deterministic` is `true`, the squashed mean of the distribution is returned.
    pub fn act(&self, obs: &Tensor, deterministic: bool) -> Result<Tensor> {
        match deterministic {
            true => {
                let (mean, _) = self.forward(obs)?;
                Ok((mean.tanh()? * self.action_scale)?)
            }
            false => Ok(self.sample_logp(obs)?.0),
        }
    }

    /// Takes an optimization step of the policy parameters.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the policy.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        info!("Save actor parameters to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        info!("Load actor parameters from {:?}", path.as_ref());
        Ok(())
    }
}
