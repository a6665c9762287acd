use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DqnModel`].
pub struct DqnModelConfig<Q>
where
    Q: OutDim,
{
    pub(crate) q_config: Option<Q>,
    pub(crate) opt_config: OptimizerConfig,
}

impl<Q> Default for DqnModelConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets output dimension of the model, i.e., the number of actions.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`DqnModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnModelConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value function with its own variables and optimizer.
pub struct DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim,
{
    varmap: VarMap,

    // Dimension of the output vector (equal to the number of actions).
    out_dim: usize,

    q: Q,
    opt: Optimizer,
}

impl<Q> DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`DqnModel`].
    pub fn build(config: DqnModelConfig<Q::Config>, device: Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let out_dim = q_config.get_out_dim();
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            out_dim,
            q,
            opt,
        })
    }

    /// Outputs the action values of shape `[batch_size, n_actions]`.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        let q = self.q.forward(obs)?;
        debug_assert_eq!(q.dims()[1], self.out_dim);
        Ok(q)
    }

    /// The number of actions.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Takes an optimization step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }
}
