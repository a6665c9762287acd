//! Critics for agents with continuous action.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::{track_with_replace_substring, twin_min},
};
use anyhow::{Context, Result};
use candle_core::{DType::F32, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`MultiCritic`].
pub struct MultiCriticConfig<Q> {
    /// The number of critic networks.
    pub n_nets: usize,

    /// Configuration of critic networks.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Soft update coefficient.
    pub tau: f64,
}

impl<Q> Default for MultiCriticConfig<Q> {
    fn default() -> Self {
        Self {
            n_nets: 2,
            q_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            tau: 0.005,
        }
    }
}

impl<Q> MultiCriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets the number of critic networks.
    pub fn n_nets(mut self, v: usize) -> Self {
        self.n_nets = v;
        self
    }

    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets soft update parameter tau.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Constructs [`MultiCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MultiCriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Critics for agents with continuous action.
///
/// It takes observations and actions as inputs and outputs action values.
/// Each critic has a target network. The targets live in their own [`VarMap`]
/// and are hard copies of the critics right after [`MultiCritic::build`].
pub struct MultiCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize,
{
    tau: f64,
    varmap: VarMap,
    varmap_tgt: VarMap,
    qs: Vec<Q>,
    qs_tgt: Vec<Q>,

    // Shared by all critics; targets are never optimized.
    opt: Optimizer,
}

impl<Q> MultiCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`MultiCritic`].
    pub fn build(config: MultiCriticConfig<Q::Config>, device: Device) -> Result<MultiCritic<Q>> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let (varmap, qs) = Self::build_critic_networks(&q_config, &device, config.n_nets, "critic")?;
        let (varmap_tgt, qs_tgt) =
            Self::build_critic_networks(&q_config, &device, config.n_nets, "critic_tgt")?;
        let opt = config.opt_config.build(varmap.all_vars())?;
        track_with_replace_substring(&varmap_tgt, &varmap, 1.0, ("critic", "critic_tgt"))?;

        Ok(Self {
            tau: config.tau,
            varmap,
            varmap_tgt,
            qs,
            qs_tgt,
            opt,
        })
    }

    fn build_critic_networks(
        q_config: &Q::Config,
        device: &Device,
        n_nets: usize,
        prefix: &str,
    ) -> Result<(VarMap, Vec<Q>)> {
        let varmap = VarMap::new();
        let qs = (0..n_nets)
            .map(|ix| {
                let vb = VarBuilder::from_varmap(&varmap, F32, device)
                    .set_prefix(format!("{}{}", prefix, ix));
                Q::build(vb, q_config.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((varmap, qs))
    }
}

impl<Q> MultiCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Result<Tensor>>,
    Q::Config: DeserializeOwned + Serialize,
{
    /// Soft update of the target networks.
    pub fn soft_update(&mut self) -> Result<()> {
        track_with_replace_substring(
            &self.varmap_tgt,
            &self.varmap,
            self.tau,
            ("critic", "critic_tgt"),
        )
    }

    fn forward_all(qs: &[Q], obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        qs.iter()
            .map(|critic| Ok(critic.forward(obs, act)?.squeeze(D::Minus1)?))
            .collect()
    }

    /// Returns action values of all critics, each of shape `[batch_size]`.
    pub fn qvals(&self, obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        Self::forward_all(&self.qs, obs, act)
    }

    /// Returns the minimum of action values over critics.
    pub fn qvals_min(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        twin_min(&self.qvals(obs, act)?)
    }

    /// Returns the minimum of action values over target critics.
    pub fn qvals_min_tgt(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        twin_min(&Self::forward_all(&self.qs_tgt, obs, act)?)
    }

    /// Backward step for all variables in critic networks.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Variables of the critics.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Variables of the target critics.
    pub fn varmap_tgt(&self) -> &VarMap {
        &self.varmap_tgt
    }

    /// Saves the critics and the target critics to separate files.
    pub fn save(&self, path: impl AsRef<Path>, path_tgt: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        info!("Save critics to {:?}", path.as_ref());
        self.varmap_tgt.save(path_tgt.as_ref())?;
        info!("Save target critics to {:?}", path_tgt.as_ref());
        Ok(())
    }

    /// Loads the critics and the target critics.
    pub fn load(&mut self, path: impl AsRef<Path>, path_tgt: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        info!("Load critics from {:?}", path.as_ref());
        self.varmap_tgt.load(path_tgt.as_ref())?;
        info!("Load target critics from {:?}", path_tgt.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use tempdir::TempDir;

    fn critic() -> Result<MultiCritic<Mlp>> {
        let config = MultiCriticConfig::default().q_config(MlpConfig::new(3, vec![8], 1, false));
        MultiCritic::build(config, Device::Cpu)
    }

    fn flat(varmap: &VarMap, key: &str) -> Vec<f32> {
        varmap.data().lock().unwrap()[key]
            .as_tensor()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn test_targets_are_copies() -> Result<()> {
        let critic = critic()?;
        for ix in 0..2 {
            for name in ["mlp.ln0.weight", "mlp.ln1.bias"].iter() {
                let k = format!("critic{}.{}", ix, name);
                let k_tgt = format!("critic_tgt{}.{}", ix, name);
                assert_eq!(flat(critic.varmap(), &k), flat(critic.varmap_tgt(), &k_tgt));
            }
        }

        let obs = Tensor::randn(0f32, 1f32, (5, 2), &Device::Cpu)?;
        let act = Tensor::randn(0f32, 1f32, (5, 1), &Device::Cpu)?;
        let qs = critic.qvals(&obs, &act)?;
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].dims(), &[5]);

        let q_min = critic.qvals_min(&obs, &act)?.to_vec1::<f32>()?;
        let q_min_tgt = critic.qvals_min_tgt(&obs, &act)?.to_vec1::<f32>()?;
        assert_eq!(q_min, q_min_tgt);
        let (q0, q1) = (qs[0].to_vec1::<f32>()?, qs[1].to_vec1::<f32>()?);
        for i in 0..5 {
            assert_eq!(q_min[i], q0[i].min(q1[i]));
        }
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let tmp_dir = TempDir::new("critic")?;
        let path = tmp_dir.path().join("critic.pt");
        let path_tgt = tmp_dir.path().join("critic_tgt.pt");
        let critic1 = critic()?;
        critic1.save(&path, &path_tgt)?;

        let mut critic2 = critic()?;
        critic2.load(&path, &path_tgt)?;
        let k = "critic_tgt1.mlp.ln0.weight";
        assert_eq!(flat(critic1.varmap_tgt(), k), flat(critic2.varmap_tgt(), k));
        assert!(critic2.load(tmp_dir.path().join("none.pt"), &path_tgt).is_err());
        Ok(())
    }
}
