//! Utilities.
mod actor;
mod critic;
pub use actor::{GaussianActor, GaussianActorConfig};
pub use critic::{MultiCritic, MultiCriticConfig};

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarMap;
use her_core::{ContinuousAct, DiscreteAct, GoalObs, Normalizer};
use log::trace;
use serde::{Deserialize, Serialize};

/// Critic loss type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
///
/// With `tau >= 1` the variables of `src` are copied.
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    track_with_replace_substring(dest, src, tau, ("", ""))
}

/// Soft update of variables of which names differ in a substring.
///
/// The name of a variable in `src` is obtained by replacing `ss_dest` with `ss_src`
/// in the name of the corresponding variable in `dest`.
pub fn track_with_replace_substring(
    dest: &VarMap,
    src: &VarMap,
    tau: f64,
    (ss_src, ss_dest): (&str, &str),
) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("src");
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let k_src = match ss_dest.is_empty() {
            true => k_dest.clone(),
            false => k_dest.replace(ss_dest, ss_src),
        };
        let v_src = src
            .get(&k_src)
            .ok_or_else(|| anyhow!("Variable {} not found in the source", k_src))?;
        let t_src = v_src.as_tensor();
        if tau >= 1.0 {
            v_dest.set(t_src)?;
        } else {
            let t_dest = ((tau * t_src)? + (1.0 - tau) * v_dest.as_tensor())?;
            v_dest.set(&t_dest)?;
        }
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

fn smooth_l1(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(d.dtype())?;
    let m2 = (1.0 - &m1)?;
    let quad = ((0.5 * m1)? * d.sqr()?)?;
    let lin = (m2 * (d - 0.5)?)?;
    Ok((quad + lin)?)
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Ok(smooth_l1(x, y)?.mean_all()?)
}

/// Smooth L1 loss with per-sample weights.
pub fn weighted_smooth_l1_loss(x: &Tensor, y: &Tensor, w: &Tensor) -> Result<Tensor> {
    Ok((smooth_l1(x, y)? * w)?.mean_all()?)
}

/// Mean squared error with per-sample weights.
pub fn weighted_mse(x: &Tensor, y: &Tensor, w: &Tensor) -> Result<Tensor> {
    Ok(((x - y)?.sqr()? * w)?.mean_all()?)
}

/// Critic loss, weighted if importance sampling weights are given.
pub fn critic_loss(
    loss: &CriticLoss,
    pred: &Tensor,
    tgt: &Tensor,
    weight: Option<&Tensor>,
) -> Result<Tensor> {
    match (loss, weight) {
        (CriticLoss::Mse, None) => Ok(candle_nn::loss::mse(pred, tgt)?),
        (CriticLoss::Mse, Some(w)) => weighted_mse(pred, tgt, w),
        (CriticLoss::SmoothL1, None) => smooth_l1_loss(pred, tgt),
        (CriticLoss::SmoothL1, Some(w)) => weighted_smooth_l1_loss(pred, tgt, w),
    }
}

/// Clamps bootstrapped targets into `[min, max]`.
pub fn clamp_target(t: Tensor, range: Option<(f64, f64)>) -> Result<Tensor> {
    match range {
        None => Ok(t),
        Some((min, max)) => Ok(t.clamp(min, max)?),
    }
}

/// Componentwise minimum of tensors of the same shape.
pub fn twin_min(qs: &[Tensor]) -> Result<Tensor> {
    if qs.is_empty() {
        return Err(anyhow!("No tensor is given"));
    }
    Ok(Tensor::stack(qs, 0)?.min(0)?)
}

/// Absolute differences of two tensors of shape `[batch_size]`.
pub fn abs_td_err(pred: &Tensor, tgt: &Tensor) -> Result<Vec<f32>> {
    Ok((pred - tgt)?.abs()?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
}

/// Scales rows of network inputs and returns a tensor of shape `[n_rows, dim]`.
pub fn input_tensor(rows: &[Vec<f32>], normalizer: &Normalizer, device: &Device) -> Result<Tensor> {
    let n_rows = rows.len();
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let data = normalizer.scale_batch(rows)?;
    Ok(Tensor::from_vec(data, (n_rows, dim), device)?)
}

/// Scales the network input of an observation, a tensor of shape `[1, dim]`.
pub fn obs_tensor(obs: &GoalObs, normalizer: &Normalizer, device: &Device) -> Result<Tensor> {
    let x = normalizer.scale(&obs.input())?;
    let dim = x.len();
    Ok(Tensor::from_vec(x, (1, dim), device)?)
}

/// Action indices as a tensor of shape `[batch_size, 1]`, used for gathering Q-values.
pub fn discrete_act_tensor(act: &[DiscreteAct], device: &Device) -> Result<Tensor> {
    let n = act.len();
    let data = act.iter().map(|a| a.0 as u32).collect::<Vec<_>>();
    Ok(Tensor::from_vec(data, (n, 1), device)?)
}

/// Action vectors as a tensor of shape `[batch_size, act_dim]`.
pub fn continuous_act_tensor(act: &[ContinuousAct], device: &Device) -> Result<Tensor> {
    let n = act.len();
    let dim = act.first().map(|a| a.0.len()).unwrap_or(0);
    let data = act.iter().flat_map(|a| a.0.iter().copied()).collect::<Vec<_>>();
    Ok(Tensor::from_vec(data, (n, dim), device)?)
}

/// A vector as a tensor of shape `[len]`.
pub fn vec_tensor(v: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(v, (v.len(),), device)?)
}

/// `1 - is_terminated` as a tensor of shape `[batch_size]`.
///
/// Truncated transitions are bootstrapped.
pub fn not_terminated(is_terminated: &[i8], device: &Device) -> Result<Tensor> {
    let v = is_terminated
        .iter()
        .map(|&t| (1 - t) as f32)
        .collect::<Vec<_>>();
    vec_tensor(&v, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;

    fn varmap_with(v: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((v.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(v, (v.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    fn var1(vm: &VarMap) -> Vec<f32> {
        vm.data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn test_track() -> Result<()> {
        let vm_src = varmap_with(&[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with(&[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, 0.5)?;
        let v = var1(&vm_dest);
        for (a, b) in v.iter().zip([2.5f32, 3.5, 4.5].iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_track_hard_copy_and_frozen() -> Result<()> {
        let vm_src = varmap_with(&[0.1, -0.7, 3.3])?;
        let vm_dest = varmap_with(&[4.0, 5.0, 6.0])?;

        track(&vm_dest, &vm_src, 0.0)?;
        assert_eq!(var1(&vm_dest), vec![4.0, 5.0, 6.0]);

        track(&vm_dest, &vm_src, 1.0)?;
        assert_eq!(var1(&vm_dest), var1(&vm_src));
        Ok(())
    }

    #[test]
    fn test_track_missing_variable() -> Result<()> {
        let vm_src = VarMap::new();
        let vm_dest = varmap_with(&[4.0])?;
        assert!(track(&vm_dest, &vm_src, 0.5).is_err());
        Ok(())
    }

    #[test]
    fn test_smooth_l1_loss() -> Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 0.0, 0.0], (3,), &Device::Cpu)?;
        let y = Tensor::from_slice(&[0.5f32, 2.0, -3.0], (3,), &Device::Cpu)?;
        let loss = smooth_l1_loss(&x, &y)?.to_scalar::<f32>()?;
        let expected = (0.125 + 1.5 + 2.5) / 3.0;
        assert!((loss - expected).abs() < 1e-6);

        let w = Tensor::from_slice(&[1.0f32, 0.0, 0.0], (3,), &Device::Cpu)?;
        let loss = weighted_smooth_l1_loss(&x, &y, &w)?.to_scalar::<f32>()?;
        assert!((loss - 0.125 / 3.0).abs() < 1e-6);

        let loss = weighted_mse(&x, &y, &w)?.to_scalar::<f32>()?;
        assert!((loss - 0.25 / 3.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_twin_min_and_clamp() -> Result<()> {
        let q1 = Tensor::from_slice(&[1.0f32, -2.0, 7.0], (3,), &Device::Cpu)?;
        let q2 = Tensor::from_slice(&[3.0f32, -5.0, 6.0], (3,), &Device::Cpu)?;
        let q = twin_min(&[q1, q2])?;
        assert_eq!(q.to_vec1::<f32>()?, vec![1.0, -5.0, 6.0]);

        let q = clamp_target(q, Some((0.0, 5.0)))?;
        assert_eq!(q.to_vec1::<f32>()?, vec![1.0, 0.0, 5.0]);
        assert!(twin_min(&[]).is_err());
        Ok(())
    }

    #[test]
    fn test_input_tensor() -> Result<()> {
        let normalizer = Normalizer::build(&her_core::NormalizerConfig::min_max(
            vec![0.0, 0.0],
            vec![2.0, 4.0],
        ))?;
        let rows = vec![vec![1.0, 1.0], vec![2.0, 4.0]];
        let t = input_tensor(&rows, &normalizer, &Device::Cpu)?;
        assert_eq!(t.to_vec2::<f32>()?, vec![vec![0.5, 0.25], vec![1.0, 1.0]]);

        let act = discrete_act_tensor(&[DiscreteAct(2), DiscreteAct(0)], &Device::Cpu)?;
        assert_eq!(act.dims(), &[2, 1]);
        assert_eq!(not_terminated(&[0, 1], &Device::Cpu)?.to_vec1::<f32>()?, vec![1.0, 0.0]);
        Ok(())
    }
}
