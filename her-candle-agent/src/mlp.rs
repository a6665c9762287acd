//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Returns linear layers `in_dim -> units[0] -> ... -> units[n-1]`, followed by
/// a layer to `out_dim` if given.
fn create_linear_layers(
    prefix: &str,
    vs: VarBuilder,
    in_dim: usize,
    units: &[usize],
    out_dim: Option<usize>,
) -> Result<Vec<Linear>> {
    let mut dims = vec![in_dim];
    dims.extend_from_slice(units);
    if let Some(out_dim) = out_dim {
        dims.push(out_dim);
    }
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| Ok(linear(w[0], w[1], vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Applies the layers with ReLU between them.
///
/// If `relu_last` is `true`, ReLU is applied to the output of the last layer too.
fn mlp_forward(xs: Tensor, layers: &[Linear], relu_last: bool) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for (i, layer) in layers.iter().enumerate() {
        xs = layer.forward(&xs)?;
        if i + 1 < n_layers || relu_last {
            xs = xs.relu()?;
        }
    }

    Ok(xs)
}
