use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
///
/// As [`SubModel1`] it maps an observation to Q-values. As [`SubModel2`] it
/// concatenates an observation and an action and outputs a value estimate.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Result<Mlp> {
    let device = vs.device().clone();
    let layers = create_linear_layers(
        "mlp",
        vs,
        config.in_dim,
        &config.units,
        Some(config.out_dim),
    )?;

    Ok(Mlp {
        config,
        device,
        layers,
    })
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Result<Tensor>;

    fn forward(&self, xs: &Self::Input) -> Self::Output {
        let xs = xs.to_device(&self.device)?;
        mlp_forward(xs, &self.layers, self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Result<Tensor>;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        mlp_forward(input, &self.layers, self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vs, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp_shapes() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(5, vec![8, 8], 3, false);
        let mlp = <Mlp as SubModel1>::build(vb, config)?;
        assert_eq!(varmap.all_vars().len(), 6);

        let xs = Tensor::zeros((4, 5), DType::F32, &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs)?;
        assert_eq!(ys.dims(), &[4, 3]);

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let critic = <Mlp as SubModel2>::build(vb, MlpConfig::new(5, vec![], 1, false))?;
        let obs = Tensor::zeros((4, 3), DType::F32, &Device::Cpu)?;
        let act = Tensor::zeros((4, 2), DType::F32, &Device::Cpu)?;
        assert_eq!(SubModel2::forward(&critic, &obs, &act)?.dims(), &[4, 1]);
        Ok(())
    }
}
