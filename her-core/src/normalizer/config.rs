//! Configuration of [`Normalizer`](super::Normalizer).
use crate::error::HerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Normalizer`](super::Normalizer).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum NormalizerConfig {
    /// Inputs are passed through.
    Identity,

    /// Running mean and standard deviation.
    MeanStd {
        /// Dimension of feature vectors.
        dim: usize,

        /// Floor of the variance.
        eps: f32,

        /// Scaled values are clipped into `[-clip, clip]` if given.
        clip: Option<f32>,
    },

    /// Fixed bounds of features, used for grid-world tasks.
    MinMax {
        /// Lower bounds.
        min: Vec<f32>,

        /// Upper bounds.
        max: Vec<f32>,

        /// Floor of `max - min`.
        eps: f32,
    },
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self::Identity
    }
}

impl NormalizerConfig {
    /// Mean-std normalizer of the given dimension.
    pub fn mean_std(dim: usize) -> Self {
        Self::MeanStd {
            dim,
            eps: 1e-8,
            clip: None,
        }
    }

    /// Min-max normalizer with the given bounds.
    pub fn min_max(min: Vec<f32>, max: Vec<f32>) -> Self {
        Self::MinMax { min, max, eps: 1e-8 }
    }

    /// Sets the epsilon. Ignored for [`NormalizerConfig::Identity`].
    pub fn eps(mut self, v: f32) -> Self {
        match &mut self {
            Self::MeanStd { eps, .. } | Self::MinMax { eps, .. } => *eps = v,
            Self::Identity => {}
        }
        self
    }

    /// Sets the clipping range of the mean-std normalizer.
    pub fn clip(mut self, v: Option<f32>) -> Self {
        if let Self::MeanStd { clip, .. } = &mut self {
            *clip = v;
        }
        self
    }

    /// Dimension of feature vectors.
    pub fn dim(&self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::MeanStd { dim, .. } => Some(*dim),
            Self::MinMax { min, .. } => Some(min.len()),
        }
    }

    pub(super) fn check(&self) -> Result<(), HerError> {
        match self {
            Self::MinMax { min, max, .. } if min.len() != max.len() => {
                Err(HerError::DimensionMismatch {
                    expected: min.len(),
                    actual: max.len(),
                })
            }
            Self::MeanStd { eps, .. } | Self::MinMax { eps, .. } if *eps <= 0.0 => Err(
                HerError::InvalidConfig(format!("eps must be positive, got {}", eps)),
            ),
            _ => Ok(()),
        }
    }

    /// Constructs [`NormalizerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`NormalizerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
