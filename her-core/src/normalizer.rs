//! Input normalizer.
//!
//! Raw feature vectors are accumulated with [`Normalizer::store_history`] while
//! an episode runs. [`Normalizer::update_mean`] folds them into the running
//! statistics at episode boundaries, so the statistics used by
//! [`Normalizer::scale`] never change during action selection.
mod config;
pub use config::NormalizerConfig;

use crate::error::HerError;
use anyhow::Result;
use log::trace;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Running statistics of the mean-std normalizer.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RunningStats {
    count: f64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningStats {
    fn new(dim: usize) -> Self {
        Self {
            count: 0.0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    /// Chan's parallel merge of a batch of samples into the statistics.
    fn merge(&mut self, batch: &[Vec<f32>]) {
        let dim = self.mean.len();
        let n_b = batch.len() as f64;
        if n_b == 0.0 {
            return;
        }

        let mut mean_b = vec![0f64; dim];
        for x in batch.iter() {
            for (m, &v) in mean_b.iter_mut().zip(x.iter()) {
                *m += v as f64;
            }
        }
        mean_b.iter_mut().for_each(|m| *m /= n_b);

        let mut m2_b = vec![0f64; dim];
        for x in batch.iter() {
            for i in 0..dim {
                let d = x[i] as f64 - mean_b[i];
                m2_b[i] += d * d;
            }
        }

        let n_a = self.count;
        let n = n_a + n_b;
        for i in 0..dim {
            let delta = mean_b[i] - self.mean[i];
            self.mean[i] += delta * n_b / n;
            self.m2[i] += m2_b[i] + delta * delta * n_a * n_b / n;
        }
        self.count = n;
    }

    /// Number of samples folded into the statistics.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Mean per dimension.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Population variance per dimension; ones before any sample is seen.
    pub fn var(&self) -> Vec<f64> {
        if self.count == 0.0 {
            vec![1.0; self.mean.len()]
        } else {
            self.m2.iter().map(|m2| m2 / self.count).collect()
        }
    }
}

/// Serialized state of a normalizer.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct NormalizerState {
    config: NormalizerConfig,
    stats: Option<RunningStats>,
}

/// Normalizes network inputs.
#[derive(Clone, Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    stats: Option<RunningStats>,
    history: Vec<Vec<f32>>,
}

impl Normalizer {
    /// Builds a normalizer.
    pub fn build(config: &NormalizerConfig) -> Result<Self> {
        config.check()?;
        let stats = match config {
            NormalizerConfig::MeanStd { dim, .. } => Some(RunningStats::new(*dim)),
            _ => None,
        };
        Ok(Self {
            config: config.clone(),
            stats,
            history: vec![],
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Running statistics, available for the mean-std variant.
    pub fn stats(&self) -> Option<&RunningStats> {
        self.stats.as_ref()
    }

    /// Dimension of feature vectors, `None` for the identity.
    pub fn dim(&self) -> Option<usize> {
        self.config.dim()
    }

    fn check_dim(&self, len: usize) -> Result<(), HerError> {
        match self.dim() {
            Some(expected) if expected != len => Err(HerError::DimensionMismatch {
                expected,
                actual: len,
            }),
            _ => Ok(()),
        }
    }

    /// Accumulates a raw feature vector.
    ///
    /// The statistics are not changed until [`Normalizer::update_mean`] is called.
    pub fn store_history(&mut self, x: &[f32]) -> Result<()> {
        if self.stats.is_none() {
            return Ok(());
        }
        self.check_dim(x.len())?;
        self.history.push(x.to_vec());
        Ok(())
    }

    /// Number of feature vectors waiting for the next [`Normalizer::update_mean`].
    pub fn n_history(&self) -> usize {
        self.history.len()
    }

    /// Folds the accumulated history into the running statistics.
    pub fn update_mean(&mut self) {
        if let Some(stats) = self.stats.as_mut() {
            stats.merge(&self.history);
            trace!("Normalizer updated with {} samples", self.history.len());
        }
        self.history.clear();
    }

    /// Scales a feature vector.
    pub fn scale(&self, x: &[f32]) -> Result<Vec<f32>> {
        self.check_dim(x.len())?;
        let y = match &self.config {
            NormalizerConfig::Identity => x.to_vec(),
            NormalizerConfig::MeanStd { eps, clip, .. } => {
                // Built together with the config variant.
                let stats = match self.stats.as_ref() {
                    Some(stats) => stats,
                    None => return Ok(x.to_vec()),
                };
                let var = stats.var();
                x.iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let std = var[i].max(*eps as f64).sqrt();
                        let y = ((v as f64 - stats.mean[i]) / std) as f32;
                        match clip {
                            Some(c) => y.clamp(-c, *c),
                            None => y,
                        }
                    })
                    .collect()
            }
            NormalizerConfig::MinMax { min, max, eps } => x
                .iter()
                .zip(min.iter().zip(max.iter()))
                .map(|(&v, (&lo, &hi))| (v - lo) / (hi - lo).max(*eps))
                .collect(),
        };
        Ok(y)
    }

    /// Scales rows of feature vectors and returns them flattened.
    pub fn scale_batch(&self, rows: &[Vec<f32>]) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(rows.iter().map(|r| r.len()).sum());
        for row in rows.iter() {
            out.extend(self.scale(row)?);
        }
        Ok(out)
    }

    /// Saves the configuration and statistics as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = NormalizerState {
            config: self.config.clone(),
            stats: self.stats.clone(),
        };
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&state)?.as_bytes())?;
        Ok(())
    }

    /// Loads the configuration and statistics saved with [`Normalizer::save`].
    ///
    /// Pending history is discarded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let state: NormalizerState = serde_yaml::from_reader(rdr)?;
        self.config = state.config;
        self.stats = state.stats;
        self.history.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_statistics_frozen_until_update() -> Result<()> {
        let mut norm = Normalizer::build(&NormalizerConfig::mean_std(2))?;
        norm.store_history(&[1.0, 10.0])?;
        norm.store_history(&[3.0, 10.0])?;

        // No update yet: mean 0, var 1.
        assert_eq!(norm.scale(&[2.0, 10.0])?, vec![2.0, 10.0]);

        norm.update_mean();
        assert_eq!(norm.n_history(), 0);
        let y = norm.scale(&[2.0, 10.0])?;
        assert!(y[0].abs() < 1e-6);
        assert!(y[1].abs() < 1e-6);

        let y = norm.scale(&[3.0, 10.0])?;
        assert!((y[0] - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_zero_variance_floor() -> Result<()> {
        let config = NormalizerConfig::mean_std(1).eps(0.01);
        let mut norm = Normalizer::build(&config)?;
        for _ in 0..5 {
            norm.store_history(&[4.0])?;
        }
        norm.update_mean();
        let y = norm.scale(&[5.0])?;
        assert!(y[0].is_finite());
        assert!((y[0] - 10.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_merge_matches_batch_statistics() -> Result<()> {
        let mut norm = Normalizer::build(&NormalizerConfig::mean_std(1))?;
        for x in [1.0, 2.0] {
            norm.store_history(&[x])?;
        }
        norm.update_mean();
        for x in [3.0, 4.0, 5.0] {
            norm.store_history(&[x])?;
        }
        norm.update_mean();

        let stats = norm.stats().unwrap();
        assert_eq!(stats.count(), 5.0);
        assert!((stats.mean()[0] - 3.0).abs() < 1e-12);
        assert!((stats.var()[0] - 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_clip_and_min_max() -> Result<()> {
        let mut norm = Normalizer::build(&NormalizerConfig::mean_std(1).clip(Some(1.0)))?;
        norm.store_history(&[0.0])?;
        norm.store_history(&[2.0])?;
        norm.update_mean();
        assert_eq!(norm.scale(&[100.0])?, vec![1.0]);

        let norm = Normalizer::build(&NormalizerConfig::min_max(vec![0.0, 1.0], vec![10.0, 1.0]))?;
        let y = norm.scale(&[5.0, 1.0])?;
        assert_eq!(y[0], 0.5);
        assert!(y[1].is_finite());
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> Result<()> {
        let mut norm = Normalizer::build(&NormalizerConfig::mean_std(3))?;
        let err = norm.store_history(&[1.0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HerError>(),
            Some(HerError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(norm.scale(&[1.0, 2.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let tmp_dir = TempDir::new("normalizer")?;
        let path = tmp_dir.path().join("normalizer.yaml");

        let mut norm = Normalizer::build(&NormalizerConfig::mean_std(2))?;
        norm.store_history(&[1.0, -1.0])?;
        norm.store_history(&[2.0, -3.0])?;
        norm.update_mean();
        norm.save(&path)?;

        let mut norm2 = Normalizer::build(&NormalizerConfig::mean_std(2))?;
        norm2.load(&path)?;
        assert_eq!(norm.stats(), norm2.stats());
        assert_eq!(norm.scale(&[0.5, 0.5])?, norm2.scale(&[0.5, 0.5])?);
        Ok(())
    }
}
