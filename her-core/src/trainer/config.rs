//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of epochs.
    pub epochs: usize,

    /// The number of cycles in an epoch.
    pub cycles: usize,

    /// The number of training episodes in a cycle.
    pub episodes: usize,

    /// Interval of test passes in epochs.
    pub test_interval: usize,

    /// The number of episodes of a test pass.
    pub test_episodes: usize,

    /// Interval of saving model parameters in epochs.
    pub save_interval: usize,

    /// Episodes are cut after this number of steps if given.
    pub max_episode_steps: Option<usize>,

    /// Relabel episodes before storing them.
    pub hindsight: bool,

    /// Where to save the trained model.
    pub model_dir: Option<String>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            cycles: 50,
            episodes: 16,
            test_interval: 1,
            test_episodes: 30,
            save_interval: 25,
            max_episode_steps: None,
            hindsight: true,
            model_dir: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of epochs.
    pub fn epochs(mut self, v: usize) -> Self {
        self.epochs = v;
        self
    }

    /// Sets the number of cycles in an epoch.
    pub fn cycles(mut self, v: usize) -> Self {
        self.cycles = v;
        self
    }

    /// Sets the number of episodes in a cycle.
    pub fn episodes(mut self, v: usize) -> Self {
        self.episodes = v;
        self
    }

    /// Sets the interval of test passes in epochs.
    pub fn test_interval(mut self, v: usize) -> Self {
        self.test_interval = v;
        self
    }

    /// Sets the number of test episodes.
    pub fn test_episodes(mut self, v: usize) -> Self {
        self.test_episodes = v;
        self
    }

    /// Sets the interval of saving in epochs.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the maximum length of episodes.
    pub fn max_episode_steps(mut self, v: Option<usize>) -> Self {
        self.max_episode_steps = v;
        self
    }

    /// Enables or disables hindsight relabeling.
    pub fn hindsight(mut self, v: bool) -> Self {
        self.hindsight = v;
        self
    }

    /// Sets the directory where model parameters are saved.
    pub fn model_dir<T: Into<String>>(mut self, model_dir: T) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .epochs(3)
            .max_episode_steps(Some(50))
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
