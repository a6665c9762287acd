//! Utilities.
use crate::error::HerError;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Path of the parameter file of a role of an agent, e.g., `qnet_tgt_epoch25.pt`.
pub fn ckpt_path(dir: impl AsRef<Path>, role: &str, epoch: usize) -> PathBuf {
    dir.as_ref().join(format!("{}_epoch{}.pt", role, epoch))
}

/// Path of the normalizer statistics saved with the parameters of an epoch.
pub fn normalizer_path(dir: impl AsRef<Path>, epoch: usize) -> PathBuf {
    dir.as_ref().join(format!("normalizer_epoch{}.yaml", epoch))
}

/// Checks that the parameter files of all roles exist for the given epoch.
///
/// Returns the paths in the order of `roles`.
pub fn ensure_ckpt_files(dir: impl AsRef<Path>, roles: &[&str], epoch: usize) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(roles.len() + 1);
    for role in roles.iter() {
        let path = ckpt_path(&dir, role, epoch);
        if !path.is_file() {
            return Err(HerError::CheckpointNotFound(path).into());
        }
        paths.push(path);
    }
    let path = normalizer_path(&dir, epoch);
    if !path.is_file() {
        return Err(HerError::CheckpointNotFound(path).into());
    }
    Ok(paths)
}
