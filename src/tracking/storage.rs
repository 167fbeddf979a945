//! Storage Backend for Experiment Tracking
//!
//! Persists experiments and run artifacts on the local file system.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SelectError};
use super::tracker::Experiment;

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Save experiments to storage
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    /// Load experiments from storage
    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Write one artifact file, returning where it landed
    fn write_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        artifact_path: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<String>;
}

/// Local file system storage backend
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiments_file(&self) -> PathBuf {
        self.base_dir.join("experiments.json")
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.base_dir.join(experiment_id)
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;

        let json = serde_json::to_vec_pretty(experiments)?;
        fs::write(self.experiments_file(), json)?;

        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let file_path = self.experiments_file();

        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read(&file_path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    fn write_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        artifact_path: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<String> {
        if artifact_path.split('/').any(|part| part == "..") {
            return Err(SelectError::TrackingError(format!(
                "artifact path '{}' escapes the run directory",
                artifact_path
            )));
        }

        let dir = self
            .experiment_dir(experiment_id)
            .join(run_id)
            .join("artifacts")
            .join(artifact_path);
        fs::create_dir_all(&dir)?;

        let target = dir.join(file_name);
        fs::write(&target, contents)?;

        Ok(target.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_storage_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let mut exp = Experiment::new("Test Experiment");
        exp.tags.insert("env".to_string(), "test".to_string());
        let id = exp.experiment_id.clone();

        storage.save_experiments(&[exp]).unwrap();
        assert!(storage.experiments_file().exists());

        let loaded = storage.load_experiments().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].experiment_id, id);
        assert_eq!(loaded[0].tags.get("env").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_load_without_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("fresh"));
        assert!(storage.load_experiments().unwrap().is_empty());
    }

    #[test]
    fn test_write_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let written = storage
            .write_artifact("exp", "run", "best_model", "model.json", b"{}")
            .unwrap();
        assert!(written.ends_with("model.json"));
        assert_eq!(fs::read(&written).unwrap(), b"{}");

        assert!(storage
            .write_artifact("exp", "run", "../escape", "x", b"")
            .is_err());
    }
}
