use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierError, OnnxFeatureExtractor};
use crate::config::ModelSettings;
use crate::runtime::RuntimeConfig;

/// File name of the embedding model inside a models directory
pub const MODEL_FILE_NAME: &str = "model.onnx";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl From<ModelError> for ClassifierError {
    fn from(err: ModelError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

/// Locates and verifies the embedding model artifact on the local filesystem.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_models_dir())
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("TEACHABLE_MODEL_DIR") {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // 2. Use the platform-specific data directory when a model was installed there
        if let Some(data_dir) = dirs::data_dir() {
            let candidate = data_dir.join("teachable").join("model");
            if candidate.join(MODEL_FILE_NAME).exists() {
                return candidate;
            }
        }

        // 3. Fall back to the working directory, next to the page assets
        PathBuf::from("model")
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self) -> PathBuf {
        self.models_dir.join(MODEL_FILE_NAME)
    }

    /// An explicit path wins over the managed location.
    pub fn resolve(&self, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self.get_model_path(),
        }
    }

    pub fn is_model_available(&self) -> bool {
        let model_path = self.get_model_path();
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        model_path.exists()
    }

    /// Hashes `path` and compares it with `expected_hash` (lowercase hex).
    pub fn verify_artifact(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let actual = Self::hash_file(path)?;
        log::info!("Calculated hash: {}", actual);
        log::info!("Expected hash:   {}", expected_hash);
        Ok(actual.eq_ignore_ascii_case(expected_hash.trim()))
    }

    /// Fails when the artifact is missing or, if a hash is given, does not match it.
    pub fn ensure_verified(&self, path: &Path, expected_hash: Option<&str>) -> Result<(), ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        if let Some(expected) = expected_hash {
            let actual = Self::hash_file(path)?;
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                log::error!("Model hash mismatch: expected {}, got {}", expected, actual);
                return Err(ModelError::HashMismatch {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            log::info!("Model artifact verified successfully");
        }
        Ok(())
    }

    /// Resolves, verifies and loads the embedding model described by `settings`.
    pub fn load_extractor(
        &self,
        settings: &ModelSettings,
        runtime: &RuntimeConfig,
    ) -> Result<OnnxFeatureExtractor, ClassifierError> {
        let path = self.resolve(settings.path.as_deref());
        log::info!("Loading embedding model from {:?}", path);
        self.ensure_verified(&path, settings.sha256.as_deref())?;
        OnnxFeatureExtractor::load_with_settings(&path, settings, runtime)
    }

    fn hash_file(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn test_verify_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path());
        let path = manager.get_model_path();
        fs::write(&path, b"weights").unwrap();

        assert!(manager.is_model_available());
        assert!(manager.verify_artifact(&path, &hash_of(b"weights")).unwrap());
        assert!(manager.verify_artifact(&path, &hash_of(b"weights").to_uppercase()).unwrap());

        // Corrupt file and verify
        fs::write(&path, b"corrupted data").unwrap();
        assert!(!manager.verify_artifact(&path, &hash_of(b"weights")).unwrap());
        assert!(matches!(
            manager.ensure_verified(&path, Some(&hash_of(b"weights"))),
            Err(ModelError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path().join("absent"));
        assert!(!manager.is_model_available());
        assert!(matches!(
            manager.ensure_verified(&manager.get_model_path(), None),
            Err(ModelError::NotFound(_))
        ));

        let err = manager
            .load_extractor(&ModelSettings::default(), &RuntimeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelError(_)));
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let manager = ModelManager::new("/opt/models");
        assert_eq!(manager.resolve(None), PathBuf::from("/opt/models/model.onnx"));
        assert_eq!(
            manager.resolve(Some(Path::new("custom.onnx"))),
            PathBuf::from("custom.onnx")
        );
    }

    #[test]
    fn test_default_models_dir() {
        // Test with environment variable
        env::set_var("TEACHABLE_MODEL_DIR", "/tmp/test-teachable");
        let path = ModelManager::get_default_models_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-teachable"));
        env::remove_var("TEACHABLE_MODEL_DIR");
    }
}
