use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{OutcomeClassifier, SoftmaxParams};
use crate::encoder::TeamEncoder;
use crate::persist;

pub const ARTIFACT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: u32,
    pub model_version: String,
    pub trained_at: String,
    /// Window the training features were built with; inference must reuse it.
    pub form_window: usize,
    pub encoder: TeamEncoder,
    pub params: SoftmaxParams,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no trained model {model_version:?} at {}; run the train binary first", path.display())]
    NotFound { model_version: String, path: PathBuf },

    #[error("model artifact {} is unreadable: {source}", path.display())]
    Corrupt { path: PathBuf, source: io::Error },

    #[error("model artifact {} has format {found}, expected {ARTIFACT_FORMAT}", path.display())]
    UnsupportedFormat { path: PathBuf, found: u32 },

    #[error("failed to write model artifact {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub trait ModelArtifactStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), ArtifactError>;
    fn load(&self, model_version: &str) -> Result<ModelArtifact, ArtifactError>;
}

/// One JSON file per model version under a directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, model_version: &str) -> PathBuf {
        let safe: String = model_version
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.model.json"))
    }
}

impl ModelArtifactStore for FileArtifactStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), ArtifactError> {
        let path = self.path_for(&artifact.model_version);
        persist::write_json_atomic(&path, artifact).map_err(|source| ArtifactError::Write { path, source })
    }

    fn load(&self, model_version: &str) -> Result<ModelArtifact, ArtifactError> {
        let path = self.path_for(model_version);
        let artifact = read_artifact(&path)?.ok_or_else(|| ArtifactError::NotFound {
            model_version: model_version.to_string(),
            path: path.clone(),
        })?;
        if artifact.format != ARTIFACT_FORMAT {
            return Err(ArtifactError::UnsupportedFormat {
                path,
                found: artifact.format,
            });
        }
        Ok(artifact)
    }
}

fn read_artifact(path: &Path) -> Result<Option<ModelArtifact>, ArtifactError> {
    persist::read_json::<ModelArtifact>(path).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

impl OutcomeClassifier {
    pub fn to_artifact(&self, model_version: &str, form_window: usize) -> ModelArtifact {
        ModelArtifact {
            format: ARTIFACT_FORMAT,
            model_version: model_version.to_string(),
            trained_at: Utc::now().to_rfc3339(),
            form_window,
            encoder: self.encoder().clone(),
            params: self.params().clone(),
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        OutcomeClassifier::from_parts(artifact.encoder, artifact.params)
    }
}
