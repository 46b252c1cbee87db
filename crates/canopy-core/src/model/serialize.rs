//! Model files: a bincode-encoded forest behind a format version.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::RandomForest;
use crate::error::{CanopyError, Result};

/// Bumped whenever the encoded layout of [`RandomForest`] changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    /// Must stay the first field: [`RandomForest::load`] peeks at it alone.
    format_version: u32,
    n_trees: usize,
    n_features: usize,
    classes: Vec<u8>,
    forest: RandomForest,
}

impl RandomForest {
    /// Write the model to `path`, replacing any existing file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: self.trees.len(),
            n_features: self.n_features,
            classes: self.classes.clone(),
            forest: self.clone(),
        };
        let bytes = bincode::serialize(&envelope).map_err(|source| CanopyError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| CanopyError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        info!(size_bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Read a model written by [`RandomForest::save`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CanopyError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decode_err = |source| CanopyError::DeserializeModel {
            path: path.to_path_buf(),
            source,
        };

        let found: u32 = bincode::deserialize(&bytes).map_err(decode_err)?;
        if found != FORMAT_VERSION {
            return Err(CanopyError::IncompatibleModelVersion {
                path: path.to_path_buf(),
                expected: FORMAT_VERSION,
                found,
            });
        }
        let envelope: ModelEnvelope = bincode::deserialize(&bytes).map_err(decode_err)?;
        debug!(
            n_trees = envelope.n_trees,
            n_features = envelope.n_features,
            classes = ?envelope.classes,
            "model loaded"
        );
        Ok(envelope.forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureMatrix, RandomForestConfig};

    fn small_forest() -> RandomForest {
        let mut x = FeatureMatrix::new(3);
        let mut y = Vec::new();
        for i in 0..12 {
            let v = i as f32;
            x.push_row(&[v, 2.0 * v, 100.0 - v]);
            y.push(if i < 6 { 1 } else { 2 });
        }
        let names = ["b1", "b2", "b3"].map(String::from).to_vec();
        RandomForestConfig::new(5).unwrap().fit(&x, &y, &names).unwrap()
    }

    #[test]
    fn save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rfc_model.bin");
        let forest = small_forest();
        forest.save(&path).unwrap();
        let loaded = RandomForest::load(&path).unwrap();
        assert_eq!(loaded, forest);
        assert_eq!(loaded.predict_row(&[1.0, 2.0, 99.0]), forest.predict_row(&[1.0, 2.0, 99.0]));
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RandomForest::load(dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, CanopyError::Open { .. }));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.bin");
        let mut bytes = bincode::serialize(&(FORMAT_VERSION + 1)).unwrap();
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(
            err,
            CanopyError::IncompatibleModelVersion { found, .. } if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn truncated_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bin");
        std::fs::write(&path, [1u8, 0]).unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, CanopyError::DeserializeModel { .. }));
    }
}
