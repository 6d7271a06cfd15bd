//! Directory-backed store of persisted models
//!
//! One JSON artifact per model family, named `<ModelName>.json`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{KeeperError, Result};
use crate::training::{ModelKind, PersistedModel};

const EXTENSION: &str = "json";

/// Model artifacts under a single directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Open a store rooted at `path`; the directory is created on first save
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact path of a model family
    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        self.root.join(format!("{}.{}", kind.name(), EXTENSION))
    }

    pub fn exists(&self, kind: ModelKind) -> bool {
        self.path_for(kind).is_file()
    }

    /// Persist a model, replacing any earlier artifact of its family
    pub fn save(&self, model: &PersistedModel) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| {
            KeeperError::PathError(format!(
                "Failed to create model directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let path = self.path_for(model.kind);
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), model).map_err(|e| {
            KeeperError::SerializationError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(model = %model.kind, path = %path.display(), "Saved model");
        Ok(path)
    }

    /// Load the artifact of a model family, `None` when it was never saved
    pub fn load(&self, kind: ModelKind) -> Result<Option<PersistedModel>> {
        let path = self.path_for(kind);
        if !path.is_file() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let model: PersistedModel = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            KeeperError::SerializationError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        if model.kind != kind {
            return Err(KeeperError::SerializationError(format!(
                "{} holds a {} model",
                path.display(),
                model.kind
            )));
        }

        debug!(model = %kind, path = %path.display(), "Loaded model");
        Ok(Some(model))
    }

    /// Model families with an artifact in the store, in roster order
    pub fn list(&self) -> Result<Vec<ModelKind>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut stems = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }

        Ok(ModelKind::ROSTER
            .into_iter()
            .filter(|kind| stems.iter().any(|s| s == kind.name()))
            .collect())
    }

    /// Delete every artifact whose family is not in `keep`; returns the
    /// deleted families
    pub fn retain(&self, keep: &[ModelKind]) -> Result<Vec<ModelKind>> {
        let mut removed = Vec::new();
        for kind in self.list()? {
            if keep.contains(&kind) {
                continue;
            }
            fs::remove_file(self.path_for(kind))?;
            removed.push(kind);
        }

        if !removed.is_empty() {
            info!(
                removed = ?removed.iter().map(|k| k.name()).collect::<Vec<_>>(),
                "Pruned model store"
            );
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::NetworkConfig;
    use ndarray::array;

    fn fitted(kind: ModelKind) -> PersistedModel {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = kind.build(1, Some(0), &NetworkConfig::default());
        model.fit(&x, &y).unwrap();
        PersistedModel::new(vec!["Age".to_string()], model)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));

        assert!(store.load(ModelKind::DecisionTreeClassifier).unwrap().is_none());

        let path = store.save(&fitted(ModelKind::DecisionTreeClassifier)).unwrap();
        assert!(path.ends_with("DecisionTreeClassifier.json"));

        let loaded = store.load(ModelKind::DecisionTreeClassifier).unwrap().unwrap();
        assert_eq!(loaded.feature_names, vec!["Age"]);
        assert_eq!(
            loaded.model.predict(&array![[0.5], [2.5]]).unwrap().to_vec(),
            vec![0.0, 1.0]
        );
    }

    #[test]
    fn test_retain_removes_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        for kind in [
            ModelKind::DecisionTreeClassifier,
            ModelKind::AdaBoostClassifier,
            ModelKind::BaggingClassifier,
        ] {
            store.save(&fitted(kind)).unwrap();
        }

        let removed = store
            .retain(&[ModelKind::AdaBoostClassifier, ModelKind::DecisionTreeClassifier])
            .unwrap();

        assert_eq!(removed, vec![ModelKind::BaggingClassifier]);
        assert_eq!(
            store.list().unwrap(),
            vec![ModelKind::AdaBoostClassifier, ModelKind::DecisionTreeClassifier]
        );
    }

    #[test]
    fn test_list_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }
}
