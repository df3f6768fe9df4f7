use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use error_stack::ResultExt;
use log::{debug, info, warn};

use crate::dataset::GriddedDataset;
use crate::units::PressureUnit;
use crate::utils::is_existing_dir;

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("No models are loaded")]
    Empty,
    #[error("Ambiguous task: {0} models are loaded. Please provide a tag.")]
    AmbiguousTag(usize),
    #[error("No model with tag '{0}' is loaded")]
    UnknownTag(String),
    #[error("Model '{0}' is not a valid GCM dataset")]
    InvalidDataset(String),
    #[error("Could not read a dataset from {}", .0.display())]
    ReadError(PathBuf),
    #[error("Could not write model '{0}'")]
    WriteError(String),
    #[error("Destination directory {} does not exist", .0.display())]
    DestinationMissing(PathBuf),
    #[error("Could not search for datasets with pattern '{0}'")]
    GlobError(String),
}

/// A set of GCM datasets identified by tag, all sharing the same pressure unit.
#[derive(Debug, Clone)]
pub struct DatasetCollection {
    models: BTreeMap<String, GriddedDataset>,
    p_unit: PressureUnit,
    n_added: usize,
}

impl DatasetCollection {
    pub fn new(p_unit: PressureUnit) -> Self {
        Self { models: BTreeMap::new(), p_unit, n_added: 0 }
    }

    pub fn p_unit(&self) -> PressureUnit {
        self.p_unit
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|k| k.as_str())
    }

    pub fn get_model(&self, tag: &str) -> Option<&GriddedDataset> {
        self.models.get(tag)
    }

    /// Add a dataset to the collection and return the tag it is stored under.
    ///
    /// Without a tag, the model is numbered by how many models have been added so far.
    /// The dataset's pressures are converted to the collection's unit, and its
    /// `tag` attribute is overwritten with the tag it is stored under.
    pub fn add(&mut self, mut ds: GriddedDataset, tag: Option<&str>) -> error_stack::Result<String, CollectionError> {
        let tag = match tag {
            Some(t) => t.to_string(),
            None => {
                let t = self.n_added.to_string();
                warn!("No tag provided, model is stored under tag '{t}'");
                t
            }
        };

        ds.check_basic()
            .change_context_lazy(|| CollectionError::InvalidDataset(tag.clone()))?;

        if ds.attrs.p_unit != self.p_unit {
            debug!("Converting pressure of model '{tag}' from {} to {}", ds.attrs.p_unit, self.p_unit);
            let current = ds.attrs.p_unit;
            ds.convert_pressure(current, self.p_unit);
        }

        ds.attrs.tag = Some(tag.clone());
        if self.models.insert(tag.clone(), ds).is_some() {
            warn!("Model '{tag}' replaced an existing model with the same tag");
        }
        self.n_added += 1;
        Ok(tag)
    }

    /// Return the model with the given tag, or the only loaded model if no tag is given.
    pub fn get_one_model(&self, tag: Option<&str>) -> Result<&GriddedDataset, CollectionError> {
        if let Some(tag) = tag {
            return self.models.get(tag)
                .ok_or_else(|| CollectionError::UnknownTag(tag.to_string()));
        }

        match self.models.len() {
            0 => Err(CollectionError::Empty),
            1 => self.models.values().next().ok_or(CollectionError::Empty),
            n => Err(CollectionError::AmbiguousTag(n)),
        }
    }

    /// Read one dataset JSON file and add it to the collection.
    ///
    /// `p_unit_in` overrides the pressure unit stored in the file. If `tag` is `None`,
    /// the tag stored in the file is used, and failing that, the model is numbered.
    pub fn read_reduced(
        &mut self,
        path: &Path,
        tag: Option<&str>,
        p_unit_in: Option<PressureUnit>,
    ) -> error_stack::Result<String, CollectionError> {
        let mut ds = GriddedDataset::from_json_file(path)
            .change_context_lazy(|| CollectionError::ReadError(path.to_path_buf()))?;

        let current = p_unit_in.unwrap_or(ds.attrs.p_unit);
        ds.convert_pressure(current, self.p_unit);

        let tag = tag.map(|t| t.to_string()).or_else(|| ds.attrs.tag.clone());
        self.add(ds, tag.as_deref())
    }

    /// Read `path` with [`DatasetCollection::load`] if it is a directory, and with
    /// [`DatasetCollection::read_reduced`] otherwise.
    pub fn read_path(
        &mut self,
        path: &Path,
        tag: Option<&str>,
        p_unit_in: Option<PressureUnit>,
    ) -> error_stack::Result<Vec<String>, CollectionError> {
        if is_existing_dir(path) {
            debug!("Loading datasets from directory {}", path.display());
            self.load(path, tag, p_unit_in)
        } else {
            Ok(vec![self.read_reduced(path, tag, p_unit_in)?])
        }
    }

    /// Write the model with `tag` (or every model, if `tag` is `None`) to `<dir>/<tag>.json`.
    pub fn save(&self, dir: &Path, tag: Option<&str>) -> error_stack::Result<Vec<PathBuf>, CollectionError> {
        if !is_existing_dir(dir) {
            return Err(CollectionError::DestinationMissing(dir.to_path_buf()).into());
        }

        let to_save: Vec<(&String, &GriddedDataset)> = if let Some(tag) = tag {
            let (k, v) = self.models.get_key_value(tag)
                .ok_or_else(|| CollectionError::UnknownTag(tag.to_string()))?;
            vec![(k, v)]
        } else {
            self.models.iter().collect()
        };

        let mut written = vec![];
        for (tag, ds) in to_save {
            let path = dir.join(format!("{tag}.json"));
            ds.to_json_file(&path)
                .change_context_lazy(|| CollectionError::WriteError(tag.clone()))?;
            info!("File written: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Load `<dir>/<tag>.json`, or every `*.json` file in `dir` if `tag` is `None`.
    /// Each model is stored under its file stem. Returns the tags loaded.
    pub fn load(
        &mut self,
        dir: &Path,
        tag: Option<&str>,
        p_unit_in: Option<PressureUnit>,
    ) -> error_stack::Result<Vec<String>, CollectionError> {
        let file_name = tag.map(|t| format!("{t}.json")).unwrap_or_else(|| "*.json".to_string());
        let pattern = dir.join(file_name);
        let pattern = pattern.to_str()
            .ok_or_else(|| CollectionError::GlobError(pattern.display().to_string()))?;

        let paths = glob::glob(pattern)
            .change_context_lazy(|| CollectionError::GlobError(pattern.to_string()))?;

        let mut loaded = vec![];
        for path in paths {
            let path = path.change_context_lazy(|| CollectionError::GlobError(pattern.to_string()))?;
            let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
            let tag = self.read_reduced(&path, stem.as_deref(), p_unit_in)?;
            loaded.push(tag);
        }

        if loaded.is_empty() {
            info!("No data found to load in {}", dir.display());
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_utils::uniform_dataset;

    fn small(p_unit: PressureUnit) -> GriddedDataset {
        uniform_dataset(
            vec![-90.0, 0.0, 90.0],
            vec![-45.0, 0.0, 45.0],
            vec![1e7, 1e6, 1e5],
            p_unit,
            300.0,
            10.0,
        )
    }

    #[test]
    fn test_add_numbering() {
        let mut coll = DatasetCollection::new(PressureUnit::Pa);
        let t0 = coll.add(small(PressureUnit::Pa), None).unwrap();
        let t1 = coll.add(small(PressureUnit::Pa), None).unwrap();
        let t2 = coll.add(small(PressureUnit::Pa), Some("hot")).unwrap();
        assert_eq!((t0.as_str(), t1.as_str(), t2.as_str()), ("0", "1", "hot"));
        assert_eq!(coll.get_model("hot").unwrap().tag(), Some("hot"));
    }

    #[test]
    fn test_get_one_model() {
        let mut coll = DatasetCollection::new(PressureUnit::Pa);
        assert!(matches!(coll.get_one_model(None), Err(CollectionError::Empty)));

        coll.add(small(PressureUnit::Pa), Some("a")).unwrap();
        assert_eq!(coll.get_one_model(None).unwrap().tag(), Some("a"));

        coll.add(small(PressureUnit::Pa), Some("b")).unwrap();
        assert!(matches!(coll.get_one_model(None), Err(CollectionError::AmbiguousTag(2))));
        assert_eq!(coll.get_one_model(Some("b")).unwrap().tag(), Some("b"));
        assert!(matches!(coll.get_one_model(Some("c")), Err(CollectionError::UnknownTag(_))));
    }

    #[test]
    fn test_add_converts_pressure() {
        let mut coll = DatasetCollection::new(PressureUnit::Bar);
        coll.add(small(PressureUnit::Pa), Some("a")).unwrap();
        let ds = coll.get_one_model(None).unwrap();
        assert_eq!(ds.z, vec![100.0, 10.0, 1.0]);
        assert_eq!(ds.attrs.p_unit, PressureUnit::Bar);
    }

    #[test]
    fn test_add_rejects_invalid() {
        let mut coll = DatasetCollection::new(PressureUnit::Pa);
        let mut ds = small(PressureUnit::Pa);
        ds.variables.remove("U");
        let err = coll.add(ds, Some("bad")).unwrap_err();
        assert!(matches!(err.current_context(), CollectionError::InvalidDataset(_)));
        assert!(coll.is_empty());
    }

    #[test]
    fn test_save_load() {
        let dir = std::env::temp_dir().join(format!("gcmt-collection-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut coll = DatasetCollection::new(PressureUnit::Pa);
        coll.add(small(PressureUnit::Pa), Some("m1")).unwrap();
        coll.add(small(PressureUnit::Pa), Some("m2")).unwrap();
        let written = coll.save(&dir, None).unwrap();
        assert_eq!(written.len(), 2);

        let mut loaded = DatasetCollection::new(PressureUnit::Bar);
        let tags = loaded.load(&dir, None, None).unwrap();
        assert_eq!(tags, vec!["m1".to_string(), "m2".to_string()]);
        assert_eq!(loaded.get_model("m1").unwrap().z, vec![100.0, 10.0, 1.0]);

        let mut one = DatasetCollection::new(PressureUnit::Pa);
        let tags = one.load(&dir, Some("m2"), None).unwrap();
        assert_eq!(tags, vec!["m2".to_string()]);

        let mut by_path = DatasetCollection::new(PressureUnit::Pa);
        assert_eq!(by_path.read_path(&dir, None, None).unwrap().len(), 2);
        let tags = by_path.read_path(&dir.join("m1.json"), Some("again"), None).unwrap();
        assert_eq!(tags, vec!["again".to_string()]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_missing_dir() {
        let coll = DatasetCollection::new(PressureUnit::Pa);
        let err = coll.save(Path::new("/this/does/not/exist"), None).unwrap_err();
        assert!(matches!(err.current_context(), CollectionError::DestinationMissing(_)));
    }
}
