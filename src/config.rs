//! Configuration files: TOML for PAC runs, JSON for external engines.
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionError, DatasetCollection};
use crate::interface::pac::{InputFileOptions, LptOptions};
use crate::path_relative_to_config;
use crate::units::PressureUnit;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Error parsing configuration: {0}")]
    ParseError(String),
}

/// Options for the PAC input and lpt files.
///
/// Every key is optional; anything not given takes the default described on
/// [`InputFileOptions`] and [`LptOptions`]. An example:
///
/// ```toml
/// [input_file]
/// r_star = 0.805
/// a = 0.03142
/// nlon = 90
///
/// [lpt]
/// eps = 20.0
/// set_min_temp = 500.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacConfig {
    pub input_file: InputFileOptions,
    pub lpt: LptOptions,
}

impl PacConfig {
    pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(p.as_ref())
            .map_err(|e| ConfigError::IoError(
                format!("could not read TOML file {}: {e}", p.as_ref().display())
            ))?;
        toml::from_str(&s)
            .map_err(|e| ConfigError::ParseError(
                format!("the TOML file {} is not correct: {e}", p.as_ref().display())
            ))
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// How to call an external engine program.
///
/// ```json
/// {"script": "./run_chemistry.py", "args": ["--fast"], "working_dir": "engines"}
/// ```
///
/// A relative `working_dir` is interpreted relative to the directory containing
/// the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

impl EngineConfig {
    pub fn read_from_path<P: AsRef<Path>>(p: P) -> Result<Self, ConfigError> {
        let rdr = std::fs::File::open(p.as_ref())
            .map_err(|e| ConfigError::IoError(
                format!("could not open JSON file {}: {e}", p.as_ref().display())
            ))?;

        let mut value: EngineConfig = serde_json::from_reader(rdr)
            .map_err(|e| ConfigError::ParseError(
                format!("the JSON file {} is not correct: {e}", p.as_ref().display())
            ))?;

        value.working_dir = path_relative_to_config(p.as_ref(), value.working_dir);
        Ok(value)
    }
}

/// Command line arguments selecting the GCM data a program works on.
#[derive(Debug, Clone, Args)]
pub struct DatasetArgs {
    /// A dataset JSON file, or a directory of them.
    pub dataset: PathBuf,

    /// The time step of the model to use.
    #[clap(short, long)]
    pub time: f64,

    /// Which model to use if DATASET is a directory holding more than one.
    /// For a single file, this overrides the tag stored in it.
    #[clap(long)]
    pub tag: Option<String>,

    /// Pressure unit of the stored data, if the files do not declare the right one
    /// ("Pa" or "bar").
    #[clap(long)]
    pub p_unit_in: Option<PressureUnit>,

    /// Interpolate the data onto a 15 degree longitude/latitude grid first.
    #[clap(long)]
    pub regrid_lowres: bool,
}

impl DatasetArgs {
    /// Read the dataset(s) into a collection working in bar.
    pub fn load_collection(&self) -> error_stack::Result<DatasetCollection, CollectionError> {
        let mut tools = DatasetCollection::new(PressureUnit::Bar);
        tools.read_path(&self.dataset, self.tag.as_deref(), self.p_unit_in)?;
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_files::default_pac_config_toml;

    #[test]
    fn test_default_config_round_trip() {
        let s = default_pac_config_toml().unwrap();
        let cfg: PacConfig = toml::from_str(&s).unwrap();
        assert_eq!(cfg.input_file.r_planet, Some(11.2));
        assert_eq!(cfg.input_file.nrot, Some(30));
        assert_eq!(cfg.input_file.model_name, None);
        assert_eq!(cfg.lpt, LptOptions::default());
    }

    #[test]
    fn test_partial_config() {
        let cfg: PacConfig = toml::from_str("[lpt]\nset_min_temp = 500.0\n").unwrap();
        assert_eq!(cfg.lpt.set_min_temp, Some(500.0));
        assert_eq!(cfg.lpt.eps, 20.0);
        assert_eq!(cfg.input_file, InputFileOptions::default());

        assert!(toml::from_str::<PacConfig>("[input_file]\nnlon = \"many\"\n").is_err());
    }

    #[test]
    fn test_engine_config() {
        let dir = std::env::temp_dir().join(format!("gcmt-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("chem.json");

        std::fs::write(&path, r#"{"script": "run.sh", "working_dir": "engines"}"#).unwrap();
        let cfg = EngineConfig::read_from_path(&path).unwrap();
        assert_eq!(cfg.script, "run.sh");
        assert!(cfg.args.is_empty());
        assert_eq!(cfg.working_dir, dir.join("engines"));

        std::fs::write(&path, r#"{"script": "run.sh", "args": ["-v"], "working_dir": "/opt/chem"}"#).unwrap();
        let cfg = EngineConfig::read_from_path(&path).unwrap();
        assert_eq!(cfg.args, vec!["-v"]);
        assert_eq!(cfg.working_dir, PathBuf::from("/opt/chem"));

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(EngineConfig::read_from_path(&path), Err(ConfigError::IoError(_))));
    }
}
