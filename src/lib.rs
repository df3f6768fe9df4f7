use std::path::{Path, PathBuf};

pub mod chemistry;
pub mod collection;
pub mod config;
pub mod dataset;
pub mod default_files;
pub mod engines;
pub mod interface;
pub mod interpolation;
pub mod manipulations;
pub mod units;
pub mod utils;


/// If `p` is already an absolute path, return it unchanged. Otherwise, make it relative to
/// the parent directory of `config_file`. A `config_file` without a parent directory
/// leaves `p` relative to the current directory.
pub(crate) fn path_relative_to_config(config_file: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        p
    } else if let Some(parent_dir) = config_file.parent() {
        parent_dir.join(p)
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_relative_to_config() {
        let cfg = Path::new("/data/run/engine.json");
        assert_eq!(path_relative_to_config(cfg, PathBuf::from("bin")), PathBuf::from("/data/run/bin"));
        assert_eq!(path_relative_to_config(cfg, PathBuf::from("/opt")), PathBuf::from("/opt"));
    }
}
