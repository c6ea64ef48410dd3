//! Config file loading
//!
//! The config file is `linkpatrol.yaml` in the working directory, or the
//! path given with `-c/--config`. All keys are optional and mirror the
//! CLI flag names.

use std::path::Path;

use serde::Deserialize;

use crate::ConfigResult;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "linkpatrol.yaml";

/// Raw, partially specified configuration from `linkpatrol.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub target: Option<String>,

    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    pub timeout: Option<u64>,

    /// Max requests per second per host
    pub rate: Option<i64>,

    pub verbose: Option<bool>,

    pub width: Option<usize>,

    #[serde(rename = "no-truncate")]
    pub no_truncate: Option<bool>,

    pub cpuprofile: Option<std::path::PathBuf>,

    pub memprofile: Option<std::path::PathBuf>,
}

/// Loads the config file layer.
///
/// An explicitly given path must exist and parse; a missing default file is
/// not an error and yields an empty layer.
pub fn load_file(path: Option<&Path>) -> ConfigResult<FileConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&contents)?)
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(FileConfig::default());
            }
            let contents = std::fs::read_to_string(default)?;
            Ok(serde_yaml::from_str(&contents)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "linkpatrol_test_{}_{:?}.yaml",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = std::fs::File::create(&path).expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        path
    }

    #[test]
    fn test_load_explicit_file() {
        let path = write_temp_config(
            "target: https://example.com\nconcurrency: 12\ntimeout: 10\nrate: 5\nno-truncate: true\n",
        );

        let file = load_file(Some(&path)).expect("load config");
        assert_eq!(file.target.as_deref(), Some("https://example.com"));
        assert_eq!(file.concurrency, Some(12));
        assert_eq!(file.timeout, Some(10));
        assert_eq!(file.rate, Some(5));
        assert_eq!(file.no_truncate, Some(true));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = load_file(Some(Path::new("/nonexistent/linkpatrol.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let path = write_temp_config("target: https://example.com\nbogus-key: 1\n");

        let result = load_file(Some(&path));
        assert!(result.is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_empty_file_is_all_none() {
        let path = write_temp_config("{}\n");

        let file = load_file(Some(&path)).expect("load config");
        assert!(file.target.is_none());
        assert!(file.concurrency.is_none());

        let _ = std::fs::remove_file(&path);
    }
}
