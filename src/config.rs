//! Project configuration read from a `verify.toml` file.
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::errors::{Result, VerifyError};

/// Name of the configuration file in the project directory.
pub const CONFIG_FILE: &str = "verify.toml";

/// Configuration for a verify project.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Version of the verify tool this configuration is compatible with.
    pub ver: Option<String>,
    /// Directory scanned for test definition files.
    #[serde(default = "default_test_root")]
    pub test_root: PathBuf,
    /// Suffix of test definition files.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Directory holding the test index.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    /// Build command. `{}` is replaced with the build arguments.
    pub build: Option<String>,
    /// Run command. `{}` is replaced with the run arguments.
    pub run: Option<String>,
    /// Timeout for each build or run step, in seconds.
    pub timeout: Option<u64>,
}

fn default_test_root() -> PathBuf {
    PathBuf::from("tests")
}

fn default_suffix() -> String {
    ".test".to_string()
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(".verify")
}

impl Config {
    /// Create a configuration by reading `verify.toml` in `conf_dir`.
    /// If the configuration names a version it must match the version of
    /// the running tool.
    pub fn from_path(conf_dir: &Path) -> Result<Self> {
        let conf_path = conf_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&conf_path).map_err(|_| {
            VerifyError::Config(format!(
                "{} is missing. verify expects a directory with a {} file.",
                conf_path.display(),
                CONFIG_FILE
            ))
        })?;
        Self::parse(&contents).map_err(|err| {
            VerifyError::Config(format!("Failed to parse {}: {}", conf_path.display(), err))
        })
    }

    fn parse(contents: &str) -> Result<Self> {
        let conf: Config =
            toml::from_str(contents).map_err(|err| VerifyError::Config(err.to_string()))?;

        if let Some(ver) = &conf.ver {
            if env!("CARGO_PKG_VERSION") != ver.as_str() {
                return Err(VerifyError::Config(format!(
                    "version mismatch. Configuration requires: {}, tool version: {}.",
                    ver,
                    env!("CARGO_PKG_VERSION")
                )));
            }
        }
        Ok(conf)
    }

    /// Timeout for each step. Defaults to 20 minutes.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(1200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let conf = Config::parse("").unwrap();
        assert_eq!(conf.test_root, PathBuf::from("tests"));
        assert_eq!(conf.suffix, ".test");
        assert_eq!(conf.index_dir, PathBuf::from(".verify"));
        assert!(conf.build.is_none());
        assert_eq!(conf.timeout(), Duration::from_secs(1200));
    }

    #[test]
    fn full_config() {
        let conf = Config::parse(
            r#"
test_root = "suite"
suffix = ".vt"
build = "make {}"
run = "./run {config} {name} {}"
timeout = 30
"#,
        )
        .unwrap();
        assert_eq!(conf.test_root, PathBuf::from("suite"));
        assert_eq!(conf.suffix, ".vt");
        assert_eq!(conf.run.as_deref(), Some("./run {config} {name} {}"));
        assert_eq!(conf.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn version_mismatch() {
        assert!(Config::parse("ver = \"0.0.0-never\"").is_err());
        let current = format!("ver = \"{}\"", env!("CARGO_PKG_VERSION"));
        assert!(Config::parse(&current).is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().expect("create temp dir");
        match Config::from_path(dir.path()) {
            Err(VerifyError::Config(msg)) => assert!(msg.contains("verify.toml is missing")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
