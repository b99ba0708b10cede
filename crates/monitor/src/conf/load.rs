//! Load — config loading from file and environment variables.

use std::path::{Path, PathBuf};

use tracing::info;

use super::env::{self, EnvSource};
use super::model::FileConfig;
use super::snapshot::ConfigSnapshot;
use super::ConfigError;

pub const CONFIG_PATH_ENV: &str = "MONITOR_CONFIG_FILE";
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["/config/config.yaml", "config.yaml"];

/// Finds, reads and compiles the configuration. Held for the lifetime of the
/// process so reloads read from the same place.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: EnvSource,
}

impl ConfigLoader {
    /// Priority: Environment Variables > Config File > Defaults
    pub fn from_env() -> Self {
        let env = EnvSource::from_process();
        let path = match env.get(CONFIG_PATH_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists()),
        };
        Self { path, env }
    }

    pub fn with_path(path: impl Into<PathBuf>, env: EnvSource) -> Self {
        Self {
            path: Some(path.into()),
            env,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        let mut file = match &self.path {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                read_file(path)?
            }
            Some(path) => {
                info!("Config file not found at {}, using environment variables", path.display());
                FileConfig::default()
            }
            None => {
                info!("No config file found, using environment variables");
                FileConfig::default()
            }
        };
        env::apply(&mut file, &self.env)?;
        ConfigSnapshot::compile(file)
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, &path.display().to_string())
}

pub fn parse_config(yaml: &str, origin: &str) -> Result<FileConfig, ConfigError> {
    // An empty file deserializes as unit, not as an empty mapping.
    if yaml.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
        origin: origin.to_string(),
        source,
    })
}

/// Compile a snapshot from YAML text alone, without consulting the environment.
pub fn parse_snapshot(yaml: &str) -> Result<ConfigSnapshot, ConfigError> {
    ConfigSnapshot::compile(parse_config(yaml, "<inline>")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config("containers:\n  web: [error]\n");
        let loader = ConfigLoader::with_path(file.path(), EnvSource::empty());
        let snapshot = loader.load().unwrap();
        assert!(snapshot.entity("web").is_some());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("containers:\n  web: [error]\nsettings:\n  notification_cooldown: 30\n");
        let env = EnvSource::from_pairs([("NOTIFICATION_COOLDOWN", "1")]);
        let snapshot = ConfigLoader::with_path(file.path(), env).load().unwrap();
        assert_eq!(snapshot.settings.notification_cooldown, 1);
    }

    #[test]
    fn test_missing_file_falls_back_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSource::from_pairs([("CONTAINERS", "web"), ("GLOBAL_KEYWORDS", "error")]);
        let loader = ConfigLoader::with_path(dir.path().join("absent.yaml"), env);
        let snapshot = loader.load().unwrap();
        assert_eq!(snapshot.entity_names().collect::<Vec<_>>(), vec!["web"]);
    }

    #[test]
    fn test_missing_file_without_env_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_path(dir.path().join("absent.yaml"), EnvSource::empty());
        assert!(matches!(loader.load(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_malformed_yaml_reports_origin() {
        let file = write_config("containers: [web\n");
        let loader = ConfigLoader::with_path(file.path(), EnvSource::empty());
        match loader.load() {
            Err(ConfigError::Yaml { origin, .. }) => {
                assert_eq!(origin, file.path().display().to_string())
            }
            other => panic!("expected yaml error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_is_default() {
        assert!(parse_config("  \n", "test").unwrap().containers.is_none());
    }
}
