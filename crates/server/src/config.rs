use std::path::{Path, PathBuf};

use executors::{WorkerCommand, command::RECOGNIZER_SECRETS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ceiling for a recognition run when the config names none.
pub const DEFAULT_RECOGNIZE_TIMEOUT_SECS: u64 = 300;
/// Ceiling for generation and conversion workers when the config names none.
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 120;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "BOARD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// External programs the handlers can delegate to. Only recognition is
/// mandatory; exports fall back to the built-in encoder when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub recognize: WorkerCommand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_export: Option<WorkerCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_unit_export: Option<WorkerCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert: Option<WorkerCommand>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let recognize = WorkerCommand::python("ocr_engine_v3.py")
            .timeout_secs(DEFAULT_RECOGNIZE_TIMEOUT_SECS);
        let env = recognize.env.clone().inherit(RECOGNIZER_SECRETS.iter().copied());
        Self {
            recognize: recognize.env(env),
            basic_export: None,
            floor_unit_export: None,
            convert: None,
        }
    }
}

impl WorkerConfig {
    fn fill_timeouts(&mut self) {
        self.recognize
            .timeout_secs
            .get_or_insert(DEFAULT_RECOGNIZE_TIMEOUT_SECS);
        for worker in [
            &mut self.basic_export,
            &mut self.floor_unit_export,
            &mut self.convert,
        ]
        .into_iter()
        .flatten()
        {
            worker.timeout_secs.get_or_insert(DEFAULT_EXPORT_TIMEOUT_SECS);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared directory for request-scoped uploads and worker outputs
    pub scratch_dir: PathBuf,
    pub upload_limit_bytes: usize,
    /// Upper bound on encodes and worker runs in flight at once
    pub max_concurrent_jobs: usize,
    pub workers: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3500,
            scratch_dir: PathBuf::from("uploads"),
            upload_limit_bytes: 20 * 1024 * 1024,
            max_concurrent_jobs: 4,
            workers: WorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the file named by `BOARD_CONFIG` (if any), then
    /// `HOST`, `BACKEND_PORT`/`PORT` and `BOARD_SCRATCH_DIR` from the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config.normalized())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Self>(raw).map(Self::normalized)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some((name, raw)) = lookup("BACKEND_PORT")
            .map(|v| ("BACKEND_PORT", v))
            .or_else(|| lookup("PORT").map(|v| ("PORT", v)))
        {
            // launch scripts sometimes pass ANSI-colored values
            let cleaned = String::from_utf8(strip_ansi_escapes::strip(raw.as_bytes()))
                .map_err(|_| ConfigError::InvalidEnv {
                    name,
                    value: raw.clone(),
                })?;
            self.port = cleaned
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name, value: raw })?;
        }
        if let Some(dir) = lookup("BOARD_SCRATCH_DIR").filter(|d| !d.trim().is_empty()) {
            self.scratch_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.max_concurrent_jobs = self.max_concurrent_jobs.max(1);
        self.workers.fill_timeouts();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3500);
        assert_eq!(config.scratch_dir, PathBuf::from("uploads"));
        assert_eq!(config.workers.recognize.timeout_secs, Some(300));
        assert!(config.workers.recognize.env.inherit.contains(&"GEMINI_API_KEY".to_string()));
        assert!(config.workers.convert.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults_and_fills_timeouts() {
        let config = ServerConfig::from_toml(
            r#"
            port = 8080
            max_concurrent_jobs = 0

            [workers.convert]
            program = "python3"
            args = ["excel_converter.py"]
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_concurrent_jobs, 1);
        let convert = config.workers.convert.unwrap();
        assert_eq!(convert.timeout_secs, Some(DEFAULT_EXPORT_TIMEOUT_SECS));
        assert_eq!(config.workers.recognize.args, vec!["ocr_engine_v3.py"]);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("HOST", "0.0.0.0"),
                ("PORT", "4000"),
                ("BACKEND_PORT", "\u{1b}[32m4100\u{1b}[0m"),
                ("BOARD_SCRATCH_DIR", "/tmp/board"),
            ]))
            .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 4100);
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/board"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let mut config = ServerConfig::default();
        let err = config.apply_env(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
    }
}
