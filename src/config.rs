use std::path::PathBuf;
use std::time::Duration;

use config::{ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::constants::DEFAULT_TIMEOUT;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub timeout_ms: u64,
    pub python_path: PathBuf,
    pub work_dir: PathBuf,
    pub questions_file: PathBuf,
    pub store_file: PathBuf,
    pub max_output_bytes: usize,
    pub channel_capacity: usize,
}

impl Config {
    /// Defaults, then `qotd.toml` if present, then `QOTD_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::defaults()?
            .add_source(File::with_name("qotd").required(false))
            .add_source(Environment::with_prefix("QOTD"))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
        let work_dir = std::env::temp_dir().join("qotd-judge");

        config::Config::builder()
            .set_default("timeout_ms", DEFAULT_TIMEOUT.as_millis() as i64)?
            .set_default("python_path", "python3")?
            .set_default("work_dir", work_dir.to_string_lossy().to_string())?
            .set_default("questions_file", "data/questions.json")?
            .set_default("store_file", "data/store.json")?
            .set_default("max_output_bytes", 1024 * 1024_i64)?
            .set_default("channel_capacity", 128_i64)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config: Config = Config::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.python_path, PathBuf::from("python3"));
        assert_eq!(config.store_file, PathBuf::from("data/store.json"));
        assert_eq!(config.channel_capacity, 128);
    }

    #[test]
    fn test_file_then_env_override() {
        let env = HashMap::from([
            ("QOTD_TIMEOUT_MS".to_string(), "750".to_string()),
            ("QOTD_WORK_DIR".to_string(), "/var/tmp/qotd".to_string()),
        ]);

        let config: Config = Config::defaults()
            .unwrap()
            .add_source(File::from_str(
                "timeout_ms = 5000\npython_path = \"/usr/bin/python3.12\"",
                FileFormat::Toml,
            ))
            .add_source(Environment::with_prefix("QOTD").source(Some(env)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.timeout(), Duration::from_millis(750));
        assert_eq!(config.python_path, PathBuf::from("/usr/bin/python3.12"));
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/qotd"));
    }
}
