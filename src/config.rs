use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use natal_ephemeris::{EngineKind, EphemerisSettings, HouseSystem};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "natal.toml";
pub const ENV_PREFIX: &str = "NATAL_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),
    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),
    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisConfig {
    pub engine: EngineKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephe_path: Option<PathBuf>,
    pub house_system: HouseSystem,
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        EphemerisConfig {
            engine: EngineKind::Analytic,
            ephe_path: None,
            house_system: HouseSystem::Placidus,
        }
    }
}

impl EphemerisConfig {
    pub fn engine_settings(&self) -> EphemerisSettings {
        EphemerisSettings {
            engine: self.engine,
            ephe_path: self.ephe_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            ttl_days: 30,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * 86_400)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub root: PathBuf,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: StoreBackend::Memory,
            root: PathBuf::from("natal-store"),
            timeout_ms: 2_000,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub algo_version: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            algo_version: "natal-placidus-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub ephemeris: EphemerisConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub chart: ChartConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Defaults, then the TOML file, then `NATAL_*` variables (`__` nests,
    /// e.g. `NATAL_CACHE__TTL_DAYS=7`).
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads settings. An explicit `path` must exist; otherwise `natal.toml`
    /// in the working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::MissingFile(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        let settings: Settings = Self::figment(&file).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chart.algo_version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "chart.algo_version",
                message: "must not be empty".into(),
            });
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "store.timeout_ms",
                message: "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load(None).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.ephemeris.engine, EngineKind::Analytic);
            assert_eq!(settings.cache.ttl(), Duration::from_secs(30 * 86_400));
            assert_eq!(settings.store.timeout(), Duration::from_millis(2_000));
            assert_eq!(settings.chart.algo_version, "natal-placidus-1");
            Ok(())
        });
    }

    #[test]
    fn file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "natal.toml",
                r#"
                [cache]
                ttl_days = 7

                [store]
                backend = "file"
                root = "/var/lib/natal"

                [ephemeris]
                house_system = "porphyry"
                "#,
            )?;
            jail.set_env("NATAL_EPHEMERIS__ENGINE", "none");
            jail.set_env("NATAL_CACHE__TTL_DAYS", "3");

            let settings = Settings::load(None).unwrap();
            assert_eq!(settings.ephemeris.engine, EngineKind::None);
            assert_eq!(settings.ephemeris.house_system, HouseSystem::Porphyry);
            assert_eq!(settings.cache.ttl_days, 3);
            assert_eq!(settings.store.backend, StoreBackend::File);
            assert_eq!(settings.store.root, PathBuf::from("/var/lib/natal"));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = Settings::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::MissingFile(_)));
            Ok(())
        });
    }

    #[test]
    fn rejects_zero_timeout() {
        Jail::expect_with(|jail| {
            jail.set_env("NATAL_STORE__TIMEOUT_MS", "0");
            assert!(matches!(Settings::load(None), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
