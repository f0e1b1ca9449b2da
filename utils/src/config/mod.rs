use anyhow::anyhow;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher};
use serde::{Deserialize, Serialize};
use std::fs::{read_to_string, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

pub use notify::{RecursiveMode, Watcher};

#[cfg(feature = "logging")]
pub mod logging;
#[cfg(feature = "logging")]
pub use crate::config::logging::LoggingConfig;

#[cfg(feature = "db")]
pub mod db;
#[cfg(feature = "db")]
pub use crate::config::db::DbConfig;
#[cfg(feature = "db")]
pub use tenacity_db::TenacityDB;

#[cfg(feature = "moderation")]
pub mod moderation;
#[cfg(feature = "moderation")]
pub use crate::config::moderation::ModerationConfig;

pub const CONFIG: &str = "Config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    inner: Arc<Mutex<InnerConfig>>,
    path: PathBuf,
    #[cfg(feature = "db")]
    db: Arc<TenacityDB>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InnerConfig {
    #[cfg(feature = "logging")]
    pub logs: LoggingConfig,
    #[cfg(feature = "db")]
    pub db: DbConfig,
    #[cfg(feature = "moderation")]
    pub moderation: ModerationConfig,
}

// Impls
impl InnerConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(CONFIG)
    }

    /// Reads the file at `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(s) => s.parse(),
            Err(_) => {
                let config = Self::default();
                let mut f = File::create(path.as_ref())?;
                f.write_all(toml::to_string(&config)?.as_bytes())?;
                Ok(config)
            }
        }
    }
}

impl std::str::FromStr for InnerConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| anyhow!(e))
    }
}

impl Config {
    pub async fn load() -> anyhow::Result<Self> {
        Self::load_from(CONFIG).await
    }

    pub async fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let inner_config = InnerConfig::load_from(path.as_ref())?;
        #[cfg(feature = "db")]
        let db = TenacityDB::connect(&inner_config.db.url).await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(inner_config)),
            path: path.as_ref().to_path_buf(),
            #[cfg(feature = "db")]
            db: Arc::new(db),
        })
    }

    /// Watches the configuration file and swaps in the new values on every modification.
    /// The database connection is not reopened.
    pub fn init(&self) -> anyhow::Result<RecommendedWatcher> {
        let config_clone = Arc::clone(&self.inner);
        let path = self.path.clone();
        let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() {
                        match InnerConfig::load_from(&path) {
                            Ok(config) => {
                                *config_clone.lock().unwrap_or_else(|e| e.into_inner()) = config;
                                debug!(target: "Notify", "New configuration loaded, {:?}", config_clone);
                            }
                            Err(e) => error!(target: "Notify", "Error loading config, {}", e),
                        }
                    }
                }
                Err(e) => error!(target: "Notify", "Error processing notify event: {}", e),
            },
            NotifyConfig::default()
                .with_poll_interval(Duration::from_secs(2))
                .with_compare_contents(true),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        Ok(watcher)
    }

    pub fn arc_clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            path: self.path.clone(),
            #[cfg(feature = "db")]
            db: Arc::clone(&self.db),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(feature = "logging")]
    pub fn logs(&self) -> anyhow::Result<LoggingConfig> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Error, {e}"))?;
        Ok(inner.logs.clone())
    }

    #[cfg(feature = "moderation")]
    pub fn moderation(&self) -> anyhow::Result<ModerationConfig> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Error, {e}"))?;
        Ok(inner.moderation.clone())
    }

    #[cfg(feature = "db")]
    pub fn db(&self) -> Arc<TenacityDB> {
        Arc::clone(&self.db)
    }

    #[cfg(feature = "db")]
    pub fn db_config(&self) -> anyhow::Result<DbConfig> {
        let inner = self.inner.lock().map_err(|e| anyhow!("Error, {e}"))?;
        Ok(inner.db.clone())
    }
}
