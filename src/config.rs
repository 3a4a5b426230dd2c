use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logs::LogsConfig;
use crate::store::config::DbConfig;

/// Directories used to locate the configuration file and runtime data.
pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        let is_root = is_root();

        let config_path = if let Some(path) = config_path {
            path
        } else if let Ok(path) = env::var("AIGOV_CONFIG") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/etc/aigov")
        } else {
            home_dir()?.join(".config").join("aigov")
        };

        let data_path = if let Some(path) = data_path {
            path
        } else if let Ok(path) = env::var("AIGOV_DATA") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/var/lib/aigov")
        } else {
            home_dir()?.join(".local").join("share").join("aigov")
        };

        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
        })
    }

    /// Loads `<name>.toml` from the config directory. A missing file falls
    /// back to `default_func`; the result is always completed and validated.
    pub fn load_config<T, F>(&self, name: &str, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)
                .with_context(|| format!("parse config toml: {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

pub trait CommonConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// Command line flags shared by every entry point that loads configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// The config directory, defaults to `~/.config/aigov`.
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// The data directory, defaults to `~/.local/share/aigov`.
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<AppConfig> {
        let ps = PathSet::new(self.config_path.clone(), self.data_path.clone())?;
        ps.load_config("aigov", AppConfig::default)
    }
}

/// Top level configuration of the authorization service.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub db: DbConfig,
}

impl CommonConfig for AppConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.logs.complete(ps).context("logs")?;
        self.db.complete(ps).context("db")?;
        Ok(())
    }
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn home_dir() -> Result<PathBuf> {
    let dir = env::var_os("HOME") // Unix/Linux/macOS
        .or_else(|| env::var_os("USERPROFILE")) // Windows
        .map(PathBuf::from);
    match dir {
        Some(dir) => Ok(dir),
        None => {
            bail!("could not determine home directory, please specify config path manually")
        }
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
