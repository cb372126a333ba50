//! `AppConfig` struct and TOML loading.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Feed server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Grab window and detail settings.
    #[serde(default)]
    pub grab: GrabConfig,
    /// Channel logo settings.
    #[serde(default)]
    pub logos: LogoConfig,
    /// XMLTV output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Channel id → display name. A non-empty map is an allow-list.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
}

/// Feed server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server root URL.
    pub base_url: String,
    /// Local source address for outgoing requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<IpAddr>,
    /// Seconds to wait before retrying a failed detail or logo request.
    pub retry_delay_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://w1.zt6.nl/"),
            bind_address: None,
            retry_delay_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Parses `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("invalid server.base_url: {}", self.base_url))
    }

    /// Retry delay as a `Duration`.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Grab window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GrabConfig {
    /// Days to scan starting today (1..=7).
    pub max_days: u32,
    /// Time-slots per day.
    pub slots_per_day: u8,
    /// Fetch program details.
    pub details: bool,
    /// IANA zone of output timestamps.
    pub timezone: String,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            max_days: 7,
            slots_per_day: 8,
            details: true,
            timezone: String::from("Europe/Amsterdam"),
        }
    }
}

impl GrabConfig {
    /// Parses `timezone`.
    ///
    /// # Errors
    ///
    /// Returns an error if `timezone` is not a known IANA zone name.
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid grab.timezone {:?}: {e}", self.timezone))
    }
}

/// Channel logo configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogoConfig {
    /// Download channel logos.
    pub download: bool,
    /// Logo directory, relative to the data directory.
    pub dir: PathBuf,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            download: false,
            dir: PathBuf::from("logos"),
        }
    }
}

/// XMLTV output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output file, relative to the data directory.
    pub xmltv_file: PathBuf,
    /// `lang` attribute of text elements.
    pub language: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            xmltv_file: PathBuf::from("epggrab.xml"),
            language: String::from("nl"),
        }
    }
}

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

impl AppConfig {
    /// Resolves the config file location.
    ///
    /// `--dir` wins. Otherwise the file lives in `$XDG_CONFIG_HOME/epggrab`,
    /// falling back to `~/.config/epggrab`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is `None` and neither `XDG_CONFIG_HOME` nor
    /// `HOME` is set.
    pub fn path(dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(d) = dir {
            return Ok(d.join(CONFIG_FILE_NAME));
        }
        let base = config_home(
            std::env::var_os("XDG_CONFIG_HOME"),
            std::env::var_os("HOME"),
        )
        .context("neither XDG_CONFIG_HOME nor HOME is set")?;
        Ok(base.join("epggrab").join(CONFIG_FILE_NAME))
    }

    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// holds an invalid value.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Checks values the TOML types alone cannot rule out.
    ///
    /// # Errors
    ///
    /// Returns an error if `grab.slots_per_day` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.grab.slots_per_day == 0 {
            bail!("grab.slots_per_day must be at least 1");
        }
        Ok(())
    }
}

/// Base config directory; an empty `XDG_CONFIG_HOME` counts as unset.
fn config_home(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    xdg_config_home
        .filter(|xdg| !xdg.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|h| PathBuf::from(h).join(".config")))
}
