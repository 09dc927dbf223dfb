use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::{
    platform::Platform,
    storage::{self, StorageManager},
};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u8 = 2;
/// How long a rendered page may take to show its marker element
const DEFAULT_RENDER_WAIT_SECS: u64 = 15;

/// How pages are fetched
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Timeout of a single request in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout of reachability checks (HEAD / GET) in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Retries after transport errors and 429 responses
    #[serde(default = "default_retries")]
    pub retries: u8,

    /// Escalate to a headless browser when plain requests come back empty or denied
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome binary, autodetected when empty. `CHROME_PATH` overrides it.
    #[serde(default)]
    pub chrome_path: Option<String>,

    #[serde(default = "default_render_wait_secs")]
    pub render_wait_secs: u64,

    /// Proxy url for plain requests (http, https or socks5)
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            headless: true,
            chrome_path: None,
            render_wait_secs: DEFAULT_RENDER_WAIT_SECS,
            proxy: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

fn default_retries() -> u8 {
    DEFAULT_RETRIES
}

fn default_headless() -> bool {
    true
}

fn default_render_wait_secs() -> u64 {
    DEFAULT_RENDER_WAIT_SECS
}

/// Per platform limits
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Maximum detail pages per run, 0 means unlimited
    #[serde(default)]
    pub max_items: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Keyed by platform name, e.g. `itch.io`
    #[serde(default = "default_platforms")]
    pub platforms: BTreeMap<String, PlatformSettings>,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scrape: ScrapeConfig::default(),
            platforms: default_platforms(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_platforms() -> BTreeMap<String, PlatformSettings> {
    Platform::ALL
        .iter()
        .map(|p| (p.as_str().to_string(), PlatformSettings::default()))
        .collect()
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scrape.timeout_secs == 0 {
            bail!("scrape.timeout_secs must be greater than 0");
        }

        if self.scrape.probe_timeout_secs == 0 {
            bail!("scrape.probe_timeout_secs must be greater than 0");
        }

        for name in self.platforms.keys() {
            let platform: Platform = name
                .parse()
                .map_err(|e: String| anyhow::anyhow!("platforms: {e}"))?;

            let (min, max) = self.delay_bounds(platform);
            if min > max {
                bail!("platforms.{name}: min_delay_ms is greater than max_delay_ms");
            }
        }

        Ok(())
    }

    pub fn load_with(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path.as_ref())
            .with_context(|| format!("failed to create {}", base_path.as_ref().display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            log::info!("writing default config to {}", store.base_dir.join(CONFIG_FILE).display());
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.as_ref().to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn platform(&self, platform: Platform) -> PlatformSettings {
        self.platforms
            .get(platform.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn max_items(&self, platform: Platform) -> usize {
        self.platform(platform).max_items
    }

    /// Pause between detail pages. Unset bounds fall back to the platform defaults.
    pub fn delay_bounds(&self, platform: Platform) -> (Duration, Duration) {
        let settings = self.platform(platform);
        let (default_min, default_max) = platform.default_delay();

        let min = settings
            .min_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(default_min);
        let max = settings
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(default_max.max(min));

        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.scrape.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.platforms.len(), Platform::ALL.len());
        assert_eq!(config.max_items(Platform::ItchIo), 0);
    }

    #[test]
    fn reads_platform_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "scrape:\n  timeout_secs: 5\nplatforms:\n  azgames.io:\n    max_items: 7\n    min_delay_ms: 0\n    max_delay_ms: 10\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert_eq!(config.scrape.timeout_secs, 5);
        assert_eq!(config.max_items(Platform::AzGames), 7);
        assert_eq!(
            config.delay_bounds(Platform::AzGames),
            (Duration::ZERO, Duration::from_millis(10))
        );
        // untouched platforms keep their defaults
        assert_eq!(
            config.delay_bounds(Platform::GameFlare),
            Platform::GameFlare.default_delay()
        );
    }

    #[test]
    fn rejects_inverted_delays() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "platforms:\n  itch.io:\n    min_delay_ms: 500\n    max_delay_ms: 100\n",
        )
        .unwrap();

        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn rejects_unknown_platform() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "platforms:\n  newgrounds.com:\n    max_items: 1\n",
        )
        .unwrap();

        assert!(Config::load_with(tmp.path()).is_err());
    }
}
