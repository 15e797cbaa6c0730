//! Configuration loading.
//!
//! A config directory holds:
//!
//! ```text
//! endpoints       one domain or IPv4[:port] per line, `#` comments allowed
//! mac_address     MAC address for gateway-bound routes
//! settings.toml   optional overrides, see [`Settings`]
//! state           written by splitroute, see [`crate::state`]
//! ```

use crate::endpoint::Endpoint;
use crate::error::{Result, SplitRouteError};
use crate::hosts::DEFAULT_HOSTS_FILE;
use crate::reconciler::RunOptions;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Endpoint list file name.
pub const ENDPOINTS_FILE: &str = "endpoints";
/// MAC address file name.
pub const MAC_ADDRESS_FILE: &str = "mac_address";
/// Optional settings file name.
pub const SETTINGS_FILE: &str = "settings.toml";
/// Default state file name.
pub const STATE_FILE: &str = "state";

/// Optional settings from `settings.toml`.
///
/// # Example
///
/// ```
/// use splitroute::Settings;
///
/// let settings: Settings = toml::from_str("hardware_port = \"Thunderbolt Ethernet\"").unwrap();
/// assert_eq!(settings.hardware_port, "Thunderbolt Ethernet");
/// assert!(settings.notify);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Hardware port name matched (case-insensitive substring) in
    /// auto-detect mode.
    pub hardware_port: String,
    /// Hosts file to manage.
    pub hosts_file: PathBuf,
    /// State file; defaults to `<config_dir>/state`.
    pub state_file: Option<PathBuf>,
    /// Send a desktop notification when a run ends.
    pub notify: bool,
    /// Seconds between `sudo -v` refreshes.
    pub keepalive_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hardware_port: "USB 10/100/1000 LAN".to_string(),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            state_file: None,
            notify: true,
            keepalive_secs: 60,
        }
    }
}

/// Run-mode switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Simulate; write nothing.
    pub dry_run: bool,
    /// Bind routes to the active interface.
    pub auto_detect_interface: bool,
    /// Re-resolve everything.
    pub ignore_state: bool,
}

/// Everything loaded from a config directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// The directory the config was loaded from.
    pub dir: PathBuf,
    /// Declared endpoints, de-duplicated, in file order.
    pub endpoints: Vec<Endpoint>,
    /// Link-layer address for gateway-bound routes.
    pub link_address: String,
    /// Optional settings.
    pub settings: Settings,
}

impl Config {
    /// Loads the config directory.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::ConfigMissing`] if the endpoint list or MAC
    /// address is absent or empty, and [`SplitRouteError::InvalidConfig`] for
    /// a domain with a port, a malformed MAC address or `settings.toml`.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        let endpoints_path = dir.join(ENDPOINTS_FILE);
        let endpoints = parse_endpoints(&read_required(&endpoints_path, "endpoints")?)?;
        if endpoints.is_empty() {
            return Err(SplitRouteError::ConfigMissing {
                what: "endpoints",
                path: endpoints_path,
            });
        }

        let mac_path = dir.join(MAC_ADDRESS_FILE);
        let link_address = config_lines(&read_required(&mac_path, "MAC address")?)
            .next()
            .map(str::to_string)
            .ok_or(SplitRouteError::ConfigMissing {
                what: "MAC address",
                path: mac_path,
            })?;
        if !is_mac_address(&link_address) {
            return Err(SplitRouteError::InvalidConfig(format!(
                "not a MAC address: {link_address:?}"
            )));
        }

        let settings = load_settings(&dir.join(SETTINGS_FILE))?;

        tracing::debug!(
            dir = %dir.display(),
            endpoints = endpoints.len(),
            "Loaded configuration"
        );
        Ok(Self {
            dir,
            endpoints,
            link_address,
            settings,
        })
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.settings
            .state_file
            .clone()
            .unwrap_or_else(|| self.dir.join(STATE_FILE))
    }

    /// Interval between privilege refreshes.
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.settings.keepalive_secs.max(1))
    }

    /// Combines the config with command-line flags.
    #[must_use]
    pub fn run_options(&self, flags: RunFlags) -> RunOptions {
        RunOptions {
            dry_run: flags.dry_run,
            auto_detect_interface: flags.auto_detect_interface,
            ignore_state: flags.ignore_state,
            hardware_port: self.settings.hardware_port.clone(),
            link_address: self.link_address.clone(),
        }
    }
}

/// `$HOME/.config/splitroute`, if `HOME` is set.
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("splitroute"))
}

fn read_required(path: &Path, what: &'static str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SplitRouteError::ConfigMissing {
            what,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .map_err(|e| SplitRouteError::InvalidConfig(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

/// Yields trimmed lines with comments and blanks removed.
fn config_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(data, _)| data).trim())
        .filter(|line| !line.is_empty())
}

/// Parses the endpoint list, dropping repeats.
///
/// Only IPv4 literals may carry a `:port`.
fn parse_endpoints(content: &str) -> Result<Vec<Endpoint>> {
    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();
    for endpoint in config_lines(content).map(Endpoint::new) {
        if endpoint.has_port() && !endpoint.is_literal() {
            return Err(SplitRouteError::InvalidConfig(format!(
                "port only allowed on IPv4 addresses: {endpoint}"
            )));
        }
        if seen.insert(endpoint.clone()) {
            endpoints.push(endpoint);
        }
    }
    Ok(endpoints)
}

/// Six two-digit hex octets separated by `:`.
fn is_mac_address(s: &str) -> bool {
    let octets: Vec<&str> = s.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.bytes().all(|b| b.is_ascii_hexdigit()))
}
