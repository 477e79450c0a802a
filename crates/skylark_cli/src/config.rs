//! CLI configuration persistence.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default service host, used when the config does not name one.
pub const DEFAULT_SERVICE: &str = "https://skylark.social";

/// Persistent CLI configuration for one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Service base URL for RPC calls.
    #[serde(default)]
    pub service: String,
    /// Stream host override; the service host is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_service: Option<String>,
    /// Account identifier (handle) to log in as.
    pub identifier: String,
    /// Account secret.
    pub secret: String,
}

impl Config {
    /// Directory holding config and credential files.
    pub fn dir() -> Result<PathBuf, Box<dyn Error>> {
        let base = dirs::config_dir().ok_or("cannot determine config directory")?;
        Ok(base.join("skylark"))
    }

    /// Path of the config file for a profile (`None` = default profile).
    pub fn path(profile: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
        let dir = Self::dir()?;
        Ok(match profile {
            Some(name) => dir.join(format!("config-{name}.json")),
            None => dir.join("config.json"),
        })
    }

    /// Loads the config for a profile.
    pub fn load(profile: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let path = Self::path(profile)?;
        let contents = fs::read_to_string(&path)
            .map_err(|err| format!("cannot load config {}: {err}; run `skylark login` first", path.display()))?;
        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|err| format!("cannot parse config {}: {err}", path.display()))?;
        if config.service.is_empty() {
            config.service = DEFAULT_SERVICE.to_string();
        }
        Ok(config)
    }

    /// Persists the config for a profile.
    pub fn save(&self, profile: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
        let path = Self::path(profile)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Lists the names of saved profiles.
    pub fn profiles() -> Result<Vec<String>, Box<dyn Error>> {
        let dir = Self::dir()?;
        let mut names = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(profile) = name
                .strip_prefix("config-")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                names.push(profile.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path of the credential file for this config's account.
    pub fn credential_path(&self) -> Result<PathBuf, Box<dyn Error>> {
        Ok(Self::dir()?.join(format!("{}.auth", self.identifier)))
    }

    /// Stream endpoint URL, with the resume cursor attached when given.
    pub fn stream_url(&self) -> Result<url::Url, Box<dyn Error>> {
        let base = self.stream_service.as_deref().unwrap_or(&self.service);
        let mut url = url::Url::parse(base)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            _ => "wss",
        };
        url.set_scheme(scheme).map_err(|()| "cannot set scheme")?;
        url.set_path("/xrpc/stream.subscribeRepos");
        Ok(url)
    }
}
