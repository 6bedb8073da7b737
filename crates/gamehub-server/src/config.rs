//! Server configuration: TOML file + CLI overrides.

use gamehub_core::{GameInfo, RelayError, RelayResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub games: Vec<GameEntry>,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default = "default_build_output_dir")]
    pub build_output_dir: String,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ports: default_ports(),
            host_name: None,
            build_output_dir: default_build_output_dir(),
            outbound_queue: default_outbound_queue(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// One `[[games]]` entry of the game catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct GameEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl From<GameEntry> for GameInfo {
    fn from(e: GameEntry) -> Self {
        GameInfo {
            id: e.id,
            name: e.name,
            description: e.description,
            icon_url: e.icon_url,
            kind: e.kind,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_ports() -> Vec<u16> {
    vec![18679]
}
fn default_build_output_dir() -> String {
    "dist".to_string()
}
fn default_outbound_queue() -> usize {
    64
}
fn default_max_frame_size() -> usize {
    1_048_576
}

/// Resolved server configuration (paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub ports: Vec<u16>,
    pub host_name: Option<String>,
    pub build_output_dir: String,
    pub outbound_queue: usize,
    pub max_frame_size: usize,
    pub games: Vec<GameInfo>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    ///
    /// Non-empty `cli_ports` replace the file's port list.
    pub fn load(
        config_path: Option<&Path>,
        cli_ports: &[u16],
        cli_bind: Option<&str>,
        cli_host_name: Option<&str>,
    ) -> RelayResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)
                        .map_err(|e| RelayError::Config(format!("config parse error: {e}")))?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        let mut config = Self::from_file(file_config);

        // Merge CLI overrides
        if !cli_ports.is_empty() {
            config.ports = cli_ports.to_vec();
        }
        if let Some(bind) = cli_bind {
            config.bind = bind.to_string();
        }
        if let Some(host) = cli_host_name {
            config.host_name = Some(host.to_string());
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            bind: file.server.bind,
            ports: file.server.ports,
            host_name: file.server.host_name,
            build_output_dir: file.server.build_output_dir,
            outbound_queue: file.server.outbound_queue,
            max_frame_size: file.server.max_frame_size,
            games: file.games.into_iter().map(GameInfo::from).collect(),
        }
    }

    fn validate(&self) -> RelayResult<()> {
        if self.ports.is_empty() {
            return Err(RelayError::Config("no listen ports configured".into()));
        }
        if self.outbound_queue == 0 {
            return Err(RelayError::Config("outbound_queue must be at least 1".into()));
        }
        if self.max_frame_size == 0 {
            return Err(RelayError::Config("max_frame_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
