//! External collaborators the registry consults but does not own.
//!
//! - [`GameCatalog`]: descriptive metadata, used to enrich listings.
//! - [`DescriptorResolver`]: maps a game's working directory to its canonical id.
//! - [`HostNameProvider`]: the name this machine advertises in listings.
//!
//! Each has one concrete implementation driven by [`ServerConfig`](crate::config::ServerConfig).

pub mod catalog;
pub mod descriptor;
pub mod host;

pub use catalog::StaticCatalog;
pub use descriptor::ManifestResolver;
pub use host::ConfiguredHostName;

use crate::config::ServerConfig;
use gamehub_core::{GameInfo, RelayResult};
use std::path::Path;
use std::sync::Arc;

/// Read-only game metadata lookup. A miss is not an error.
pub trait GameCatalog: Send + Sync {
    fn lookup(&self, game_id: &str) -> Option<GameInfo>;
}

/// Resolves a game directory to a canonical game id.
pub trait DescriptorResolver: Send + Sync {
    fn resolve(&self, dir: &Path) -> RelayResult<String>;
}

/// Supplies the host name shown in listings.
pub trait HostNameProvider: Send + Sync {
    fn host_name(&self) -> String;
}

/// The collaborator set handed to the registry.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn GameCatalog>,
    pub resolver: Arc<dyn DescriptorResolver>,
    pub host: Arc<dyn HostNameProvider>,
}

impl Collaborators {
    /// Build the default collaborators from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            catalog: Arc::new(StaticCatalog::new(config.games.clone())),
            resolver: Arc::new(ManifestResolver::new()),
            host: Arc::new(ConfiguredHostName::new(config.host_name.clone())),
        }
    }
}
