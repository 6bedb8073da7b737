//! Host name advertised in game listings.

use super::HostNameProvider;

const FALLBACK_HOST_NAME: &str = "localhost";

/// Uses the configured name, else `$HOSTNAME`, else `localhost`.
#[derive(Debug, Clone)]
pub struct ConfiguredHostName {
    name: String,
}

impl ConfiguredHostName {
    pub fn new(configured: Option<String>) -> Self {
        let name = configured
            .filter(|n| !n.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| FALLBACK_HOST_NAME.to_string());
        Self { name }
    }
}

impl HostNameProvider for ConfiguredHostName {
    fn host_name(&self) -> String {
        self.name.clone()
    }
}
