//! Game descriptor lookup from a game's working directory.
//!
//! A game directory carries a `game.json` manifest whose `gameId` field is
//! the canonical id for every instance launched from that directory.

use super::DescriptorResolver;
use gamehub_core::{RelayError, RelayResult};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Manifest file name looked up inside a game directory.
pub const MANIFEST_FILE: &str = "game.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    game_id: String,
}

/// Reads [`MANIFEST_FILE`] from the given directory.
#[derive(Debug, Default)]
pub struct ManifestResolver;

impl ManifestResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorResolver for ManifestResolver {
    fn resolve(&self, dir: &Path) -> RelayResult<String> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RelayError::Descriptor(format!("cannot read {}: {e}", path.display()))
        })?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            RelayError::Descriptor(format!("cannot parse {}: {e}", path.display()))
        })?;
        if manifest.game_id.trim().is_empty() {
            return Err(RelayError::Descriptor(format!(
                "{} has no gameId",
                path.display()
            )));
        }
        debug!(dir = %dir.display(), game_id = %manifest.game_id, "resolved game descriptor");
        Ok(manifest.game_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_game_id_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"gameId": "space-race", "name": "Space Race"}"#,
        )
        .unwrap();

        let id = ManifestResolver::new().resolve(dir.path()).unwrap();
        assert_eq!(id, "space-race");
    }

    #[test]
    fn missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestResolver::new().resolve(dir.path()).unwrap_err();
        assert!(matches!(err, RelayError::Descriptor(_)));
    }

    #[test]
    fn malformed_or_empty_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        std::fs::write(&path, "not json").unwrap();
        assert!(ManifestResolver::new().resolve(dir.path()).is_err());

        std::fs::write(&path, r#"{"gameId": "  "}"#).unwrap();
        assert!(ManifestResolver::new().resolve(dir.path()).is_err());
    }
}
