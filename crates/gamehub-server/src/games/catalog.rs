//! In-memory game catalog loaded from the `[[games]]` config entries.

use super::GameCatalog;
use gamehub_core::GameInfo;
use std::collections::HashMap;
use tracing::debug;

pub struct StaticCatalog {
    games: HashMap<String, GameInfo>,
}

impl StaticCatalog {
    /// Later entries with a duplicate id win.
    pub fn new(games: Vec<GameInfo>) -> Self {
        let games: HashMap<String, GameInfo> =
            games.into_iter().map(|g| (g.id.clone(), g)).collect();
        debug!(count = games.len(), "game catalog loaded");
        Self { games }
    }
}

impl GameCatalog for StaticCatalog {
    fn lookup(&self, game_id: &str) -> Option<GameInfo> {
        self.games.get(game_id).cloned()
    }
}
