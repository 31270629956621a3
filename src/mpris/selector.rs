//! Which registered player gets to own the displayed metadata.

use log::{debug, info};

use crate::mpris::connection::{MPRIS_PREFIX, PlayerBus};
use crate::mpris::metadata::Metadata;
use crate::mpris::registry::PlayerRegistry;

/// Expands a short player name like `spotify` to its full bus name.
///
/// Empty input means there is no preference.
pub fn requested_bus_name(player: &str) -> Option<String> {
    let player = player.trim();
    if player.is_empty() {
        None
    } else if player.starts_with(MPRIS_PREFIX) {
        Some(player.to_string())
    } else {
        Some(format!("{MPRIS_PREFIX}{player}"))
    }
}

/// Queries a player's metadata and playback status. A failed query counts as no data.
pub fn fetch_metadata<B: PlayerBus + ?Sized>(bus: &B, player: &str) -> Metadata {
    let mut meta = Metadata::default();
    for property in ["Metadata", "PlaybackStatus"] {
        if let Err(e) = bus.player_property(player, property, &mut meta) {
            debug!("Could not read {property} of {player}: {e}");
        }
    }
    meta.refresh_validity();
    meta
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub player: Option<String>,
    /// Fresh snapshot of the selected player, empty when none was selected.
    pub metadata: Metadata,
}

/// The requested player if it is registered, else the first one that is playing.
pub fn select_active_player<B: PlayerBus + ?Sized>(
    bus: &B,
    registry: &PlayerRegistry,
    requested: Option<&str>,
) -> Selection {
    if let Some(requested) = requested.filter(|name| registry.contains(name)) {
        info!("Selecting requested player: {requested}");
        return Selection {
            player: Some(requested.to_string()),
            metadata: fetch_metadata(bus, requested),
        };
    }

    for name in registry.names() {
        let metadata = fetch_metadata(bus, name);
        if metadata.playing {
            info!("Selecting fallback player: {name}");
            return Selection {
                player: Some(name.to_string()),
                metadata,
            };
        }
    }

    info!("No active players");
    Selection::default()
}
