//! Reconciles registry changes and property updates into the shared cache.

use std::sync::Arc;

use log::{debug, info};

use crate::mpris::connection::{MprisError, PlayerBus};
use crate::mpris::metadata::{Metadata, PropertiesUpdate};
use crate::mpris::registry::{OwnerChange, PlayerRegistry};
use crate::mpris::selector::{fetch_metadata, select_active_player};
use crate::player::MetadataCache;

/// Listener-side state: which players exist and which one is displayed.
///
/// Idle while `active` is `None`, tracking otherwise.
pub struct PlayerTracker<B: PlayerBus + ?Sized> {
    bus: Arc<B>,
    cache: Arc<MetadataCache>,
    registry: PlayerRegistry,
    requested: Option<String>,
    active: Option<String>,
}

impl<B: PlayerBus + ?Sized> PlayerTracker<B> {
    /// `requested` is a full bus name, see [`requested_bus_name`](crate::mpris::selector::requested_bus_name).
    pub fn new(bus: Arc<B>, cache: Arc<MetadataCache>, requested: Option<String>) -> Self {
        Self {
            bus,
            cache,
            registry: PlayerRegistry::new(),
            requested,
            active: None,
        }
    }

    pub fn active_player(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn refresh_registry(&mut self) -> Result<(), MprisError> {
        self.registry.refresh(&*self.bus)
    }

    /// Runs selection and returns the chosen player's snapshot.
    fn select(&mut self) -> Metadata {
        let selection =
            select_active_player(&*self.bus, &self.registry, self.requested.as_deref());
        self.active = selection.player;
        selection.metadata
    }

    /// Re-selects from scratch and writes the result into the cache.
    pub fn resync(&mut self) {
        let meta = self.select();
        self.cache.replace(meta, true);
    }

    /// Re-queries the active player, or re-selects when idle.
    pub fn refresh(&mut self) {
        match self.active.as_deref() {
            Some(active) => {
                let meta = fetch_metadata(&*self.bus, active);
                self.cache.replace(meta, false);
            }
            None => self.resync(),
        }
    }

    /// Handles a decoded `PropertiesChanged`. Returns false when it wasn't about a player.
    pub fn handle_properties_changed(&mut self, sender: &str, update: PropertiesUpdate) -> bool {
        if !update.is_player() {
            return false;
        }
        let mut delta = update.delta;
        if self.active.is_none() {
            delta = self.select();
        }
        let Some(active) = self.active.as_deref() else {
            return true;
        };

        if self.registry.owner_of(active) == Some(sender) {
            self.cache.apply_delta(&delta);
        } else {
            debug!("Ignoring properties from {sender}, active player is {active}");
        }
        true
    }

    /// Handles a decoded `NameOwnerChanged`. Returns false for non-player names.
    pub fn handle_name_owner_changed(
        &mut self,
        name: &str,
        old_owner: &str,
        new_owner: &str,
    ) -> bool {
        match self.registry.apply_owner_change(name, new_owner) {
            OwnerChange::Ignored => false,
            OwnerChange::Registered => {
                debug!("{name} owner: '{old_owner}' -> '{new_owner}'");
                if self.requested.as_deref() == Some(name) {
                    info!("Requested player {name} is available");
                    self.resync();
                }
                true
            }
            OwnerChange::Departed => {
                if self.active.as_deref() == Some(name) {
                    info!("Active player {name} went away");
                    let meta = self.select();
                    self.cache.replace(meta, false);
                }
                true
            }
        }
    }
}
