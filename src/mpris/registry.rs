//! Known MPRIS players and the connection currently owning each name.

use std::collections::BTreeMap;

use log::debug;

use crate::mpris::connection::{MprisError, PlayerBus, is_player_name};

/// Result of applying a `NameOwnerChanged` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerChange {
    /// Not an MPRIS name.
    Ignored,
    /// Name appeared or moved to a new owner.
    Registered,
    /// Name lost its owner and was dropped.
    Departed,
}

/// Bus names of players, in lexical order, mapped to their owner's unique name.
#[derive(Debug, Default, Clone)]
pub struct PlayerRegistry {
    owners: BTreeMap<String, String>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from what is on the bus right now.
    ///
    /// Names whose owner can't be resolved (typically already gone) are skipped.
    pub fn refresh<B: PlayerBus + ?Sized>(&mut self, bus: &B) -> Result<(), MprisError> {
        let names = bus.list_names()?;
        self.owners.clear();
        for name in names.into_iter().filter(|n| is_player_name(n)) {
            match bus.name_owner(&name) {
                Ok(owner) => {
                    self.owners.insert(name, owner);
                }
                Err(e) => debug!("Skipping {name}: {e}"),
            }
        }
        Ok(())
    }

    pub fn apply_owner_change(&mut self, name: &str, new_owner: &str) -> OwnerChange {
        if !is_player_name(name) {
            return OwnerChange::Ignored;
        }
        if new_owner.is_empty() {
            self.owners.remove(name);
            OwnerChange::Departed
        } else {
            self.owners.insert(name.to_string(), new_owner.to_string());
            OwnerChange::Registered
        }
    }

    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.owners.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
