#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use nowplaying::mpris::connection::PLAYER_INTERFACE;
use nowplaying::{BusSignal, Metadata, MetadataCache, MprisError, PlayerBus, PropertiesUpdate};

pub const PREFIX: &str = "org.mpris.MediaPlayer2.";

pub fn bus_name(short: &str) -> String {
    format!("{PREFIX}{short}")
}

#[derive(Default)]
struct FakePlayer {
    metadata: Vec<(String, String)>,
    status: String,
}

#[derive(Default)]
struct FakeState {
    other_names: Vec<String>,
    owners: HashMap<String, String>,
    players: HashMap<String, FakePlayer>,
    queries: Vec<String>,
    tx: Option<Sender<BusSignal>>,
    subscribed: usize,
    unsubscribed: usize,
}

/// In-memory stand-in for the session bus.
#[derive(Default)]
pub struct FakeBus {
    state: Mutex<FakeState>,
}

impl FakeBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Registers a player owned by `owner` that answers property queries.
    pub fn add_player(&self, short: &str, owner: &str, title: &str, artist: &str, status: &str) {
        let name = bus_name(short);
        let mut state = self.state();
        state.owners.insert(name.clone(), owner.to_string());
        state.players.insert(
            name,
            FakePlayer {
                metadata: vec![
                    ("xesam:title".into(), title.into()),
                    ("xesam:artist".into(), artist.into()),
                    ("xesam:album".into(), format!("{title} album")),
                ],
                status: status.to_string(),
            },
        );
    }

    /// A registered name whose properties can't be read.
    pub fn add_mute_player(&self, short: &str, owner: &str) {
        self.state().owners.insert(bus_name(short), owner.to_string());
    }

    pub fn add_other_name(&self, name: &str) {
        self.state().other_names.push(name.to_string());
    }

    pub fn set_status(&self, short: &str, status: &str) {
        if let Some(player) = self.state().players.get_mut(&bus_name(short)) {
            player.status = status.to_string();
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    pub fn clear_queries(&self) {
        self.state().queries.clear();
    }

    pub fn subscriptions(&self) -> (usize, usize) {
        let state = self.state();
        (state.subscribed, state.unsubscribed)
    }

    /// Delivers a signal as if it arrived from the bus. False when nobody listens.
    pub fn emit(&self, signal: BusSignal) -> bool {
        match &self.state().tx {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }
}

impl PlayerBus for FakeBus {
    fn list_names(&self) -> Result<Vec<String>, MprisError> {
        let state = self.state();
        let mut names = state.other_names.clone();
        names.extend(state.owners.keys().cloned());
        Ok(names)
    }

    fn name_owner(&self, name: &str) -> Result<String, MprisError> {
        self.state()
            .owners
            .get(name)
            .cloned()
            .ok_or_else(|| MprisError::Request(format!("{name} has no owner")))
    }

    fn player_property(
        &self,
        player: &str,
        property: &str,
        meta: &mut Metadata,
    ) -> Result<(), MprisError> {
        let mut state = self.state();
        state.queries.push(format!("{player} {property}"));
        let fake = state
            .players
            .get(player)
            .ok_or_else(|| MprisError::Request(format!("{player} does not answer")))?;
        match property {
            "Metadata" => {
                for (key, value) in &fake.metadata {
                    meta.assign(key, value);
                }
            }
            "PlaybackStatus" => meta.assign(property, &fake.status),
            _ => {}
        }
        Ok(())
    }

    fn subscribe(&self, tx: Sender<BusSignal>) -> Result<(), MprisError> {
        let mut state = self.state();
        state.tx = Some(tx);
        state.subscribed += 1;
        Ok(())
    }

    fn unsubscribe(&self) {
        let mut state = self.state();
        state.tx = None;
        state.unsubscribed += 1;
    }

    fn process(&self, timeout: Duration) -> Result<(), MprisError> {
        thread::sleep(timeout.min(Duration::from_millis(5)));
        Ok(())
    }
}

pub fn properties(sender: &str, delta: Metadata) -> BusSignal {
    BusSignal::PropertiesChanged {
        sender: sender.to_string(),
        update: PropertiesUpdate {
            interface: PLAYER_INTERFACE.to_string(),
            delta,
        },
    }
}

pub fn owner_changed(name: &str, old_owner: &str, new_owner: &str) -> BusSignal {
    BusSignal::NameOwnerChanged {
        name: name.to_string(),
        old_owner: old_owner.to_string(),
        new_owner: new_owner.to_string(),
    }
}

pub fn song(title: &str, artist: &str) -> Metadata {
    let mut meta = Metadata::default();
    meta.assign("xesam:title", title);
    meta.assign("xesam:artist", artist);
    meta.refresh_validity();
    meta
}

pub fn status(value: &str) -> Metadata {
    let mut meta = Metadata::default();
    meta.assign("PlaybackStatus", value);
    meta.refresh_validity();
    meta
}

/// Polls `cond` against the cache until it holds or two seconds pass.
pub fn wait_for(cache: &MetadataCache, cond: impl Fn(&Metadata) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond(&cache.snapshot()) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
