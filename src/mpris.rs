pub mod connection;
pub mod events;
pub mod metadata;
pub mod registry;
pub mod selector;
pub mod tracker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::player::{MetadataCache, Ticker};
use connection::{DBusConnection, MprisError, PlayerBus};
use events::{lock_tracker, run_loop};
use metadata::Metadata;
use selector::requested_bus_name;
use tracker::PlayerTracker;

/// Keeps a [`MetadataCache`] in sync with whichever MPRIS player is active.
///
/// Signals are handled on a background thread; dropping the listener stops it.
pub struct NowPlaying<B: PlayerBus + ?Sized + 'static> {
    bus: Arc<B>,
    cache: Arc<MetadataCache>,
    tracker: Arc<Mutex<PlayerTracker<B>>>,
    quit: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NowPlaying<DBusConnection> {
    /// Connects to the session bus and starts listening.
    ///
    /// `preferred` is a player name such as `spotify`; an empty string means no preference.
    pub fn connect(preferred: &str) -> Result<Self, MprisError> {
        let bus = Arc::new(DBusConnection::new_session()?);
        Self::start(bus, preferred)
    }
}

impl<B: PlayerBus + ?Sized + 'static> NowPlaying<B> {
    pub fn start(bus: Arc<B>, preferred: &str) -> Result<Self, MprisError> {
        let cache = Arc::new(MetadataCache::new());
        let tracker = Arc::new(Mutex::new(PlayerTracker::new(
            Arc::clone(&bus),
            Arc::clone(&cache),
            requested_bus_name(preferred),
        )));

        let (tx, rx) = mpsc::channel();
        bus.subscribe(tx)?;

        {
            let mut tracker = lock_tracker(&tracker);
            if let Err(e) = tracker.refresh_registry() {
                bus.unsubscribe();
                return Err(e);
            }
            debug!("Found {} players", tracker.registry().len());
            tracker.resync();
        }

        let quit = Arc::new(AtomicBool::new(false));
        let spawned = {
            let bus = Arc::clone(&bus);
            let tracker = Arc::clone(&tracker);
            let quit = Arc::clone(&quit);
            thread::Builder::new()
                .name("mpris-listener".into())
                .spawn(move || run_loop(&*bus, &*tracker, &rx, &*quit))
        };
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                bus.unsubscribe();
                return Err(MprisError::ListenerThread(e));
            }
        };
        info!("Listening for MPRIS players");

        Ok(Self {
            bus,
            cache,
            tracker,
            quit,
            thread: Some(thread),
        })
    }

    pub fn snapshot(&self) -> Metadata {
        self.cache.snapshot()
    }

    pub fn ticker(&self) -> Ticker {
        self.cache.ticker()
    }

    pub fn cache(&self) -> Arc<MetadataCache> {
        Arc::clone(&self.cache)
    }

    pub fn active_player(&self) -> Option<String> {
        lock_tracker(&self.tracker).active_player().map(str::to_string)
    }

    /// Synchronously re-reads the active player into the cache.
    pub fn refresh(&self) {
        lock_tracker(&self.tracker).refresh();
    }

    /// Stops the listener thread, waits for it, then drops the subscriptions.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.quit.store(true, Ordering::Release);
        if thread.join().is_err() {
            error!("Listener thread panicked");
        }
        self.bus.unsubscribe();
        info!("Stopped listening for MPRIS players");
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl<B: PlayerBus + ?Sized + 'static> Drop for NowPlaying<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
