// Shared now-playing cache, written by the listener and read by whoever renders it

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::mpris::metadata::Metadata;

/// Baseline for elapsed-time display. Restarted whenever the track changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    pub since: Instant,
    /// Number of resets so far.
    pub epoch: u64,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            since: Instant::now(),
            epoch: 0,
        }
    }

    pub fn reset(&mut self) {
        self.since = Instant::now();
        self.epoch += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.since.elapsed()
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    meta: Metadata,
    ticker: Ticker,
}

/// Lock-protected metadata of the active player.
///
/// The lock is only ever held while fields are copied in or out.
#[derive(Debug, Default)]
pub struct MetadataCache {
    state: Mutex<CacheState>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Metadata {
        self.lock().meta.clone()
    }

    pub fn ticker(&self) -> Ticker {
        self.lock().ticker
    }

    /// Snapshot and ticker read under one lock, so they always agree.
    pub fn snapshot_with_ticker(&self) -> (Metadata, Ticker) {
        let state = self.lock();
        (state.meta.clone(), state.ticker)
    }

    /// Merges a partial update from the active player.
    ///
    /// Song data replaces the record and implies playback; a changed track restarts the
    /// ticker. Playback data only touches the playing flag.
    pub fn apply_delta(&self, delta: &Metadata) {
        let mut state = self.lock();
        if delta.got_song_data {
            if !state.meta.same_track(delta) {
                state.ticker.reset();
            }
            state.meta = delta.clone();
            state.meta.playing = true;
        }
        if delta.got_playback_data {
            state.meta.playing = delta.playing;
            state.meta.got_playback_data = true;
        }
    }

    /// Replaces the record wholesale, as on a player switch.
    pub fn replace(&self, meta: Metadata, force_reset: bool) {
        let mut state = self.lock();
        if force_reset || !state.meta.same_track(&meta) {
            state.ticker.reset();
        }
        state.meta = meta;
    }

    pub fn clear(&self) {
        self.lock().meta.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, artist: &str, album: &str) -> Metadata {
        let mut meta = Metadata::default();
        meta.assign("xesam:title", title);
        meta.assign("xesam:artist", artist);
        meta.assign("xesam:album", album);
        meta.refresh_validity();
        meta
    }

    fn playback(status: &str) -> Metadata {
        let mut meta = Metadata::default();
        meta.assign("PlaybackStatus", status);
        meta
    }

    #[test]
    fn new_song_resets_ticker_and_forces_playing() {
        let cache = MetadataCache::new();
        cache.apply_delta(&song("One", "A", "X"));
        let first = cache.ticker();
        assert_eq!(first.epoch, 1);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.title, "One");
        assert!(snapshot.playing);

        cache.apply_delta(&song("Two", "A", "X"));
        assert_eq!(cache.ticker().epoch, 2);
        assert_eq!(cache.snapshot().title, "Two");
    }

    #[test]
    fn same_song_keeps_ticker() {
        let cache = MetadataCache::new();
        cache.apply_delta(&song("One", "A", "X"));
        let mut with_art = song("One", "A", "X");
        with_art.assign("mpris:artUrl", "file:///cover.png");
        cache.apply_delta(&with_art);
        assert_eq!(cache.ticker().epoch, 1);
        assert_eq!(cache.snapshot().art_url, "file:///cover.png");
    }

    #[test]
    fn playback_only_never_resets_ticker() {
        let cache = MetadataCache::new();
        cache.apply_delta(&song("One", "A", "X"));
        let before = cache.ticker();

        cache.apply_delta(&playback("Paused"));
        cache.apply_delta(&playback("Playing"));
        cache.apply_delta(&playback("Stopped"));
        assert_eq!(cache.ticker(), before);

        let snapshot = cache.snapshot();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.title, "One");
        assert_eq!(snapshot.artists, "A");
    }

    #[test]
    fn song_with_paused_status_stays_paused() {
        let cache = MetadataCache::new();
        let mut delta = song("One", "A", "X");
        delta.assign("PlaybackStatus", "Paused");
        cache.apply_delta(&delta);
        assert!(!cache.snapshot().playing);
    }

    #[test]
    fn replace_resets_only_when_forced_or_changed() {
        let cache = MetadataCache::new();
        cache.replace(song("One", "A", "X"), false);
        assert_eq!(cache.ticker().epoch, 1);

        cache.replace(song("One", "A", "X"), false);
        assert_eq!(cache.ticker().epoch, 1);

        cache.replace(song("One", "A", "X"), true);
        assert_eq!(cache.ticker().epoch, 2);
    }

    #[test]
    fn clear_empties_record() {
        let cache = MetadataCache::new();
        cache.apply_delta(&song("One", "A", "X"));
        cache.clear();
        assert_eq!(cache.snapshot(), Metadata::default());
    }
}
