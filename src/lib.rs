//! Live "now playing" metadata for the active MPRIS player on the session bus.
//!
//! [`NowPlaying`] subscribes to player registration and property-change signals and keeps a
//! [`MetadataCache`] current; consumers read it with [`NowPlaying::snapshot`] or through the
//! shared cache handle.

pub mod mpris;
pub mod player;

pub use mpris::NowPlaying;
pub use mpris::connection::{DBusConnection, MprisError, PlayerBus};
pub use mpris::events::BusSignal;
pub use mpris::metadata::{Metadata, PropertiesUpdate};
pub use mpris::tracker::PlayerTracker;
pub use player::{MetadataCache, Ticker};
