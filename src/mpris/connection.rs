//! Session bus transport for MPRIS: the blocking request path and signal subscriptions.

use std::sync::Mutex;
use std::sync::mpsc::Sender;
use std::time::Duration;

use dbus::blocking::{BlockingSender, SyncConnection};
use dbus::channel::{MatchingReceiver, Token};
use dbus::message::Message;
use dbus::strings::BusName;
use log::{debug, info, warn};

use crate::mpris::events::{BusSignal, Topic};
use crate::mpris::metadata::{Metadata, apply_property_reply};

pub const TIMEOUT: Duration = Duration::from_millis(2000);

pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

pub(crate) const DBUS_NAME: &str = "org.freedesktop.DBus";
const DBUS_PATH: &str = "/org/freedesktop/DBus";

#[derive(thiserror::Error, Debug)]
pub enum MprisError {
    #[error("DBus error: {0}")]
    DBus(#[from] dbus::Error),
    #[error("No connection to D-Bus")]
    NoConnection,
    #[error("Invalid request: {0}")]
    Request(String),
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Failed to spawn listener thread: {0}")]
    ListenerThread(#[from] std::io::Error),
}

/// Whether a bus name belongs to the MPRIS player namespace.
pub fn is_player_name(name: &str) -> bool {
    name.starts_with(MPRIS_PREFIX)
}

/// What the synchronization core needs from the bus.
///
/// Requests block for at most [`TIMEOUT`]. A failed request is treated by callers
/// as "no data", never retried.
pub trait PlayerBus: Send + Sync {
    /// All names currently registered on the bus.
    fn list_names(&self) -> Result<Vec<String>, MprisError>;

    /// The unique connection name currently owning `name`.
    fn name_owner(&self, name: &str) -> Result<String, MprisError>;

    /// Reads one property of the player interface and assigns it into `meta`.
    fn player_property(
        &self,
        player: &str,
        property: &str,
        meta: &mut Metadata,
    ) -> Result<(), MprisError>;

    /// Installs both signal subscriptions, forwarding decoded signals to `tx`.
    fn subscribe(&self, tx: Sender<BusSignal>) -> Result<(), MprisError>;

    /// Removes whatever `subscribe` installed.
    fn unsubscribe(&self);

    /// Waits up to `timeout` for inbound traffic and routes it to the subscriptions.
    fn process(&self, timeout: Duration) -> Result<(), MprisError>;
}

/// [`PlayerBus`] backed by a blocking libdbus session connection.
pub struct DBusConnection {
    conn: SyncConnection,
    subscriptions: Mutex<Vec<(Token, String)>>,
}

impl DBusConnection {
    pub fn new_session() -> Result<Self, MprisError> {
        let conn = SyncConnection::new_session().map_err(|e| {
            warn!("Could not connect to the session bus: {e}");
            MprisError::NoConnection
        })?;
        info!("Connected to D-Bus as \"{}\"", conn.unique_name());
        Ok(Self {
            conn,
            subscriptions: Mutex::new(Vec::new()),
        })
    }
}

impl PlayerBus for DBusConnection {
    fn list_names(&self) -> Result<Vec<String>, MprisError> {
        let proxy = self.conn.with_proxy(DBUS_NAME, DBUS_PATH, TIMEOUT);
        let (names,): (Vec<String>,) = proxy.method_call(DBUS_NAME, "ListNames", ())?;
        Ok(names)
    }

    fn name_owner(&self, name: &str) -> Result<String, MprisError> {
        let proxy = self.conn.with_proxy(DBUS_NAME, DBUS_PATH, TIMEOUT);
        let (owner,): (String,) = proxy.method_call(DBUS_NAME, "GetNameOwner", (name,))?;
        Ok(owner)
    }

    fn player_property(
        &self,
        player: &str,
        property: &str,
        meta: &mut Metadata,
    ) -> Result<(), MprisError> {
        let dest = BusName::new(player).map_err(MprisError::Request)?;
        let msg = Message::new_method_call(dest, MPRIS_PATH, PROPERTIES_INTERFACE, "Get")
            .map_err(MprisError::Request)?
            .append2(PLAYER_INTERFACE, property);
        let reply = self.conn.send_with_reply_and_block(msg, TIMEOUT)?;
        apply_property_reply(&reply, property, meta)
    }

    fn subscribe(&self, tx: Sender<BusSignal>) -> Result<(), MprisError> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for topic in [Topic::PropertiesChanged, Topic::NameOwnerChanged] {
            let rule = topic.match_rule();
            let rule_str = rule.match_str();
            if let Err(e) = self.conn.add_match_no_cb(&rule_str) {
                warn!("Failed to add match rule {rule_str}: {e}");
                continue;
            }
            let tx = tx.clone();
            let token = self.conn.start_receive(
                rule,
                Box::new(move |msg: Message, _: &SyncConnection| {
                    match topic.decode(&msg) {
                        Ok(signal) => {
                            let _ = tx.send(signal);
                        }
                        Err(e) => debug!("Dropping {topic:?} signal: {e}"),
                    }
                    true
                }),
            );
            subscriptions.push((token, rule_str));
        }
        if subscriptions.is_empty() {
            return Err(MprisError::NoConnection);
        }
        Ok(())
    }

    fn unsubscribe(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for (token, rule_str) in subscriptions.drain(..) {
            self.conn.stop_receive(token);
            if let Err(e) = self.conn.remove_match_no_cb(&rule_str) {
                warn!("Failed to remove match rule {rule_str}: {e}");
            }
        }
    }

    fn process(&self, timeout: Duration) -> Result<(), MprisError> {
        self.conn.process(timeout)?;
        Ok(())
    }
}
