//! Signal topics, their decoding, and the background dispatch loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use dbus::message::{MatchRule, Message};
use log::{debug, warn};

use crate::mpris::connection::{
    DBUS_NAME, MPRIS_PATH, MprisError, PROPERTIES_INTERFACE, PlayerBus,
};
use crate::mpris::metadata::{PropertiesUpdate, parse_properties_changed};
use crate::mpris::tracker::PlayerTracker;

/// How long one loop iteration waits for traffic before checking the stop flag again.
pub const GRACE: Duration = Duration::from_millis(100);

/// The signals the listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    PropertiesChanged,
    NameOwnerChanged,
}

impl Topic {
    pub fn match_rule(self) -> MatchRule<'static> {
        match self {
            Topic::PropertiesChanged => {
                MatchRule::new_signal(PROPERTIES_INTERFACE, "PropertiesChanged").with_path(MPRIS_PATH)
            }
            Topic::NameOwnerChanged => {
                MatchRule::new_signal(DBUS_NAME, "NameOwnerChanged").with_sender(DBUS_NAME)
            }
        }
    }

    pub fn decode(self, msg: &Message) -> Result<BusSignal, MprisError> {
        match self {
            Topic::PropertiesChanged => Ok(BusSignal::PropertiesChanged {
                sender: msg.sender().map(|s| s.to_string()).unwrap_or_default(),
                update: parse_properties_changed(msg)?,
            }),
            Topic::NameOwnerChanged => {
                let mut iter = msg.iter_init();
                let mut fields = Vec::with_capacity(3);
                while let Some(field) = iter.get::<&str>() {
                    fields.push(field.to_string());
                    if !iter.next() {
                        break;
                    }
                }
                let [name, old_owner, new_owner]: [String; 3] =
                    fields.try_into().map_err(|fields: Vec<String>| {
                        MprisError::Malformed(format!(
                            "NameOwnerChanged with {} string fields",
                            fields.len()
                        ))
                    })?;
                Ok(BusSignal::NameOwnerChanged {
                    name,
                    old_owner,
                    new_owner,
                })
            }
        }
    }
}

/// A decoded signal, ready for the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusSignal {
    PropertiesChanged {
        /// Unique name of the sending connection.
        sender: String,
        update: PropertiesUpdate,
    },
    NameOwnerChanged {
        name: String,
        old_owner: String,
        new_owner: String,
    },
}

impl BusSignal {
    pub fn topic(&self) -> Topic {
        match self {
            BusSignal::PropertiesChanged { .. } => Topic::PropertiesChanged,
            BusSignal::NameOwnerChanged { .. } => Topic::NameOwnerChanged,
        }
    }
}

/// Routes one signal to its handler. Returns whether it was relevant.
pub fn dispatch<B: PlayerBus + ?Sized>(tracker: &mut PlayerTracker<B>, signal: BusSignal) -> bool {
    match signal {
        BusSignal::PropertiesChanged { sender, update } => {
            tracker.handle_properties_changed(&sender, update)
        }
        BusSignal::NameOwnerChanged {
            name,
            old_owner,
            new_owner,
        } => tracker.handle_name_owner_changed(&name, &old_owner, &new_owner),
    }
}

pub(crate) fn lock_tracker<B: PlayerBus + ?Sized>(
    tracker: &Mutex<PlayerTracker<B>>,
) -> MutexGuard<'_, PlayerTracker<B>> {
    tracker.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pumps the bus and handles queued signals until `stop` is set.
pub(crate) fn run_loop<B: PlayerBus + ?Sized>(
    bus: &B,
    tracker: &Mutex<PlayerTracker<B>>,
    signals: &Receiver<BusSignal>,
    stop: &AtomicBool,
) {
    let mut failing = false;
    while !stop.load(Ordering::Acquire) {
        match bus.process(GRACE) {
            Ok(()) => failing = false,
            Err(e) => {
                if !failing {
                    warn!("Processing D-Bus messages failed: {e}");
                    failing = true;
                }
                thread::sleep(GRACE);
            }
        }
        while let Ok(signal) = signals.try_recv() {
            let topic = signal.topic();
            let mut tracker = lock_tracker(tracker);
            if !dispatch(&mut *tracker, signal) {
                debug!("Unhandled {topic:?} signal");
            }
        }
    }
    debug!("Listener loop stopped");
}
