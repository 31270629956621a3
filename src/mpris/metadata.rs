//! Track metadata record and the decoding of MPRIS property payloads into it.

use dbus::arg::{ArgType, Iter};
use dbus::message::Message;
use log::debug;

use crate::mpris::connection::{MprisError, PLAYER_INTERFACE};

/// Now-playing state of one player.
///
/// `got_song_data` and `got_playback_data` record which kind of fields a partial update
/// carried, so applying it only overwrites what it actually knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub artists: String,
    pub album: String,
    pub art_url: String,
    pub playing: bool,
    pub got_song_data: bool,
    pub got_playback_data: bool,
    pub valid: bool,
}

impl Metadata {
    /// Assigns a single resolved property. Unknown keys are ignored.
    pub fn assign(&mut self, key: &str, value: &str) {
        debug!("Assigning metadata: {key} -> {value}");
        match key {
            "PlaybackStatus" => {
                self.playing = value == "Playing";
                self.got_playback_data = true;
            }
            "xesam:title" => {
                self.title = value.to_string();
                self.got_song_data = true;
                self.valid = true;
            }
            "xesam:artist" => {
                self.artists = value.to_string();
                self.got_song_data = true;
                self.valid = true;
            }
            "xesam:album" => {
                self.album = value.to_string();
                self.got_song_data = true;
                self.valid = true;
            }
            "mpris:artUrl" => {
                self.art_url = value.to_string();
                self.got_song_data = true;
            }
            _ => {}
        }
    }

    pub fn refresh_validity(&mut self) {
        self.valid = !self.artists.is_empty() || !self.title.is_empty();
    }

    /// Same song, judged by artist, album and title.
    pub fn same_track(&self, other: &Metadata) -> bool {
        self.artists == other.artists && self.album == other.album && self.title == other.title
    }

    pub fn clear(&mut self) {
        *self = Metadata::default();
    }
}

/// A decoded `PropertiesChanged` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesUpdate {
    /// Interface the change applies to. The delta is empty unless this is the player interface.
    pub interface: String,
    pub delta: Metadata,
}

impl PropertiesUpdate {
    pub fn is_player(&self) -> bool {
        self.interface == PLAYER_INTERFACE
    }
}

/// Decodes `(s interface, a{sv} changed, as invalidated)` into a metadata delta.
pub fn parse_properties_changed(msg: &Message) -> Result<PropertiesUpdate, MprisError> {
    let mut iter = msg.iter_init();
    let interface: &str = iter
        .get()
        .ok_or_else(|| MprisError::Malformed("interface name is not a string".into()))?;
    let mut update = PropertiesUpdate {
        interface: interface.to_string(),
        delta: Metadata::default(),
    };
    if !update.is_player() {
        return Ok(update);
    }

    iter.next();
    let mut changed = iter
        .recurse(ArgType::Array)
        .ok_or_else(|| MprisError::Malformed("changed properties is not a map".into()))?;
    let delta = &mut update.delta;
    for_each_entry(&mut changed, |key, mut value| match key {
        "Metadata" => apply_metadata_map(value, delta),
        "PlaybackStatus" => {
            if let Some(status) = stringify(&mut value) {
                delta.assign(key, &status);
            }
        }
        _ => {}
    });
    update.delta.refresh_validity();
    Ok(update)
}

/// Applies the reply of `Properties.Get(PLAYER_INTERFACE, property)` to `meta`.
pub fn apply_property_reply(
    reply: &Message,
    property: &str,
    meta: &mut Metadata,
) -> Result<(), MprisError> {
    let mut value = unwrap_variant(reply.iter_init());
    if value.arg_type() == ArgType::Array {
        apply_metadata_map(value, meta);
        return Ok(());
    }
    match stringify(&mut value) {
        Some(v) => {
            meta.assign(property, &v);
            Ok(())
        }
        None => Err(MprisError::Malformed(format!(
            "unexpected reply type for {property}: {:?}",
            value.arg_type()
        ))),
    }
}

/// Walks a metadata value in both shapes players have been seen to send it.
///
/// The strict pass reads an `a{sv}` dictionary; the loose pass reads an array of
/// `(key, value)` pairs. Each pass is a no-op on the shape meant for the other one.
fn apply_metadata_map(mut value: Iter<'_>, meta: &mut Metadata) {
    if value.arg_type() != ArgType::Array {
        return;
    }
    if let Some(mut map) = value.recurse(ArgType::Array) {
        for_each_entry(&mut map, |key, mut v| {
            if let Some(s) = stringify_or_join(&mut v) {
                meta.assign(key, &s);
            }
        });
    }
    if let Some(mut pairs) = value.recurse(ArgType::Array) {
        for_each_pair(&mut pairs, |key, mut v| {
            if let Some(s) = stringify_or_join(&mut v) {
                meta.assign(key, &s);
            }
        });
    }
}

/// Calls `f` for every string-keyed dict entry, with variants already unwrapped.
fn for_each_entry<'a>(map: &mut Iter<'a>, mut f: impl FnMut(&'a str, Iter<'a>)) {
    while map.arg_type() == ArgType::DictEntry {
        if let Some(mut entry) = map.recurse(ArgType::DictEntry) {
            if let Some(key) = entry.get::<&str>() {
                entry.next();
                f(key, unwrap_variant(entry));
            }
        }
        if !map.next() {
            break;
        }
    }
}

/// Calls `f` for every `(s, v)` struct, bare or boxed in a variant. Dict entries are skipped.
fn for_each_pair<'a>(items: &mut Iter<'a>, mut f: impl FnMut(&'a str, Iter<'a>)) {
    loop {
        let pair = match items.arg_type() {
            ArgType::Struct => items.recurse(ArgType::Struct),
            ArgType::Variant => items
                .recurse(ArgType::Variant)
                .and_then(|mut inner| inner.recurse(ArgType::Struct)),
            _ => None,
        };
        if let Some(mut pair) = pair {
            if let Some(key) = pair.get::<&str>() {
                pair.next();
                f(key, unwrap_variant(pair));
            }
        }
        if !items.next() {
            break;
        }
    }
}

fn unwrap_variant(mut it: Iter<'_>) -> Iter<'_> {
    while it.arg_type() == ArgType::Variant {
        match it.recurse(ArgType::Variant) {
            Some(inner) => it = inner,
            None => break,
        }
    }
    it
}

/// A primitive as text, or a list of primitives joined with ", ".
fn stringify_or_join(it: &mut Iter<'_>) -> Option<String> {
    if it.arg_type() != ArgType::Array {
        return stringify(it);
    }
    let mut items = it.recurse(ArgType::Array)?;
    let mut joined = String::new();
    loop {
        let item = if items.arg_type() == ArgType::Variant {
            items
                .recurse(ArgType::Variant)
                .and_then(|mut inner| stringify(&mut inner))
        } else {
            stringify(&mut items)
        };
        if let Some(s) = item {
            if !joined.is_empty() {
                joined.push_str(", ");
            }
            joined.push_str(&s);
        }
        if !items.next() {
            break;
        }
    }
    Some(joined)
}

fn stringify(it: &mut Iter<'_>) -> Option<String> {
    match it.arg_type() {
        ArgType::String | ArgType::ObjectPath | ArgType::Signature => {
            it.get_refarg()?.as_str().map(str::to_string)
        }
        ArgType::Boolean => it.get::<bool>().map(|b| b.to_string()),
        ArgType::Double => it.get::<f64>().map(|d| d.to_string()),
        ArgType::UInt64 => it.get::<u64>().map(|n| n.to_string()),
        ArgType::Byte
        | ArgType::Int16
        | ArgType::UInt16
        | ArgType::Int32
        | ArgType::UInt32
        | ArgType::Int64 => it.get_refarg()?.as_i64().map(|n| n.to_string()),
        _ => None,
    }
}
