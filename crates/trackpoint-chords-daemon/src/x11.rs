//! X11 backends for key injection and the click/cursor mode switch
//!
//! This module uses:
//! - XTest `FakeInput` to send modifier keys to whatever has focus
//! - the core pointer mapping to turn buttons 1-3 into no-ops
//! - XFixes to hide and show the cursor

use std::rc::Rc;

use anyhow::{bail, Context, Result};
use trackpoint_chords_config::{Keysym, KeysConfig};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{
    ConnectionExt as _, Keycode, MappingStatus, Window, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use crate::chord::ModifierKey;
use crate::diff::KeySink;
use crate::machine::ModeSwitch;

/// Buttons whose clicks are disabled in remap mode
const REMAPPED_BUTTONS: usize = 3;

/// Connect to the display and build both collaborators on one connection.
///
/// The connection stays open for the life of the process: XFixes undoes a
/// hidden cursor as soon as the hiding client disconnects.
pub fn connect(keys: &KeysConfig) -> Result<(X11Keys, X11Pointer)> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 display")?;
    let root = conn.setup().roots[screen_num].root;
    let conn = Rc::new(conn);

    let version = conn
        .xfixes_query_version(4, 0)
        .context("XFixes extension not available")?
        .reply()
        .context("Failed to negotiate XFixes version")?;
    tracing::debug!(
        "XFixes {}.{}",
        version.major_version,
        version.minor_version
    );

    let keys = X11Keys::new(Rc::clone(&conn), keys)?;
    let pointer = X11Pointer {
        conn,
        root,
        snapshot: None,
    };

    Ok((keys, pointer))
}

/// Sends modifier keys through XTest.
pub struct X11Keys {
    conn: Rc<RustConnection>,
    /// Keycodes in `ModifierKey::ALL` order, `None` when the keysym is unmapped
    keycodes: [Option<Keycode>; 4],
}

impl X11Keys {
    fn new(conn: Rc<RustConnection>, keys: &KeysConfig) -> Result<Self> {
        let setup = conn.setup();
        let (min_keycode, max_keycode) = (setup.min_keycode, setup.max_keycode);

        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)?
            .reply()
            .context("Failed to read keyboard mapping")?;

        let mut keycodes = [None; 4];
        for (slot, key) in keycodes.iter_mut().zip(ModifierKey::ALL) {
            let keysym = configured_keysym(keys, key);
            *slot = find_keycode(
                min_keycode,
                mapping.keysyms_per_keycode,
                &mapping.keysyms,
                keysym.value,
            );

            match slot {
                Some(code) => tracing::debug!("{} -> {} (keycode {})", key, keysym.name, code),
                None => tracing::warn!(
                    "Keysym {} for {} is not in the keyboard mapping; {} will not be sent",
                    keysym.name,
                    key,
                    key
                ),
            }
        }

        Ok(Self { conn, keycodes })
    }

    fn send(&mut self, key: ModifierKey, event_type: u8) -> Result<()> {
        let Some(keycode) = self.keycodes[index_of(key)] else {
            bail!("no keycode for {}", key);
        };

        self.conn
            .xtest_fake_input(
                event_type,
                keycode,
                x11rb::CURRENT_TIME,
                x11rb::NONE,
                0,
                0,
                0,
            )?
            .check()
            .context("XTest FakeInput failed")?;
        Ok(())
    }
}

impl KeySink for X11Keys {
    fn press(&mut self, key: ModifierKey) -> Result<()> {
        self.send(key, KEY_PRESS_EVENT)
    }

    fn release(&mut self, key: ModifierKey) -> Result<()> {
        self.send(key, KEY_RELEASE_EVENT)
    }
}

/// Switches native clicks via the core pointer mapping and hides the cursor.
pub struct X11Pointer {
    conn: Rc<RustConnection>,
    root: Window,
    /// Mapping in effect before clicks were disabled
    snapshot: Option<Vec<u8>>,
}

impl X11Pointer {
    fn set_mapping(&self, map: &[u8]) -> Result<()> {
        let status = self
            .conn
            .set_pointer_mapping(map)?
            .reply()
            .context("SetPointerMapping failed")?
            .status;

        match status {
            MappingStatus::SUCCESS => Ok(()),
            // A button is held down; the server refuses until it is released
            MappingStatus::BUSY => bail!("pointer mapping busy"),
            other => bail!("pointer mapping rejected ({:?})", other),
        }
    }
}

impl ModeSwitch for X11Pointer {
    fn set_native_clicks_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            let Some(previous) = &self.snapshot else {
                tracing::debug!("Clicks were never disabled, leaving pointer mapping as is");
                return Ok(());
            };
            self.set_mapping(previous)?;
            tracing::debug!("Pointer mapping restored to {:?}", previous);
            self.snapshot = None;
        } else {
            let current = self
                .conn
                .get_pointer_mapping()?
                .reply()
                .context("GetPointerMapping failed")?
                .map;
            let disabled = disabled_mapping(&current);
            self.set_mapping(&disabled)?;
            tracing::debug!("Pointer mapping {:?} -> {:?}", current, disabled);
            self.snapshot = Some(current);
        }
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> Result<()> {
        let cookie = if visible {
            self.conn.xfixes_show_cursor(self.root)?
        } else {
            self.conn.xfixes_hide_cursor(self.root)?
        };
        cookie.check().context("XFixes cursor request failed")?;
        Ok(())
    }
}

fn configured_keysym(keys: &KeysConfig, key: ModifierKey) -> &Keysym {
    match key {
        ModifierKey::Control => &keys.control,
        ModifierKey::Shift => &keys.shift,
        ModifierKey::Level3 => &keys.level3,
        ModifierKey::Level5 => &keys.level5,
    }
}

fn index_of(key: ModifierKey) -> usize {
    match key {
        ModifierKey::Control => 0,
        ModifierKey::Shift => 1,
        ModifierKey::Level3 => 2,
        ModifierKey::Level5 => 3,
    }
}

/// `current` with the first three buttons mapped to nothing.
pub fn disabled_mapping(current: &[u8]) -> Vec<u8> {
    current
        .iter()
        .enumerate()
        .map(|(i, &button)| if i < REMAPPED_BUTTONS { 0 } else { button })
        .collect()
}

/// First keycode whose row in a `GetKeyboardMapping` reply holds `keysym`.
pub fn find_keycode(
    min_keycode: Keycode,
    keysyms_per_keycode: u8,
    keysyms: &[u32],
    keysym: u32,
) -> Option<Keycode> {
    if keysyms_per_keycode == 0 {
        return None;
    }

    keysyms
        .chunks(keysyms_per_keycode as usize)
        .position(|row| row.contains(&keysym))
        .and_then(|row| Keycode::try_from(row + min_keycode as usize).ok())
}
