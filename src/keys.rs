//! Key codes, key aliases and the event type passed between threads.

use std::collections::HashMap;
use std::time::Instant;

use evdev::Key;
use once_cell::sync::Lazy;

/// Sentinel code for the `*` alias. A `Key` binding containing this code
/// emits the physical key that triggered it.
pub const WILDCARD_KEY: u16 = u16::MAX;

// ------------------ KeyValue --------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyValue {
    Release = 0,
    Press = 1,
}

impl From<i32> for KeyValue {
    fn from(item: i32) -> Self {
        match item {
            0 => Self::Release,
            _ => Self::Press,
        }
    }
}

// ------------------ KeyEvent --------------------

/// A single key press or release, stamped with the monotonic time at which it
/// was read from the device. `hold_key` is false for everything coming out of
/// a reader; only the tap-hold handler sets it, to mark events that belong to
/// the hold face of a tap-hold binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub value: KeyValue,
    pub time: Instant,
    pub hold_key: bool,
}

impl KeyEvent {
    pub fn new(code: u16, value: KeyValue, time: Instant) -> Self {
        Self {
            code,
            value,
            time,
            hold_key: false,
        }
    }

    pub fn is_press(&self) -> bool {
        self.value == KeyValue::Press
    }
}

// ------------------ Aliases --------------------

/// The names usable in configuration files, in canonical-first order. The
/// reversed map picks the first entry for each code, so canonical names must
/// precede any alternative spelling of the same code.
static ALIASES: &[(&str, u16)] = &[
    ("esc", Key::KEY_ESC.0),
    ("1", Key::KEY_1.0),
    ("2", Key::KEY_2.0),
    ("3", Key::KEY_3.0),
    ("4", Key::KEY_4.0),
    ("5", Key::KEY_5.0),
    ("6", Key::KEY_6.0),
    ("7", Key::KEY_7.0),
    ("8", Key::KEY_8.0),
    ("9", Key::KEY_9.0),
    ("0", Key::KEY_0.0),
    ("minus", Key::KEY_MINUS.0),
    ("equal", Key::KEY_EQUAL.0),
    ("backspace", Key::KEY_BACKSPACE.0),
    ("tab", Key::KEY_TAB.0),
    ("q", Key::KEY_Q.0),
    ("w", Key::KEY_W.0),
    ("e", Key::KEY_E.0),
    ("r", Key::KEY_R.0),
    ("t", Key::KEY_T.0),
    ("y", Key::KEY_Y.0),
    ("u", Key::KEY_U.0),
    ("i", Key::KEY_I.0),
    ("o", Key::KEY_O.0),
    ("p", Key::KEY_P.0),
    ("leftbrace", Key::KEY_LEFTBRACE.0),
    ("rightbrace", Key::KEY_RIGHTBRACE.0),
    ("enter", Key::KEY_ENTER.0),
    ("leftctrl", Key::KEY_LEFTCTRL.0),
    ("a", Key::KEY_A.0),
    ("s", Key::KEY_S.0),
    ("d", Key::KEY_D.0),
    ("f", Key::KEY_F.0),
    ("g", Key::KEY_G.0),
    ("h", Key::KEY_H.0),
    ("j", Key::KEY_J.0),
    ("k", Key::KEY_K.0),
    ("l", Key::KEY_L.0),
    ("semicolon", Key::KEY_SEMICOLON.0),
    ("apostrophe", Key::KEY_APOSTROPHE.0),
    ("grave", Key::KEY_GRAVE.0),
    ("leftshift", Key::KEY_LEFTSHIFT.0),
    ("backslash", Key::KEY_BACKSLASH.0),
    ("z", Key::KEY_Z.0),
    ("x", Key::KEY_X.0),
    ("c", Key::KEY_C.0),
    ("v", Key::KEY_V.0),
    ("b", Key::KEY_B.0),
    ("n", Key::KEY_N.0),
    ("m", Key::KEY_M.0),
    ("comma", Key::KEY_COMMA.0),
    ("dot", Key::KEY_DOT.0),
    ("slash", Key::KEY_SLASH.0),
    ("rightshift", Key::KEY_RIGHTSHIFT.0),
    ("kpasterisk", Key::KEY_KPASTERISK.0),
    ("leftalt", Key::KEY_LEFTALT.0),
    ("space", Key::KEY_SPACE.0),
    ("capslock", Key::KEY_CAPSLOCK.0),
    ("f1", Key::KEY_F1.0),
    ("f2", Key::KEY_F2.0),
    ("f3", Key::KEY_F3.0),
    ("f4", Key::KEY_F4.0),
    ("f5", Key::KEY_F5.0),
    ("f6", Key::KEY_F6.0),
    ("f7", Key::KEY_F7.0),
    ("f8", Key::KEY_F8.0),
    ("f9", Key::KEY_F9.0),
    ("f10", Key::KEY_F10.0),
    ("f11", Key::KEY_F11.0),
    ("f12", Key::KEY_F12.0),
    ("numlock", Key::KEY_NUMLOCK.0),
    ("scrolllock", Key::KEY_SCROLLLOCK.0),
    ("kp0", Key::KEY_KP0.0),
    ("kp1", Key::KEY_KP1.0),
    ("kp2", Key::KEY_KP2.0),
    ("kp3", Key::KEY_KP3.0),
    ("kp4", Key::KEY_KP4.0),
    ("kp5", Key::KEY_KP5.0),
    ("kp6", Key::KEY_KP6.0),
    ("kp7", Key::KEY_KP7.0),
    ("kp8", Key::KEY_KP8.0),
    ("kp9", Key::KEY_KP9.0),
    ("kpminus", Key::KEY_KPMINUS.0),
    ("kpplus", Key::KEY_KPPLUS.0),
    ("kpdot", Key::KEY_KPDOT.0),
    ("kpenter", Key::KEY_KPENTER.0),
    ("kpslash", Key::KEY_KPSLASH.0),
    ("rightctrl", Key::KEY_RIGHTCTRL.0),
    ("rightalt", Key::KEY_RIGHTALT.0),
    ("home", Key::KEY_HOME.0),
    ("up", Key::KEY_UP.0),
    ("pageup", Key::KEY_PAGEUP.0),
    ("left", Key::KEY_LEFT.0),
    ("right", Key::KEY_RIGHT.0),
    ("end", Key::KEY_END.0),
    ("down", Key::KEY_DOWN.0),
    ("pagedown", Key::KEY_PAGEDOWN.0),
    ("insert", Key::KEY_INSERT.0),
    ("delete", Key::KEY_DELETE.0),
    ("mute", Key::KEY_MUTE.0),
    ("volumedown", Key::KEY_VOLUMEDOWN.0),
    ("volumeup", Key::KEY_VOLUMEUP.0),
    ("pause", Key::KEY_PAUSE.0),
    ("leftmeta", Key::KEY_LEFTMETA.0),
    ("rightmeta", Key::KEY_RIGHTMETA.0),
    ("compose", Key::KEY_COMPOSE.0),
    ("print", Key::KEY_SYSRQ.0),
    ("menu", Key::KEY_MENU.0),
    ("playpause", Key::KEY_PLAYPAUSE.0),
    ("nextsong", Key::KEY_NEXTSONG.0),
    ("previoussong", Key::KEY_PREVIOUSSONG.0),
    ("stopcd", Key::KEY_STOPCD.0),
    ("brightnessdown", Key::KEY_BRIGHTNESSDOWN.0),
    ("brightnessup", Key::KEY_BRIGHTNESSUP.0),
    ("*", WILDCARD_KEY),
];

/// Mouse button names usable in `button` bindings.
static BUTTONS: &[(&str, u16)] = &[
    ("left", Key::BTN_LEFT.0),
    ("right", Key::BTN_RIGHT.0),
    ("middle", Key::BTN_MIDDLE.0),
    ("side", Key::BTN_SIDE.0),
    ("extra", Key::BTN_EXTRA.0),
    ("forward", Key::BTN_FORWARD.0),
    ("back", Key::BTN_BACK.0),
];

static ALIAS_TO_CODE: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| ALIASES.iter().copied().collect());

static CODE_TO_ALIAS: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for &(name, code) in ALIASES {
        m.entry(code).or_insert(name);
    }
    m
});

static BUTTON_TO_CODE: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| BUTTONS.iter().copied().collect());

/// Resolves a key name from the config to its evdev code.
pub fn key_code(alias: &str) -> Option<u16> {
    ALIAS_TO_CODE.get(alias).copied()
}

/// Reverse of [`key_code`], for diagnostics and the `key` environment
/// variable of exec bindings.
pub fn key_alias(code: u16) -> Option<&'static str> {
    CODE_TO_ALIAS.get(&code).copied()
}

/// Resolves a mouse button name to its evdev code.
pub fn button_code(name: &str) -> Option<u16> {
    BUTTON_TO_CODE.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_round_trip() {
        let code = key_code("a").unwrap();
        assert_eq!(code, 30);
        assert_eq!(key_alias(code), Some("a"));
    }

    #[test]
    fn unknown_alias() {
        assert_eq!(key_code("not-a-key"), None);
    }

    #[test]
    fn wildcard_alias() {
        assert_eq!(key_code("*"), Some(WILDCARD_KEY));
    }

    #[test]
    fn buttons_resolve() {
        assert_eq!(button_code("left"), Some(0x110));
        assert_eq!(button_code("up"), None);
    }
}
