//! Key event table: textual key specs to terminal input bytes
//!
//! Spec grammar: `[press:|repeat:|release:][MOD+]...KEY`, modifiers `ctrl`,
//! `alt`, `shift`, `super`. Encoding follows the legacy xterm conventions and
//! depends on the window's cursor-key mode (DECCKM).

use std::str::FromStr;

use textcast_core::CoreError;

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mods {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub sup: bool,
}

impl Mods {
    /// xterm modifier parameter, 1 when no modifier is held
    fn param(&self) -> u8 {
        1 + self.shift as u8 + 2 * self.alt as u8 + 4 * self.ctrl as u8 + 8 * self.sup as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

impl Key {
    fn named(name: &str) -> Option<Key> {
        let key = match name.to_ascii_lowercase().as_str() {
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "backspace" => Key::Backspace,
            "escape" | "esc" => Key::Escape,
            "space" => Key::Space,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "page_up" | "pageup" => Key::PageUp,
            "page_down" | "pagedown" => Key::PageDown,
            "insert" => Key::Insert,
            "delete" => Key::Delete,
            lower => {
                let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                Key::F(n)
            }
        };
        Some(key)
    }
}

/// Decoded key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub mods: Mods,
    pub key: Key,
}

impl FromStr for KeyEvent {
    type Err = CoreError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidKeyEvent(spec.to_string());

        let (action, combo) = match spec.split_once(':') {
            Some(("press", rest)) => (KeyAction::Press, rest),
            Some(("repeat", rest)) => (KeyAction::Repeat, rest),
            Some(("release", rest)) => (KeyAction::Release, rest),
            _ => (KeyAction::Press, spec),
        };

        let (mods_part, key_part) = if combo == "+" {
            ("", "+")
        } else if let Some(m) = combo.strip_suffix("++") {
            (m, "+")
        } else {
            combo.rsplit_once('+').unwrap_or(("", combo))
        };

        let mut mods = Mods::default();
        for m in mods_part.split('+').filter(|m| !m.is_empty()) {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => mods.ctrl = true,
                "alt" | "opt" | "option" => mods.alt = true,
                "shift" => mods.shift = true,
                "super" | "cmd" => mods.sup = true,
                _ => return Err(invalid()),
            }
        }

        let mut chars = key_part.chars();
        let key = match (chars.next(), chars.next()) {
            (Some(c), None) => Key::Char(c),
            (Some(_), Some(_)) => Key::named(key_part).ok_or_else(invalid)?,
            (None, _) => return Err(invalid()),
        };

        Ok(KeyEvent { action, mods, key })
    }
}

impl KeyEvent {
    /// Bytes a terminal would send for this key, empty if it sends nothing
    pub fn encode(&self, application_cursor: bool) -> Vec<u8> {
        if self.action == KeyAction::Release {
            return Vec::new();
        }
        let m = self.mods.param();
        match self.key {
            Key::Up => cursor_key(b'A', m, application_cursor),
            Key::Down => cursor_key(b'B', m, application_cursor),
            Key::Right => cursor_key(b'C', m, application_cursor),
            Key::Left => cursor_key(b'D', m, application_cursor),
            Key::Home => cursor_key(b'H', m, application_cursor),
            Key::End => cursor_key(b'F', m, application_cursor),
            Key::Insert => tilde_key(2, m),
            Key::Delete => tilde_key(3, m),
            Key::PageUp => tilde_key(5, m),
            Key::PageDown => tilde_key(6, m),
            Key::F(n @ 1..=4) => {
                let fin = b'P' + (n - 1);
                if m > 1 {
                    format!("\x1b[1;{}{}", m, fin as char).into_bytes()
                } else {
                    vec![ESC, b'O', fin]
                }
            }
            Key::F(n) => {
                let code = match n {
                    5 => 15,
                    6 => 17,
                    7 => 18,
                    8 => 19,
                    9 => 20,
                    10 => 21,
                    11 => 23,
                    _ => 24,
                };
                tilde_key(code, m)
            }
            Key::Tab if self.mods.shift => b"\x1b[Z".to_vec(),
            Key::Tab => self.with_alt(vec![b'\t']),
            Key::Enter => self.with_alt(vec![b'\r']),
            Key::Escape => self.with_alt(vec![ESC]),
            Key::Backspace if self.mods.ctrl => self.with_alt(vec![0x08]),
            Key::Backspace => self.with_alt(vec![0x7f]),
            Key::Space if self.mods.ctrl => self.with_alt(vec![0]),
            Key::Space => self.with_alt(vec![b' ']),
            Key::Char(c) => self.with_alt(self.encode_char(c)),
        }
    }

    fn encode_char(&self, c: char) -> Vec<u8> {
        if self.mods.ctrl {
            if let Some(byte) = ctrl_byte(c) {
                return vec![byte];
            }
        }
        let c = if self.mods.shift { c.to_ascii_uppercase() } else { c };
        c.to_string().into_bytes()
    }

    fn with_alt(&self, bytes: Vec<u8>) -> Vec<u8> {
        if self.mods.alt {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(ESC);
            out.extend(bytes);
            out
        } else {
            bytes
        }
    }
}

fn ctrl_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' | 'A'..='Z' => Some(c.to_ascii_lowercase() as u8 - b'a' + 1),
        '@' | '2' => Some(0),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '/' => Some(0x1f),
        '?' | '8' => Some(0x7f),
        _ => None,
    }
}

fn cursor_key(fin: u8, m: u8, application_cursor: bool) -> Vec<u8> {
    if m > 1 {
        format!("\x1b[1;{}{}", m, fin as char).into_bytes()
    } else if application_cursor {
        vec![ESC, b'O', fin]
    } else {
        vec![ESC, b'[', fin]
    }
}

fn tilde_key(code: u8, m: u8) -> Vec<u8> {
    if m > 1 {
        format!("\x1b[{};{}~", code, m).into_bytes()
    } else {
        format!("\x1b[{}~", code).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(spec: &str, app_cursor: bool) -> Vec<u8> {
        spec.parse::<KeyEvent>().unwrap().encode(app_cursor)
    }

    #[test]
    fn test_parse_modifiers_and_action() {
        let key: KeyEvent = "release:ctrl+shift+a".parse().unwrap();
        assert_eq!(key.action, KeyAction::Release);
        assert!(key.mods.ctrl && key.mods.shift && !key.mods.alt);
        assert_eq!(key.key, Key::Char('a'));
    }

    #[test]
    fn test_parse_plus_key() {
        assert_eq!("+".parse::<KeyEvent>().unwrap().key, Key::Char('+'));
        let key: KeyEvent = "ctrl++".parse().unwrap();
        assert!(key.mods.ctrl);
        assert_eq!(key.key, Key::Char('+'));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!("hyper+a".parse::<KeyEvent>(), Err(CoreError::InvalidKeyEvent(_))));
        assert!(matches!("f13".parse::<KeyEvent>(), Err(CoreError::InvalidKeyEvent(_))));
        assert!(matches!("ctrl+".parse::<KeyEvent>(), Err(CoreError::InvalidKeyEvent(_))));
        assert!(matches!("".parse::<KeyEvent>(), Err(CoreError::InvalidKeyEvent(_))));
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(enc("ctrl+c", false), vec![0x03]);
        assert_eq!(enc("ctrl+[", false), vec![0x1b]);
        assert_eq!(enc("enter", false), b"\r");
        assert_eq!(enc("alt+x", false), b"\x1bx");
        assert_eq!(enc("shift+a", false), b"A");
    }

    #[test]
    fn test_cursor_keys_follow_mode() {
        assert_eq!(enc("up", false), b"\x1b[A");
        assert_eq!(enc("up", true), b"\x1bOA");
        assert_eq!(enc("ctrl+left", true), b"\x1b[1;5D");
    }

    #[test]
    fn test_function_and_tilde_keys() {
        assert_eq!(enc("f1", false), b"\x1bOP");
        assert_eq!(enc("shift+f2", false), b"\x1b[1;2Q");
        assert_eq!(enc("f5", false), b"\x1b[15~");
        assert_eq!(enc("delete", false), b"\x1b[3~");
        assert_eq!(enc("alt+page_up", false), b"\x1b[5;3~");
    }

    #[test]
    fn test_release_encodes_nothing() {
        assert!(enc("release:a", false).is_empty());
    }
}
