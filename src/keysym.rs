//! Toolkit-neutral key symbols.
//!
//! Key codes are X11 keysyms: printable Latin-1 characters are their own code
//! point, everything else lives in the `0xff00` block. GTK hands these out
//! directly; other toolkits translate at the adapter boundary.

use crate::event::ModState;
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

pub const SPACE: u32 = 0x0020;
pub const BACKSPACE: u32 = 0xff08;
pub const TAB: u32 = 0xff09;
pub const RETURN: u32 = 0xff0d;
pub const ESCAPE: u32 = 0xff1b;
pub const HOME: u32 = 0xff50;
pub const LEFT: u32 = 0xff51;
pub const UP: u32 = 0xff52;
pub const RIGHT: u32 = 0xff53;
pub const DOWN: u32 = 0xff54;
pub const PAGE_UP: u32 = 0xff55;
pub const PAGE_DOWN: u32 = 0xff56;
pub const END: u32 = 0xff57;
pub const INSERT: u32 = 0xff63;
pub const MODE_SWITCH: u32 = 0xff7e;
pub const KP_ENTER: u32 = 0xff8d;
pub const F1: u32 = 0xffbe;
pub const F12: u32 = 0xffc9;
pub const SHIFT_L: u32 = 0xffe1;
pub const SHIFT_R: u32 = 0xffe2;
pub const CONTROL_L: u32 = 0xffe3;
pub const CONTROL_R: u32 = 0xffe4;
pub const CAPS_LOCK: u32 = 0xffe5;
pub const ALT_L: u32 = 0xffe9;
pub const ALT_R: u32 = 0xffea;
pub const HYPER_R: u32 = 0xffee;
pub const ISO_LEVEL3_SHIFT: u32 = 0xfe03;
pub const DELETE: u32 = 0xffff;

/// Longest decoded text a key event carries, in bytes.
pub const MAX_TEXT_LEN: usize = 3;

lazy_static! {
    static ref KEY_NAMES: [(u32, &'static str); 28] = [
        (SPACE, "space"),
        (BACKSPACE, "BackSpace"),
        (TAB, "Tab"),
        (RETURN, "Return"),
        (ESCAPE, "Escape"),
        (HOME, "Home"),
        (LEFT, "Left"),
        (UP, "Up"),
        (RIGHT, "Right"),
        (DOWN, "Down"),
        (PAGE_UP, "Page_Up"),
        (PAGE_DOWN, "Page_Down"),
        (END, "End"),
        (INSERT, "Insert"),
        (KP_ENTER, "KP_Enter"),
        (DELETE, "Delete"),
        (SHIFT_L, "Shift_L"),
        (SHIFT_R, "Shift_R"),
        (CONTROL_L, "Control_L"),
        (CONTROL_R, "Control_R"),
        (CAPS_LOCK, "Caps_Lock"),
        (0xffe6, "Shift_Lock"),
        (0xffe7, "Meta_L"),
        (0xffe8, "Meta_R"),
        (ALT_L, "Alt_L"),
        (ALT_R, "Alt_R"),
        (0xffeb, "Super_L"),
        (0xffec, "Super_R"),
    ];
    static ref NAME_LOOKUP: HashMap<String, u32> = {
        let mut map: HashMap<String, u32> = KEY_NAMES
            .iter()
            .map(|(code, name)| (name.to_lowercase(), *code))
            .collect();
        for n in 0..12 {
            map.insert(format!("f{}", n + 1), F1 + n);
        }
        // Short names accepted in trigger strings such as `Ctrl-Enter`.
        for (alias, code) in [
            ("enter", RETURN),
            ("esc", ESCAPE),
            ("bs", BACKSPACE),
            ("del", DELETE),
            ("pgup", PAGE_UP),
            ("pgdn", PAGE_DOWN),
            ("pageup", PAGE_UP),
            ("pagedown", PAGE_DOWN),
        ] {
            map.insert(alias.to_string(), code);
        }
        map
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerParseError {
    #[error("empty key description")]
    Empty,
    #[error("unknown modifier: {0}")]
    UnknownModifier(String),
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// True for keysyms that only change modifier state.
pub fn is_modifier(code: u32) -> bool {
    (SHIFT_L..=HYPER_R).contains(&code) || code == MODE_SWITCH || code == ISO_LEVEL3_SHIFT
}

/// Text the OS would have delivered for this keysym, at most [`MAX_TEXT_LEN`] bytes.
pub fn text_for(code: u32) -> String {
    match code {
        BACKSPACE => "\u{8}".to_string(),
        TAB => "\t".to_string(),
        RETURN | KP_ENTER => "\r".to_string(),
        ESCAPE => "\u{1b}".to_string(),
        DELETE => "\u{7f}".to_string(),
        0x20..=0x7e | 0xa0..=0xff => char::from_u32(code).map(String::from).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Human readable name of a keysym.
pub fn name_of(code: u32) -> String {
    if let Some((_, name)) = KEY_NAMES.iter().find(|(c, _)| *c == code) {
        return name.to_string();
    }
    if (F1..=F12).contains(&code) {
        return format!("F{}", code - F1 + 1);
    }
    match char::from_u32(code) {
        Some(c) if (0x21..=0x7e).contains(&code) || (0xa1..=0xff).contains(&code) => c.to_string(),
        _ => format!("0x{code:x}"),
    }
}

/// Inverse of [`name_of`]. Names are matched case-insensitively, except that a
/// single character is taken literally.
pub fn code_of(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let code = c as u32;
        if (0x21..=0x7e).contains(&code) || (0xa1..=0xff).contains(&code) {
            return Some(code);
        }
    }
    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    NAME_LOOKUP.get(&name.to_lowercase()).copied()
}

/// Formats a trigger the way it is shown to the user, e.g. `Ctrl-Shift-F5`.
pub fn describe(code: u32, state: ModState) -> String {
    let mut out = String::new();
    if state.control() {
        out.push_str("Ctrl-");
    }
    if state.alt() {
        out.push_str("Alt-");
    }
    if state.shift() {
        out.push_str("Shift-");
    }
    out.push_str(&name_of(code));
    out
}

/// Parses `Ctrl-Alt-x` style descriptions back into a keysym and modifier state.
pub fn parse_trigger(text: &str) -> Result<(u32, ModState), TriggerParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TriggerParseError::Empty);
    }
    // A trailing '-' is the minus key itself, as in "Ctrl--".
    let (prefix, key) = match text.strip_suffix("--") {
        Some(rest) => (rest, "-"),
        None => match text.rsplit_once('-') {
            Some((prefix, key)) if !key.is_empty() => (prefix, key),
            _ => ("", text),
        },
    };

    let mut state = ModState::NONE;
    for part in prefix.split('-').filter(|p| !p.is_empty()) {
        state = state
            | match part.to_lowercase().as_str() {
                "ctrl" | "control" | "^" => ModState::CONTROL,
                "alt" | "mod1" | "!" => ModState::ALT,
                "shift" | "+" => ModState::SHIFT,
                _ => return Err(TriggerParseError::UnknownModifier(part.to_string())),
            };
    }
    let code = code_of(key).ok_or_else(|| TriggerParseError::UnknownKey(key.to_string()))?;
    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_keysyms() {
        assert!(is_modifier(SHIFT_L));
        assert!(is_modifier(CONTROL_R));
        assert!(is_modifier(ALT_L));
        assert!(is_modifier(ISO_LEVEL3_SHIFT));
        assert!(!is_modifier(RETURN));
        assert!(!is_modifier('a' as u32));
    }

    #[test]
    fn test_decoded_text() {
        assert_eq!(text_for('a' as u32), "a");
        assert_eq!(text_for('A' as u32), "A");
        assert_eq!(text_for(RETURN), "\r");
        assert_eq!(text_for(0xe9), "é");
        assert_eq!(text_for(SHIFT_L), "");
        assert_eq!(text_for(F1), "");
        assert!(text_for(0xff).len() <= MAX_TEXT_LEN);
    }

    #[test]
    fn test_names() {
        assert_eq!(name_of('1' as u32), "1");
        assert_eq!(name_of(SPACE), "space");
        assert_eq!(name_of(F1 + 4), "F5");
        assert_eq!(name_of(RETURN), "Return");
        assert_eq!(name_of(0x1234), "0x1234");

        assert_eq!(code_of("F5"), Some(F1 + 4));
        assert_eq!(code_of("return"), Some(RETURN));
        assert_eq!(code_of("Enter"), Some(RETURN));
        assert_eq!(code_of("A"), Some('A' as u32));
        assert_eq!(code_of("0x1234"), Some(0x1234));
        assert_eq!(code_of("nonsense"), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe('1' as u32, ModState::CONTROL), "Ctrl-1");
        assert_eq!(
            describe(F1 + 4, ModState::CONTROL | ModState::SHIFT | ModState::ALT),
            "Ctrl-Alt-Shift-F5"
        );
        assert_eq!(describe('x' as u32, ModState::NONE), "x");
    }

    #[test]
    fn test_parse_trigger() {
        assert_eq!(parse_trigger("Ctrl-1"), Ok(('1' as u32, ModState::CONTROL)));
        assert_eq!(
            parse_trigger("shift-alt-F5"),
            Ok((F1 + 4, ModState::SHIFT | ModState::ALT))
        );
        assert_eq!(parse_trigger("Ctrl--"), Ok(('-' as u32, ModState::CONTROL)));
        assert_eq!(parse_trigger("-"), Ok(('-' as u32, ModState::NONE)));
        assert_eq!(parse_trigger(""), Err(TriggerParseError::Empty));
        assert_eq!(
            parse_trigger("Hyper-x"),
            Err(TriggerParseError::UnknownModifier("Hyper".to_string()))
        );
        assert!(matches!(parse_trigger("Ctrl-bogus"), Err(TriggerParseError::UnknownKey(_))));
    }

    #[test]
    fn test_describe_parse_agree() {
        for (code, state) in [
            ('1' as u32, ModState::CONTROL),
            (RETURN, ModState::SHIFT),
            (F12, ModState::ALT | ModState::CONTROL),
            ('-' as u32, ModState::CONTROL),
        ] {
            assert_eq!(parse_trigger(&describe(code, state)), Ok((code, state)));
        }
    }
}
