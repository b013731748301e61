//! The macro file: a line-oriented text format holding one block per macro.
//!
//! ```text
//! # Ctrl-1 -> ab
//! #macro
//! KeyDown(0x31, 4, NULL)
//! KeyDown(0x61, 0, "Main.Viewport")
//! KeyUp(0x61, 0, "Main.Viewport")
//! BtnDown(1, 0, 120, 45, "Main.Viewport")
//! BtnUp(1, 0, 120, 45, "Main.Viewport")
//! #end macro
//! ```
//!
//! The first line of a block is the trigger. A block that fails to parse is
//! skipped up to its `#end macro`; other blocks are unaffected. Inside a quoted
//! widget path, `\`, `"`, newline and carriage return are backslash-escaped.

use crate::error::LineError;
use crate::event::{ButtonEvent, Event, EventKind, KeyEvent, ModState};
use crate::keymap::{KeyMap, KeyMapTable, Trigger};
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const BLOCK_START: &str = "#macro";
const BLOCK_END: &str = "#end macro";

lazy_static! {
    static ref TRIGGER_LINE: Regex =
        Regex::new(r"^KeyDown\(\s*(0[xX][0-9a-fA-F]+|\d+)\s*,\s*(\d+)\s*,\s*NULL\s*\)$").unwrap();
    static ref KEY_LINE: Regex = Regex::new(
        r#"^(KeyDown|KeyUp)\(\s*(0[xX][0-9a-fA-F]+|\d+)\s*,\s*(\d+)\s*,\s*(NULL|"(?:[^"\\]|\\.)*")\s*\)$"#
    )
    .unwrap();
    static ref BUTTON_LINE: Regex = Regex::new(
        r#"^(BtnDown|BtnUp)\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(NULL|"(?:[^"\\]|\\.)*")\s*\)$"#
    )
    .unwrap();
}

/// Renders the table. Mappings with an empty response are not written.
pub fn print_table(table: &KeyMapTable) -> String {
    let mut out = String::new();
    for map in table.iter().filter(|m| !m.is_empty()) {
        out.push_str(&print_keymap(map));
        out.push('\n');
    }
    out
}

pub fn print_keymap(map: &KeyMap) -> String {
    let trigger = map.trigger();
    let mut out = format!("# {} -> {}\n{BLOCK_START}\n", map.description(), map.shorthand());
    out.push_str(&format!("KeyDown(0x{:x}, {}, NULL)\n", trigger.keycode, trigger.state.bits()));
    for event in map.response() {
        out.push_str(&print_event(event));
        out.push('\n');
    }
    out.push_str(BLOCK_END);
    out.push('\n');
    out
}

pub fn print_event(event: &Event) -> String {
    match event {
        Event::Key(key) => format!(
            "{}(0x{:x}, {}, {})",
            if key.kind.is_press() { "KeyDown" } else { "KeyUp" },
            key.keycode,
            key.state.bits(),
            quote(&key.widget_path)
        ),
        Event::Button(button) => format!(
            "{}({}, {}, {}, {}, {})",
            if button.kind.is_press() { "BtnDown" } else { "BtnUp" },
            button.button,
            button.state.bits(),
            button.x,
            button.y,
            quote(&button.widget_path)
        ),
    }
}

fn quote(path: &str) -> String {
    if path.is_empty() {
        return "NULL".to_string();
    }
    let mut out = String::with_capacity(path.len() + 2);
    out.push('"');
    for c in path.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote(text: &str) -> String {
    let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) else {
        // NULL
        return String::new();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some(escaped) => out.push(escaped),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_code(text: &str, line: usize) -> Result<u32, LineError> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|_| LineError::BadNumber {
        line,
        text: text.to_string(),
    })
}

fn parse_int(text: &str, line: usize) -> Result<i32, LineError> {
    text.parse::<i32>().map_err(|_| LineError::BadNumber {
        line,
        text: text.to_string(),
    })
}

pub fn parse_trigger_line(text: &str, line: usize) -> Result<Trigger, LineError> {
    let caps = TRIGGER_LINE.captures(text).ok_or(LineError::BadTrigger { line })?;
    let keycode = parse_code(&caps[1], line)?;
    let state = ModState::from_bits(parse_code(&caps[2], line)?);
    Ok(Trigger::new(keycode, state))
}

pub fn parse_event_line(text: &str, line: usize) -> Result<Event, LineError> {
    if let Some(caps) = KEY_LINE.captures(text) {
        let kind = if &caps[1] == "KeyDown" { EventKind::Press } else { EventKind::Release };
        let keycode = parse_code(&caps[2], line)?;
        let state = ModState::from_bits(parse_code(&caps[3], line)?);
        return Ok(KeyEvent::new(keycode, state, kind, unquote(&caps[4])).into());
    }
    if let Some(caps) = BUTTON_LINE.captures(text) {
        let kind = if &caps[1] == "BtnDown" { EventKind::Press } else { EventKind::Release };
        let button = parse_code(&caps[2], line)?;
        let state = ModState::from_bits(parse_code(&caps[3], line)?);
        let x = parse_int(&caps[4], line)?;
        let y = parse_int(&caps[5], line)?;
        return Ok(ButtonEvent::new(button, state, kind, x, y, unquote(&caps[6])).into());
    }
    Err(LineError::BadEvent {
        line,
        text: text.to_string(),
    })
}

enum Block {
    Outside,
    Trigger,
    Body(Trigger, Vec<Event>),
    Skipping,
}

/// Parses macro file content. Returns the macros found and the number of
/// blocks that were skipped as malformed.
pub fn parse_table(content: &str) -> (KeyMapTable, usize) {
    let mut table = KeyMapTable::new();
    let mut malformed = 0;
    let mut block = Block::Outside;

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();

        if text == BLOCK_END {
            match std::mem::replace(&mut block, Block::Outside) {
                Block::Body(trigger, events) if events.is_empty() => {
                    debug!("line {line}: macro for {trigger} has no events, skipped");
                }
                Block::Body(trigger, events) => {
                    table.insert(KeyMap::new(trigger, events));
                }
                Block::Trigger => {
                    warn!("{}", LineError::BadTrigger { line });
                    malformed += 1;
                }
                Block::Outside | Block::Skipping => {}
            }
            continue;
        }

        if text == BLOCK_START {
            if matches!(block, Block::Trigger | Block::Body(..)) {
                warn!("{}", LineError::Unterminated { line });
                malformed += 1;
            }
            block = Block::Trigger;
            continue;
        }

        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let parsed = match &mut block {
            Block::Outside | Block::Skipping => continue,
            Block::Trigger => parse_trigger_line(text, line).map(|trigger| Some(Block::Body(trigger, Vec::new()))),
            Block::Body(_, events) => parse_event_line(text, line).map(|event| {
                events.push(event);
                None
            }),
        };
        match parsed {
            Ok(Some(next)) => block = next,
            Ok(None) => {}
            Err(e) => {
                warn!("{e}");
                malformed += 1;
                block = Block::Skipping;
            }
        }
    }

    if matches!(block, Block::Trigger | Block::Body(..)) {
        warn!("macro block not terminated by \"{BLOCK_END}\" at end of file");
        malformed += 1;
    }
    (table, malformed)
}

/// Reads a macro file. A file that does not exist yields an empty table.
pub fn read_file(path: &Path) -> Result<(KeyMapTable, usize)> {
    if !path.exists() {
        debug!("no macro file at {}", path.display());
        return Ok((KeyMapTable::new(), 0));
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read macro file {}", path.display()))?;
    Ok(parse_table(&content))
}

/// Path of the backup kept next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Writes the table to `path`. With `backup`, an existing file is first
/// copied to [`backup_path`].
pub fn write_file(path: &Path, table: &KeyMapTable, backup: bool) -> Result<()> {
    if backup && path.is_file() {
        let bak = backup_path(path);
        fs::copy(path, &bak).with_context(|| format!("failed to back up {} to {}", path.display(), bak.display()))?;
    }
    fs::write(path, print_table(table)).with_context(|| format!("failed to write macro file {}", path.display()))?;
    debug!("wrote {} macro(s) to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keysym;
    use indoc::indoc;

    const W: &str = "Main.Viewport";

    fn sample_table() -> KeyMapTable {
        let mut table = KeyMapTable::new();
        table.insert(KeyMap::new(
            Trigger::new('1' as u32, ModState::CONTROL),
            vec![
                KeyEvent::press('a' as u32, ModState::NONE, W).into(),
                KeyEvent::release('a' as u32, ModState::NONE, W).into(),
                KeyEvent::press('b' as u32, ModState::NONE, W).into(),
                KeyEvent::release('b' as u32, ModState::NONE, W).into(),
            ],
        ));
        table.insert(KeyMap::new(
            Trigger::new(keysym::F1 + 1, ModState::SHIFT | ModState::ALT),
            vec![
                ButtonEvent::press(1, ModState::SHIFT, 120, -4, "Main.Menu \"File\"").into(),
                ButtonEvent::release(1, ModState::SHIFT, 121, -4, "Main.Menu \"File\"").into(),
                KeyEvent::press(keysym::RETURN, ModState::NONE, "").into(),
            ],
        ));
        table
    }

    #[test]
    fn test_print_format() {
        let mut table = KeyMapTable::new();
        table.insert(KeyMap::new(
            Trigger::new('1' as u32, ModState::CONTROL),
            vec![
                KeyEvent::press('a' as u32, ModState::NONE, W).into(),
                KeyEvent::release('a' as u32, ModState::NONE, W).into(),
                ButtonEvent::press(3, ModState::CONTROL, 10, 20, W).into(),
            ],
        ));
        let expected = indoc! {r#"
            # Ctrl-1 -> a <Btn3>
            #macro
            KeyDown(0x31, 4, NULL)
            KeyDown(0x61, 0, "Main.Viewport")
            KeyUp(0x61, 0, "Main.Viewport")
            BtnDown(3, 4, 10, 20, "Main.Viewport")
            #end macro

        "#};
        assert_eq!(print_table(&table), expected);
    }

    #[test]
    fn test_print_parse_round_trip() {
        let table = sample_table();
        let (parsed, malformed) = parse_table(&print_table(&table));
        assert_eq!(malformed, 0);
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_random_tables_round_trip() {
        let mut rng = fastrand::Rng::with_seed(42);
        let paths = ["Main", "Main.Viewport", "Dialog.Ok", "", "odd \\ \"name\"", "two\nlines\r"];
        for _ in 0..50 {
            let mut table = KeyMapTable::new();
            for _ in 0..rng.usize(1..6) {
                let trigger = Trigger::new(rng.u32(0x21..0x7f), ModState::from_bits(rng.u32(0..16)));
                let events: Vec<Event> = (0..rng.usize(1..8))
                    .map(|_| {
                        let state = ModState::from_bits(rng.u32(0..256));
                        let kind = if rng.bool() { EventKind::Press } else { EventKind::Release };
                        let path = paths[rng.usize(0..paths.len())];
                        if rng.bool() {
                            KeyEvent::new(rng.u32(0x20..0x10000), state, kind, path).into()
                        } else {
                            ButtonEvent::new(rng.u32(1..6), state, kind, rng.i32(-500..500), rng.i32(-500..500), path)
                                .into()
                        }
                    })
                    .collect();
                table.insert(KeyMap::new(trigger, events));
            }
            let (parsed, malformed) = parse_table(&print_table(&table));
            assert_eq!(malformed, 0);
            assert_eq!(parsed, table);
            for (before, after) in table.iter().zip(parsed.iter()) {
                for (a, b) in before.response().iter().zip(after.response()) {
                    if let (Event::Key(a), Event::Key(b)) = (a, b) {
                        assert_eq!(a.text(), b.text());
                    }
                }
            }
        }
    }

    #[test]
    fn test_line_breaks_in_widget_path() {
        let mut table = KeyMapTable::new();
        table.insert(KeyMap::new(
            Trigger::new('1' as u32, ModState::CONTROL),
            vec![KeyEvent::press('a' as u32, ModState::NONE, "Main.Tab\nOne").into()],
        ));
        let printed = print_table(&table);
        assert!(printed.contains(r#"KeyDown(0x61, 0, "Main.Tab\nOne")"#));
        let (parsed, malformed) = parse_table(&printed);
        assert_eq!(malformed, 0);
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_malformed_block_skipped() {
        let content = indoc! {r#"
            # good
            #macro
            KeyDown(0x31, 4, NULL)
            KeyDown(0x61, 0, "Main.Viewport")
            #end macro

            # broken event line
            #macro
            KeyDown(0x32, 4, NULL)
            KeyDown(0x62, 0, "Main.Viewport")
            Wiggle(1, 2)
            KeyDown(0x63, 0, "Main.Viewport")
            #end macro

            # bad trigger
            #macro
            KeyDown(0x33, 4, "Main")
            #end macro

            #macro
            KeyDown(0x34, 4, NULL)
            BtnUp(2, 0, 5, 6, "Main.Viewport")
            #end macro
        "#};
        let (table, malformed) = parse_table(content);
        assert_eq!(malformed, 2);
        assert_eq!(table.len(), 2);
        assert!(table.lookup('1' as u32, ModState::CONTROL).is_some());
        assert!(table.lookup('2' as u32, ModState::CONTROL).is_none());
        assert!(table.lookup('3' as u32, ModState::CONTROL).is_none());
        assert!(table.lookup('4' as u32, ModState::CONTROL).is_some());
    }

    #[test]
    fn test_unterminated_blocks() {
        let content = indoc! {r#"
            #macro
            KeyDown(0x31, 4, NULL)
            KeyDown(0x61, 0, "w")
            #macro
            KeyDown(0x32, 4, NULL)
            KeyDown(0x62, 0, "w")
            #end macro
            #macro
            KeyDown(0x33, 4, NULL)
        "#};
        let (table, malformed) = parse_table(content);
        assert_eq!(malformed, 2);
        assert_eq!(table.len(), 1);
        assert!(table.lookup('2' as u32, ModState::CONTROL).is_some());
    }

    #[test]
    fn test_later_duplicate_wins() {
        let content = indoc! {r#"
            #macro
            KeyDown(0x31, 4, NULL)
            KeyDown(0x61, 0, "w")
            #end macro
            #macro
            KeyDown(0x31, 4, NULL)
            KeyDown(0x7a, 0, "w")
            #end macro
        "#};
        let (table, _) = parse_table(content);
        assert_eq!(table.len(), 1);
        let map = table.lookup('1' as u32, ModState::CONTROL).expect("mapped");
        assert_eq!(map.shorthand(), "z");
    }

    #[test]
    fn test_decoded_text_restored() {
        match parse_event_line(r#"KeyDown(0x41, 1, "w")"#, 1) {
            Ok(Event::Key(key)) => assert_eq!(key.text(), "A"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_number_out_of_range() {
        assert!(matches!(
            parse_event_line(r#"BtnDown(1, 0, 99999999999, 0, "w")"#, 7),
            Err(LineError::BadNumber { line: 7, .. })
        ));
    }

    #[test]
    fn test_file_backup() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("macros");
        write_file(&path, &sample_table(), true).expect("first write");
        assert!(!backup_path(&path).exists());

        let empty = KeyMapTable::new();
        write_file(&path, &empty, true).expect("second write");
        let (backup, _) = read_file(&backup_path(&path)).expect("backup readable");
        assert_eq!(backup, sample_table());
        let (current, _) = read_file(&path).expect("current readable");
        assert!(current.is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (table, malformed) = read_file(&dir.path().join("absent")).expect("missing is fine");
        assert!(table.is_empty());
        assert_eq!(malformed, 0);
    }
}
