//! The recorded event model: key and button events and the modifier state they carry.

use crate::adapter::PlatformAdapter;
use crate::engine::MacroCore;
use crate::keysym;
use log::debug;
use std::fmt;

/// Modifier state as a bitmask. Bit values match the GDK state mask so that
/// files written by older builds keep loading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModState(u32);

impl ModState {
    pub const NONE: ModState = ModState(0);
    pub const SHIFT: ModState = ModState(0b0001);
    pub const CONTROL: ModState = ModState(0b0100);
    pub const ALT: ModState = ModState(0b1000);
    /// Bits that take part in trigger matching.
    pub const TRIGGER_MASK: ModState = ModState(0b1101);

    pub const fn from_bits(bits: u32) -> Self {
        ModState(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Drops everything but shift, control and alt.
    #[inline]
    pub const fn masked(self) -> ModState {
        ModState(self.0 & Self::TRIGGER_MASK.0)
    }

    #[inline]
    pub const fn shift(self) -> bool {
        self.0 & Self::SHIFT.0 != 0
    }

    #[inline]
    pub const fn control(self) -> bool {
        self.0 & Self::CONTROL.0 != 0
    }

    #[inline]
    pub const fn alt(self) -> bool {
        self.0 & Self::ALT.0 != 0
    }

    /// Control or alt held. Recording ignores its own control keys while either is down.
    #[inline]
    pub const fn control_or_alt(self) -> bool {
        self.control() || self.alt()
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: ModState) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn without(self, other: ModState) -> ModState {
        ModState(self.0 & !other.0)
    }
}

impl std::ops::BitOr for ModState {
    type Output = ModState;

    fn bitor(self, rhs: Self) -> Self::Output {
        ModState(self.0 | rhs.0)
    }
}

impl fmt::Display for ModState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modifier bit contributed by a modifier keysym, if any.
pub fn modifier_bit(code: u32) -> ModState {
    match code {
        keysym::SHIFT_L | keysym::SHIFT_R => ModState::SHIFT,
        keysym::CONTROL_L | keysym::CONTROL_R => ModState::CONTROL,
        keysym::ALT_L | keysym::ALT_R => ModState::ALT,
        _ => ModState::NONE,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Press,
    Release,
}

impl EventKind {
    pub fn is_press(self) -> bool {
        self == EventKind::Press
    }

    pub fn is_release(self) -> bool {
        self == EventKind::Release
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub widget_path: String,
    pub state: ModState,
    pub kind: EventKind,
    pub keycode: u32,
    text: String,
}

impl KeyEvent {
    pub fn new(keycode: u32, state: ModState, kind: EventKind, widget_path: impl Into<String>) -> Self {
        KeyEvent {
            widget_path: widget_path.into(),
            state,
            kind,
            keycode,
            text: keysym::text_for(keycode),
        }
    }

    pub fn press(keycode: u32, state: ModState, widget_path: impl Into<String>) -> Self {
        Self::new(keycode, state, EventKind::Press, widget_path)
    }

    pub fn release(keycode: u32, state: ModState, widget_path: impl Into<String>) -> Self {
        Self::new(keycode, state, EventKind::Release, widget_path)
    }

    /// Decoded text, always derived from the keysym so that it survives a
    /// save and reload unchanged.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_modifier(&self) -> bool {
        keysym::is_modifier(self.keycode)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonEvent {
    pub widget_path: String,
    pub state: ModState,
    pub kind: EventKind,
    pub button: u32,
    pub x: i32,
    pub y: i32,
}

impl ButtonEvent {
    pub fn new(button: u32, state: ModState, kind: EventKind, x: i32, y: i32, widget_path: impl Into<String>) -> Self {
        ButtonEvent {
            widget_path: widget_path.into(),
            state,
            kind,
            button,
            x,
            y,
        }
    }

    pub fn press(button: u32, state: ModState, x: i32, y: i32, widget_path: impl Into<String>) -> Self {
        Self::new(button, state, EventKind::Press, x, y, widget_path)
    }

    pub fn release(button: u32, state: ModState, x: i32, y: i32, widget_path: impl Into<String>) -> Self {
        Self::new(button, state, EventKind::Release, x, y, widget_path)
    }
}

/// One element of a response sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Button(ButtonEvent),
}

impl Event {
    pub fn widget_path(&self) -> &str {
        match self {
            Event::Key(key) => &key.widget_path,
            Event::Button(button) => &button.widget_path,
        }
    }

    pub fn set_widget_path(&mut self, path: impl Into<String>) {
        match self {
            Event::Key(key) => key.widget_path = path.into(),
            Event::Button(button) => button.widget_path = path.into(),
        }
    }

    pub fn state(&self) -> ModState {
        match self {
            Event::Key(key) => key.state,
            Event::Button(button) => button.state,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Key(key) => key.kind,
            Event::Button(button) => button.kind,
        }
    }

    /// A key event whose keysym only changes modifier state.
    pub fn is_modifier_key(&self) -> bool {
        matches!(self, Event::Key(key) if key.is_modifier())
    }

    /// True when `other` is the release that closes this press (same key or button).
    pub fn is_closed_by(&self, other: &Event) -> bool {
        if !self.kind().is_press() || !other.kind().is_release() {
            return false;
        }
        match (self, other) {
            (Event::Key(a), Event::Key(b)) => a.keycode == b.keycode,
            (Event::Button(a), Event::Button(b)) => a.button == b.button,
            _ => false,
        }
    }

    /// Resolves the target widget and injects the event through the adapter.
    ///
    /// A widget that cannot be resolved makes this return false; callers keep
    /// going with the next event.
    pub fn exec<A: PlatformAdapter>(&self, adapter: &mut A, host: &mut MacroCore) -> bool {
        let widget = match adapter.resolve_widget_path(self.widget_path()) {
            Ok(widget) => widget,
            Err(e) => {
                debug!("skipping {self}: {e}");
                return false;
            }
        };
        match self {
            Event::Key(key) => adapter.inject_key_event(host, &widget, key),
            Event::Button(button) => adapter.inject_button_event(host, &widget, button),
        }
    }
}

impl From<KeyEvent> for Event {
    fn from(event: KeyEvent) -> Self {
        Event::Key(event)
    }
}

impl From<ButtonEvent> for Event {
    fn from(event: ButtonEvent) -> Self {
        Event::Button(event)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Key(key) => write!(
                f,
                "{} {} [{}] on \"{}\"",
                if key.kind.is_press() { "KeyDown" } else { "KeyUp" },
                keysym::name_of(key.keycode),
                key.state,
                key.widget_path
            ),
            Event::Button(button) => write!(
                f,
                "{} {} at ({}, {}) [{}] on \"{}\"",
                if button.kind.is_press() { "BtnDown" } else { "BtnUp" },
                button.button,
                button.x,
                button.y,
                button.state,
                button.widget_path
            ),
        }
    }
}
