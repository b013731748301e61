//! Recorded macros and the table that holds them.

use crate::event::{Event, ModState};
use crate::keysym;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::rc::Rc;

/// The keystroke that starts playback. The modifier state is always masked
/// to shift, control and alt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger {
    pub keycode: u32,
    pub state: ModState,
}

impl Trigger {
    pub fn new(keycode: u32, state: ModState) -> Self {
        Trigger {
            keycode,
            state: state.masked(),
        }
    }

    pub fn describe(&self) -> String {
        keysym::describe(self.keycode, self.state)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One recorded macro: a trigger and its response sequence.
///
/// The response is shared so that a running playback keeps its events alive
/// even if the mapping is replaced in the middle of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMap {
    trigger: Trigger,
    description: String,
    response: Rc<[Event]>,
}

impl KeyMap {
    pub fn new(trigger: Trigger, response: Vec<Event>) -> Self {
        KeyMap {
            trigger,
            description: trigger.describe(),
            response: response.into(),
        }
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn response(&self) -> &[Event] {
        &self.response
    }

    pub fn shared_response(&self) -> Rc<[Event]> {
        Rc::clone(&self.response)
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }

    /// Short human-readable rendering of the response: typed text is run
    /// together, other keys and buttons appear as `<name>` tokens. Releases
    /// are left out.
    pub fn shorthand(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut text = String::new();
        for event in self.response.iter().filter(|e| e.kind().is_press()) {
            match event {
                Event::Key(key) if key.is_modifier() => {}
                Event::Key(key) if key.keycode > keysym::SPACE && key.keycode < 0x7f => {
                    text.push_str(key.text());
                }
                Event::Key(key) => {
                    if !text.is_empty() {
                        parts.push(std::mem::take(&mut text));
                    }
                    parts.push(format!("<{}>", keysym::describe(key.keycode, key.state.masked())));
                }
                Event::Button(button) => {
                    if !text.is_empty() {
                        parts.push(std::mem::take(&mut text));
                    }
                    parts.push(format!("<Btn{}>", button.button));
                }
            }
        }
        if !text.is_empty() {
            parts.push(text);
        }
        parts.join(" ")
    }
}

/// All macros, keyed by trigger. At most one mapping exists per trigger.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyMapTable {
    maps: BTreeMap<Trigger, KeyMap>,
}

impl KeyMapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mapping, returning the one it displaced.
    pub fn insert(&mut self, map: KeyMap) -> Option<KeyMap> {
        self.maps.insert(map.trigger(), map)
    }

    pub fn remove(&mut self, trigger: &Trigger) -> Option<KeyMap> {
        self.maps.remove(trigger)
    }

    pub fn get(&self, trigger: &Trigger) -> Option<&KeyMap> {
        self.maps.get(trigger)
    }

    pub fn lookup(&self, keycode: u32, state: ModState) -> Option<&KeyMap> {
        self.get(&Trigger::new(keycode, state))
    }

    /// Moves every mapping of `other` in, replacing any with the same trigger.
    pub fn merge(&mut self, other: KeyMapTable) {
        self.maps.extend(other.maps);
    }

    pub fn iter(&self) -> btree_map::Values<'_, Trigger, KeyMap> {
        self.maps.values()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }
}

impl<'a> IntoIterator for &'a KeyMapTable {
    type Item = &'a KeyMap;
    type IntoIter = btree_map::Values<'a, Trigger, KeyMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
