//! An in-memory toolkit: a flat registry of named widgets that records every
//! event delivered to it. Used by the command-line player and the tests.

use super::PlatformAdapter;
use crate::engine::MacroCore;
use crate::error::ResolveError;
use crate::event::{modifier_bit, ButtonEvent, Event, KeyEvent, ModState};
use crate::keymap::Trigger;
use crate::keysym;
use log::{debug, info, trace};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetId(usize);

#[derive(Debug)]
struct Widget {
    path: String,
    realized: bool,
    alive: bool,
    submenu: bool,
}

/// What a widget does when it receives a key press, on top of recording it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    /// Ends the running macro frame, like a dialog that closes on this key.
    PopMacro,
    /// Opens a text entry that reads the rest of the macro up to Return.
    BeginTextEntry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub widget: String,
    pub event: Event,
}

#[derive(Debug, Default)]
pub struct HeadlessToolkit {
    widgets: Vec<Widget>,
    reactions: HashMap<(String, u32), Reaction>,
    delivered: Vec<Delivery>,
    expansions: Vec<(Trigger, bool)>,
    modifiers: ModState,
    editing_text: bool,
    open_submenus: Vec<WidgetId>,
    prompt: Option<String>,
    prompts: Vec<String>,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, path: &str, realized: bool, submenu: bool) -> WidgetId {
        self.widgets.push(Widget {
            path: path.to_string(),
            realized,
            alive: true,
            submenu,
        });
        WidgetId(self.widgets.len() - 1)
    }

    pub fn add_widget(&mut self, path: &str) -> WidgetId {
        self.register(path, true, false)
    }

    pub fn add_unrealized(&mut self, path: &str) -> WidgetId {
        self.register(path, false, false)
    }

    /// A menu item that opens a submenu when pressed.
    pub fn add_submenu_item(&mut self, path: &str) -> WidgetId {
        self.register(path, true, true)
    }

    pub fn realize(&mut self, id: WidgetId) {
        if let Some(widget) = self.widgets.get_mut(id.0) {
            widget.realized = true;
        }
    }

    pub fn destroy(&mut self, id: WidgetId) {
        if let Some(widget) = self.widgets.get_mut(id.0) {
            widget.alive = false;
        }
        self.open_submenus.retain(|open| *open != id);
    }

    pub fn on_key(&mut self, path: &str, keycode: u32, reaction: Reaction) {
        self.reactions.insert((path.to_string(), keycode), reaction);
    }

    pub fn set_editing_text(&mut self, editing: bool) {
        self.editing_text = editing;
    }

    pub fn delivered(&self) -> &[Delivery] {
        &self.delivered
    }

    /// Deliveries to `path`, in order.
    pub fn delivered_to(&self, path: &str) -> Vec<&Event> {
        self.delivered
            .iter()
            .filter(|d| d.widget == path)
            .map(|d| &d.event)
            .collect()
    }

    pub fn clear_delivered(&mut self) {
        self.delivered.clear();
    }

    /// Trigger lookups made for injected presses, with whether each one
    /// started a macro.
    pub fn expansions(&self) -> &[(Trigger, bool)] {
        &self.expansions
    }

    pub fn is_submenu_open(&self, id: WidgetId) -> bool {
        self.open_submenus.contains(&id)
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    fn live(&self, id: &WidgetId) -> Option<&Widget> {
        self.widgets.get(id.0).filter(|w| w.alive && w.realized)
    }

    fn deliver(&mut self, id: &WidgetId, event: Event) {
        let Some(widget) = self.widgets.get(id.0) else {
            return;
        };
        trace!("{event}");
        self.delivered.push(Delivery {
            widget: widget.path.clone(),
            event,
        });
    }
}

impl PlatformAdapter for HeadlessToolkit {
    type Widget = WidgetId;

    fn resolve_widget_path(&self, path: &str) -> Result<WidgetId, ResolveError> {
        let mut matches = self
            .widgets
            .iter()
            .enumerate()
            .filter(|(_, w)| w.alive && w.path == path)
            .map(|(idx, _)| WidgetId(idx));
        let Some(found) = matches.next() else {
            return Err(ResolveError::NotFound(path.to_string()));
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(ResolveError::Ambiguous {
                path: path.to_string(),
                count: extra + 1,
            });
        }
        Ok(found)
    }

    fn inject_key_event(&mut self, host: &mut MacroCore, widget: &WidgetId, event: &KeyEvent) -> bool {
        let Some(target) = self.live(widget) else {
            debug!("key event for a stale or unrealized widget dropped");
            return false;
        };
        let path = target.path.clone();

        let bit = modifier_bit(event.keycode);
        if !bit.is_empty() {
            self.modifiers = if event.kind.is_press() {
                self.modifiers | bit
            } else {
                self.modifiers.without(bit)
            };
        }

        if event.kind.is_press() {
            let consumed = host.macro_expand(&*self, event.keycode, event.state, false);
            self.expansions.push((Trigger::new(event.keycode, event.state), consumed));
            if consumed {
                return true;
            }
        }

        self.deliver(widget, Event::Key(event.clone()));
        if !event.kind.is_press() {
            return true;
        }

        if self.editing_text {
            if matches!(event.keycode, keysym::RETURN | keysym::KP_ENTER) {
                self.editing_text = false;
                host.macro_pop();
            }
            return true;
        }
        match self.reactions.get(&(path, event.keycode)).copied() {
            Some(Reaction::PopMacro) => {
                host.macro_pop();
            }
            Some(Reaction::BeginTextEntry) => {
                self.editing_text = true;
                host.macro_push(self, None);
                // the entry closes with the frame even if Return never came
                self.editing_text = false;
            }
            None => {}
        }
        true
    }

    fn inject_button_event(&mut self, _host: &mut MacroCore, widget: &WidgetId, event: &ButtonEvent) -> bool {
        let Some(target) = self.live(widget) else {
            debug!("button event for a stale or unrealized widget dropped");
            return false;
        };
        if target.submenu {
            if event.kind.is_press() {
                if !self.open_submenus.contains(widget) {
                    self.open_submenus.push(*widget);
                }
            } else if let Some(pos) = self.open_submenus.iter().position(|open| open == widget) {
                self.open_submenus.remove(pos);
            } else {
                debug!("release on a menu item whose submenu is not open");
                return false;
            }
        }
        self.deliver(widget, Event::Button(event.clone()));
        true
    }

    fn query_modifier_state(&self) -> ModState {
        self.modifiers
    }

    fn is_editing_text(&self) -> bool {
        self.editing_text
    }

    fn show_prompt(&mut self, text: &str) {
        info!("{text}");
        self.prompt = Some(text.to_string());
        self.prompts.push(text.to_string());
    }

    fn erase_prompt(&mut self) {
        self.prompt = None;
    }
}
