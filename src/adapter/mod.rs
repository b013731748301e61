//! The capability interface a GUI toolkit provides to the engine.
//!
//! One implementation exists per toolkit. The engine never touches widgets
//! directly: it resolves a widget path to a handle and asks the adapter to
//! inject a synthetic event into it.
//!
//! # Reentrancy
//!
//! Injection is synchronous. While the toolkit delivers a synthetic event its
//! own input hook runs, and anything that hook would normally do with the
//! engine (trigger lookup, `macro_pop`, nested `macro_push`) must go through the
//! `host` handed to the inject call, passing the adapter itself along:
//!
//! ```ignore
//! fn inject_key_event(&mut self, host: &mut MacroCore, widget: &WidgetId, event: &KeyEvent) -> bool {
//!     if event.kind.is_press() && host.macro_expand(self, event.keycode, event.state, false) {
//!         return true;
//!     }
//!     self.deliver(widget, event)
//! }
//! ```

pub mod headless;

use crate::engine::MacroCore;
use crate::error::ResolveError;
use crate::event::{ButtonEvent, KeyEvent, ModState};
use crate::keysym;
use log::info;

pub use headless::HeadlessToolkit;

pub trait PlatformAdapter {
    /// Handle to a live UI element.
    type Widget;

    /// Resolves a dot-separated path rooted at a top-level window. More than
    /// one live match is an error.
    fn resolve_widget_path(&self, path: &str) -> Result<Self::Widget, ResolveError>;

    /// Delivers a synthetic key event. False if the widget is stale or not
    /// realized.
    fn inject_key_event(&mut self, host: &mut MacroCore, widget: &Self::Widget, event: &KeyEvent) -> bool;

    /// Delivers a synthetic button event. A press on a submenu-bearing item
    /// opens the submenu before the matching release can be delivered.
    fn inject_button_event(&mut self, host: &mut MacroCore, widget: &Self::Widget, event: &ButtonEvent) -> bool;

    /// Modifier keys currently held.
    fn query_modifier_state(&self) -> ModState;

    fn is_modifier_keycode(&self, code: u32) -> bool {
        keysym::is_modifier(code)
    }

    /// True while a free-form text entry has the focus; trigger keys are
    /// then typed rather than expanded.
    fn is_editing_text(&self) -> bool {
        false
    }

    fn show_prompt(&mut self, text: &str) {
        info!("{text}");
    }

    fn erase_prompt(&mut self) {}
}
