//! Keyboard and mouse macros for GUI applications: capture a sequence of
//! input events under a trigger key, save it, and replay it into the same
//! widgets later.

pub mod adapter;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod keymap;
pub mod keysym;
pub mod macro_file;
pub mod recorder;

pub use adapter::{HeadlessToolkit, PlatformAdapter};
pub use config::Config;
pub use engine::{KbMacro, MacroCore};
pub use error::{LineError, ResolveError};
pub use event::{ButtonEvent, Event, EventKind, KeyEvent, ModState};
pub use keymap::{KeyMap, KeyMapTable, Trigger};
