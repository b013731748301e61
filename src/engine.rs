//! The macro engine.
//!
//! [`MacroCore`] holds all engine state: the macro table, an in-progress
//! capture, the trigger queue and the playback context. It is handed to the
//! platform adapter during injection so the toolkit's input hook can reach
//! back into the engine. [`KbMacro`] bundles a core with its adapter and is
//! what the application owns.

use crate::adapter::PlatformAdapter;
use crate::config::Config;
use crate::context::ContextStack;
use crate::dispatch::Dispatcher;
use crate::event::{ButtonEvent, Event, EventKind, KeyEvent, ModState};
use crate::keymap::{KeyMap, KeyMapTable, Trigger};
use crate::macro_file;
use crate::recorder::{Recorder, Step};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::Path;
use std::rc::Rc;

#[derive(Debug)]
pub struct MacroCore {
    config: Config,
    table: KeyMapTable,
    recorder: Option<Recorder>,
    dispatcher: Dispatcher,
    context: ContextStack,
}

impl Default for MacroCore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl MacroCore {
    pub fn new(config: Config) -> Self {
        MacroCore {
            config,
            table: KeyMapTable::new(),
            recorder: None,
            dispatcher: Dispatcher::new(),
            context: ContextStack::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table(&self) -> &KeyMapTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut KeyMapTable {
        &mut self.table
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// True while a response sequence is being played.
    pub fn is_playing(&self) -> bool {
        self.context.is_active()
    }

    pub fn context_depth(&self) -> usize {
        self.context.depth()
    }

    /// True when queued triggers are waiting for [`MacroCore::poll_and_run`].
    pub fn needs_poll(&self) -> bool {
        self.dispatcher.needs_poll()
    }

    /// Starts an interactive capture: the next key pressed becomes the trigger,
    /// what follows up to Enter becomes its response.
    pub fn get_macro<A: PlatformAdapter>(&mut self, adapter: &mut A) -> bool {
        if self.recorder.is_some() {
            debug!("macro capture already in progress");
            return false;
        }
        let recorder = Recorder::new();
        adapter.show_prompt(&recorder.prompt());
        self.recorder = Some(recorder);
        true
    }

    /// Records into the existing mapping for `trigger`, or a new empty one.
    pub fn extend_macro<A: PlatformAdapter>(&mut self, adapter: &mut A, trigger: Trigger) -> bool {
        if self.recorder.is_some() {
            debug!("macro capture already in progress");
            return false;
        }
        let existing = self
            .table
            .get(&trigger)
            .map(|map| map.response().to_vec())
            .unwrap_or_default();
        let recorder = Recorder::begin_recording(trigger, existing);
        adapter.show_prompt(&recorder.prompt());
        self.recorder = Some(recorder);
        true
    }

    /// Submenu opened during a capture; see [`Recorder::note_grab`].
    pub fn note_grab(&mut self, path: &str) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.note_grab(path);
        }
    }

    pub fn release_grab(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.release_grab();
        }
    }

    /// Global input hook. Returns true if the engine consumed the event.
    pub fn on_event<A: PlatformAdapter>(&mut self, adapter: &mut A, event: &Event) -> bool {
        if self.recorder.is_some() {
            return self.record_event(adapter, event);
        }
        match event {
            Event::Key(key) => self.macro_expand(adapter, key.keycode, key.state, key.kind.is_release()),
            Event::Button(_) => false,
        }
    }

    fn record_event<A: PlatformAdapter>(&mut self, adapter: &mut A, event: &Event) -> bool {
        let Some(recorder) = self.recorder.as_mut() else {
            return false;
        };
        let step = recorder.feed(event, |code| adapter.is_modifier_keycode(code));
        match step {
            Step::Ignored | Step::Recorded | Step::Consumed => {}
            Step::TriggerCaptured(trigger) => {
                info!("recording macro for {trigger}");
                adapter.show_prompt(&recorder.prompt());
            }
            Step::Aborted => {
                info!("macro capture aborted");
                self.recorder = None;
                adapter.erase_prompt();
            }
            Step::Finished => {
                adapter.erase_prompt();
                let finished = self
                    .recorder
                    .take()
                    .and_then(|recorder| recorder.finish(|code| adapter.is_modifier_keycode(code)));
                if let Some(map) = finished {
                    self.store(map);
                }
            }
        }
        step.consumes()
    }

    fn store(&mut self, map: KeyMap) {
        let trigger = map.trigger();
        if map.is_empty() {
            if self.table.remove(&trigger).is_none() {
                info!("empty macro for {trigger} discarded");
                return;
            }
            info!("macro for {trigger} removed");
        } else {
            info!("macro for {trigger} saved: {}", map.shorthand());
            self.table.insert(map);
        }
        if self.config.autosave {
            self.autosave();
        }
    }

    fn autosave(&self) {
        let Some(path) = self.config.macro_file.as_deref() else {
            return;
        };
        if let Err(e) = self.macro_file_update(path) {
            error!("macros kept in memory only: {e:#}");
        }
    }

    /// Trigger lookup for a raw key event. Returns true if the key started
    /// (queued) a macro and should not reach the toolkit.
    pub fn macro_expand<A: PlatformAdapter>(&mut self, adapter: &A, keycode: u32, state: ModState, is_release: bool) -> bool {
        if is_release || self.recorder.is_some() || adapter.is_editing_text() {
            return false;
        }
        let trigger = Trigger::new(keycode, state);
        let Some(map) = self.table.get(&trigger) else {
            return false;
        };
        if self.dispatcher.is_executing(&trigger) {
            debug!("macro {trigger} is already running, passing key through");
            return false;
        }
        let map = map.clone();
        self.dispatcher.enqueue(map);
        true
    }

    /// Runs one queued macro to completion (or to an honoured pop). Call once
    /// per pass of the host event loop; returns true while more are queued.
    pub fn poll_and_run<A: PlatformAdapter>(&mut self, adapter: &mut A) -> bool {
        let Some(entry) = self.dispatcher.begin_next() else {
            return false;
        };
        debug!("running macro {}", entry.trigger);
        self.macro_push(adapter, Some(entry.keymap.shared_response()));
        self.dispatcher.finish(&entry.trigger)
    }

    /// Plays `events` from the start, discarding any chain already running.
    /// With `None`, continues the current sequence one level deeper, for a
    /// nested operation that needs the following events; false if nothing is
    /// running.
    ///
    /// Returns true if playback stopped because of a [`MacroCore::macro_pop`].
    pub fn macro_push<A: PlatformAdapter>(&mut self, adapter: &mut A, events: Option<Rc<[Event]>>) -> bool {
        match events {
            Some(events) => self.context.start(events),
            None => {
                if !self.context.nest() {
                    return false;
                }
            }
        }
        while let Some(event) = self.context.advance() {
            if !event.exec(adapter, self) {
                debug!("macro event not delivered: {event}");
            }
            if self.context.settle() {
                return true;
            }
        }
        false
    }

    /// Stops the running frame after the current event. Meant to be called
    /// from inside an event's execution.
    pub fn macro_pop(&mut self) -> bool {
        self.context.request_pop()
    }

    /// Injects a single key event, outside of any recording.
    pub fn send_key_event<A: PlatformAdapter>(
        &mut self,
        adapter: &mut A,
        widget_path: &str,
        keycode: u32,
        state: ModState,
        kind: EventKind,
    ) -> bool {
        Event::Key(KeyEvent::new(keycode, state, kind, widget_path)).exec(adapter, self)
    }

    /// Injects a single button event, outside of any recording.
    #[allow(clippy::too_many_arguments)]
    pub fn send_button_event<A: PlatformAdapter>(
        &mut self,
        adapter: &mut A,
        widget_path: &str,
        button: u32,
        state: ModState,
        x: i32,
        y: i32,
        kind: EventKind,
    ) -> bool {
        Event::Button(ButtonEvent::new(button, state, kind, x, y, widget_path)).exec(adapter, self)
    }

    /// Writes the table to `path`, keeping the previous file as a backup when
    /// configured to.
    pub fn macro_file_update(&self, path: &Path) -> Result<()> {
        macro_file::write_file(path, &self.table, self.config.backup)
    }

    /// Merges the macros in `path` into the table and returns how many
    /// malformed blocks were skipped.
    pub fn load_macro_file(&mut self, path: &Path) -> Result<usize> {
        let (table, malformed) = macro_file::read_file(path)?;
        if malformed > 0 {
            warn!("{}: skipped {malformed} malformed macro block(s)", path.display());
        }
        debug!("loaded {} macro(s) from {}", table.len(), path.display());
        self.table.merge(table);
        Ok(malformed)
    }
}

/// A macro engine bound to its toolkit adapter.
pub struct KbMacro<A: PlatformAdapter> {
    core: MacroCore,
    adapter: A,
}

impl<A: PlatformAdapter> KbMacro<A> {
    /// Creates the engine, loading the configured macro file if asked to.
    pub fn new(adapter: A, config: Config) -> Self {
        let load = if config.load_on_start { config.macro_file.clone() } else { None };
        let mut core = MacroCore::new(config);
        if let Some(path) = load {
            if let Err(e) = core.load_macro_file(&path) {
                warn!("{e:#}");
            }
        }
        KbMacro { core, adapter }
    }

    pub fn core(&self) -> &MacroCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut MacroCore {
        &mut self.core
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn table(&self) -> &KeyMapTable {
        self.core.table()
    }

    pub fn get_macro(&mut self) -> bool {
        self.core.get_macro(&mut self.adapter)
    }

    pub fn extend_macro(&mut self, trigger: Trigger) -> bool {
        self.core.extend_macro(&mut self.adapter, trigger)
    }

    pub fn on_event(&mut self, event: &Event) -> bool {
        self.core.on_event(&mut self.adapter, event)
    }

    pub fn macro_expand(&mut self, keycode: u32, state: ModState, is_release: bool) -> bool {
        self.core.macro_expand(&self.adapter, keycode, state, is_release)
    }

    pub fn poll_and_run(&mut self) -> bool {
        self.core.poll_and_run(&mut self.adapter)
    }

    /// Drains the queue, returning how many macros ran. Macros that trigger
    /// each other in a cycle keep the queue alive forever, so at most
    /// `max_passes` are run.
    pub fn run_pending(&mut self, max_passes: usize) -> usize {
        let mut ran = 0;
        while self.core.needs_poll() && ran < max_passes {
            self.poll_and_run();
            ran += 1;
        }
        if self.core.needs_poll() {
            warn!("macro queue still busy after {ran} passes");
        }
        ran
    }

    pub fn macro_push(&mut self, events: Option<Rc<[Event]>>) -> bool {
        self.core.macro_push(&mut self.adapter, events)
    }

    pub fn macro_pop(&mut self) -> bool {
        self.core.macro_pop()
    }

    pub fn send_key_event(&mut self, widget_path: &str, keycode: u32, state: ModState, kind: EventKind) -> bool {
        self.core.send_key_event(&mut self.adapter, widget_path, keycode, state, kind)
    }

    pub fn send_button_event(
        &mut self,
        widget_path: &str,
        button: u32,
        state: ModState,
        (x, y): (i32, i32),
        kind: EventKind,
    ) -> bool {
        self.core.send_button_event(&mut self.adapter, widget_path, button, state, x, y, kind)
    }

    pub fn macro_file_update(&self, path: &Path) -> Result<()> {
        self.core.macro_file_update(path)
    }

    pub fn load_macro_file(&mut self, path: &Path) -> Result<usize> {
        self.core.load_macro_file(path)
    }
}
