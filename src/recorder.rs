//! Capturing a live input stream into a response sequence.
//!
//! A capture runs in two phases. First the next non-modifier key press is
//! taken as the trigger, then every event is appended to the response until
//! Enter is released (save) or Escape is pressed (abort). Backspace removes
//! the most recent press/release unit.

use crate::event::{Event, EventKind};
use crate::keymap::{KeyMap, Trigger};
use crate::keysym;
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitTrigger,
    Recording,
}

/// What the recorder did with one input event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Not recorded; the toolkit should still handle it.
    Ignored,
    /// Appended to the response; the toolkit should still handle it.
    Recorded,
    /// Swallowed by the recorder.
    Consumed,
    /// The trigger key was captured and recording has started.
    TriggerCaptured(Trigger),
    /// Enter was released; the capture is complete.
    Finished,
    /// Escape was pressed; the capture is discarded.
    Aborted,
}

impl Step {
    /// True when the event must not reach the toolkit.
    pub fn consumes(self) -> bool {
        !matches!(self, Step::Ignored | Step::Recorded)
    }
}

#[derive(Debug)]
pub struct Recorder {
    phase: Phase,
    trigger: Option<Trigger>,
    response: Vec<Event>,
    // Presses recorded but not yet released. A release is only recorded
    // when it closes one of these.
    held: Vec<Event>,
    // Keysym of the trigger until its release has been swallowed.
    trigger_release: Option<u32>,
    last_key_typed: Option<u32>,
    grabber: Option<String>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    /// Starts a capture that waits for the trigger key.
    pub fn new() -> Self {
        Recorder {
            phase: Phase::AwaitTrigger,
            trigger: None,
            response: Vec::new(),
            held: Vec::new(),
            trigger_release: None,
            last_key_typed: None,
            grabber: None,
        }
    }

    /// Starts recording for `trigger`, continuing after the tail of `existing`.
    pub fn begin_recording(trigger: Trigger, existing: Vec<Event>) -> Self {
        let mut recorder = Recorder::new();
        recorder.phase = Phase::Recording;
        recorder.trigger = Some(trigger);
        for event in existing {
            recorder.track(&event);
            recorder.response.push(event);
        }
        recorder
    }

    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    pub fn response(&self) -> &[Event] {
        &self.response
    }

    /// Prompt text for the current phase.
    pub fn prompt(&self) -> String {
        match self.trigger {
            None => "Enter key to map (Esc to abort): ".to_string(),
            Some(trigger) => format!(
                "Recording macro for {}, end with Enter, Backspace undoes, Esc aborts: ",
                trigger.describe()
            ),
        }
    }

    /// A transient submenu opened mid-recording. Events arriving without a
    /// widget path are attributed to it until [`Recorder::release_grab`].
    pub fn note_grab(&mut self, path: impl Into<String>) {
        self.grabber = Some(path.into());
    }

    pub fn release_grab(&mut self) {
        self.grabber = None;
    }

    /// Feeds one live event through the capture state machine.
    /// `is_modifier` tells modifier keysyms apart, as the toolkit sees them.
    pub fn feed(&mut self, event: &Event, is_modifier: impl Fn(u32) -> bool) -> Step {
        match self.phase {
            Phase::AwaitTrigger => self.feed_trigger(event, is_modifier),
            Phase::Recording => self.feed_body(event, is_modifier),
        }
    }

    fn feed_trigger(&mut self, event: &Event, is_modifier: impl Fn(u32) -> bool) -> Step {
        let Event::Key(key) = event else {
            return Step::Ignored;
        };
        if key.kind.is_release() || is_modifier(key.keycode) {
            return Step::Ignored;
        }
        if key.keycode == keysym::ESCAPE && !key.state.control_or_alt() {
            return Step::Aborted;
        }
        let trigger = Trigger::new(key.keycode, key.state);
        debug!("macro trigger captured: {trigger}");
        self.trigger = Some(trigger);
        self.phase = Phase::Recording;
        // its release belongs to the capture, not to the body
        self.trigger_release = Some(key.keycode);
        Step::TriggerCaptured(trigger)
    }

    fn feed_body(&mut self, event: &Event, is_modifier: impl Fn(u32) -> bool) -> Step {
        if let Event::Key(key) = event {
            if key.kind.is_release() && self.trigger_release == Some(key.keycode) && !self.is_held(event) {
                self.trigger_release = None;
                return Step::Consumed;
            }
            let plain = !key.state.control_or_alt();
            match key.kind {
                EventKind::Press if plain && key.keycode == keysym::ESCAPE => return Step::Aborted,
                EventKind::Press if plain && key.keycode == keysym::RETURN => {
                    self.last_key_typed = Some(keysym::RETURN);
                    return Step::Consumed;
                }
                EventKind::Press if plain && key.keycode == keysym::BACKSPACE => {
                    self.last_key_typed = Some(keysym::BACKSPACE);
                    if !self.clear_last_event(is_modifier) {
                        debug!("nothing to undo");
                    }
                    return Step::Consumed;
                }
                EventKind::Release if self.last_key_typed == Some(key.keycode) && !self.is_held(event) => {
                    self.last_key_typed = None;
                    if key.keycode == keysym::RETURN && plain {
                        return Step::Finished;
                    }
                    return Step::Consumed;
                }
                EventKind::Press => self.last_key_typed = Some(key.keycode),
                EventKind::Release => {}
            }
        }

        if event.kind().is_release() && !self.is_held(event) {
            return Step::Ignored;
        }
        let mut event = event.clone();
        if event.widget_path().is_empty() {
            if let Some(grabber) = &self.grabber {
                event.set_widget_path(grabber.clone());
            }
        }
        self.add_response(event);
        Step::Recorded
    }

    fn is_held(&self, release: &Event) -> bool {
        self.held.iter().any(|press| press.is_closed_by(release))
    }

    fn track(&mut self, event: &Event) {
        match event.kind() {
            EventKind::Press => self.held.push(event.clone()),
            EventKind::Release => {
                if let Some(pos) = self.held.iter().rposition(|press| press.is_closed_by(event)) {
                    self.held.remove(pos);
                }
            }
        }
    }

    /// Appends an event to the response.
    pub fn add_response(&mut self, event: Event) {
        self.track(&event);
        self.response.push(event);
    }

    /// Removes the most recent complete press/release unit, skipping over
    /// trailing modifier keys. Returns false when there was nothing to remove.
    pub fn clear_last_event(&mut self, is_modifier: impl Fn(u32) -> bool) -> bool {
        clear_last_event(&mut self.response, is_modifier)
    }

    pub fn fix_modif(&mut self, is_modifier: impl Fn(u32) -> bool) {
        fix_modif(&mut self.response, is_modifier);
    }

    /// Ends the capture, returning the finished macro. The response has its
    /// inert modifier taps removed and may be empty.
    pub fn finish(mut self, is_modifier: impl Fn(u32) -> bool) -> Option<KeyMap> {
        let trigger = self.trigger?;
        self.fix_modif(is_modifier);
        Some(KeyMap::new(trigger, self.response))
    }
}

fn modifier_key(event: &Event, is_modifier: &impl Fn(u32) -> bool) -> bool {
    matches!(event, Event::Key(key) if is_modifier(key.keycode))
}

/// Removes the last non-modifier release together with its press.
pub fn clear_last_event(events: &mut Vec<Event>, is_modifier: impl Fn(u32) -> bool) -> bool {
    let Some(release) = events
        .iter()
        .rposition(|e| e.kind().is_release() && !modifier_key(e, &is_modifier))
    else {
        return false;
    };
    let Some(press) = events[..release]
        .iter()
        .rposition(|e| e.is_closed_by(&events[release]))
    else {
        return false;
    };
    events.remove(release);
    events.remove(press);
    true
}

/// Deletes modifier key press/release pairs that enclose nothing but other
/// modifier keys. Presses are paired with the nearest following release of
/// the same key. Applying this twice gives the same result as once.
pub fn fix_modif(events: &mut Vec<Event>, is_modifier: impl Fn(u32) -> bool) {
    let mut open: Vec<usize> = Vec::new();
    let mut drop = vec![false; events.len()];

    for (i, event) in events.iter().enumerate() {
        if !modifier_key(event, &is_modifier) {
            continue;
        }
        match event.kind() {
            EventKind::Press => open.push(i),
            EventKind::Release => {
                let Some(slot) = open.iter().rposition(|&p| events[p].is_closed_by(event)) else {
                    continue;
                };
                let press = open.remove(slot);
                if events[press + 1..i].iter().all(|e| modifier_key(e, &is_modifier)) {
                    drop[press] = true;
                    drop[i] = true;
                }
            }
        }
    }

    let mut index = 0;
    events.retain(|_| {
        let keep = !drop[index];
        index += 1;
        keep
    });
}
