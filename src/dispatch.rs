//! Serialising trigger hits into single-file playback.
//!
//! Triggers that fire while the toolkit is still handling an event are queued
//! here and drained one entry per idle pass, so playback only ever starts
//! from an unwound call stack.

use crate::keymap::{KeyMap, Trigger};
use log::debug;
use std::collections::VecDeque;

/// A trigger hit waiting for the next idle pass.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub trigger: Trigger,
    pub keymap: KeyMap,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    queue: VecDeque<QueueEntry>,
    executing: Vec<Trigger>,
    idle_pending: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `trigger` is part of a playback in progress.
    pub fn is_executing(&self, trigger: &Trigger) -> bool {
        self.executing.contains(trigger)
    }

    /// Queues a hit. Returns true when this scheduled a new idle pass, i.e.
    /// the queue was empty before.
    pub fn enqueue(&mut self, keymap: KeyMap) -> bool {
        let trigger = keymap.trigger();
        debug!("queueing macro {trigger}");
        self.queue.push_back(QueueEntry { trigger, keymap });
        if self.idle_pending {
            return false;
        }
        self.idle_pending = true;
        true
    }

    /// Takes the oldest entry and marks its trigger as executing. The caller
    /// must hand the trigger back through [`Dispatcher::finish`].
    pub fn begin_next(&mut self) -> Option<QueueEntry> {
        let entry = self.queue.pop_front()?;
        self.executing.push(entry.trigger);
        Some(entry)
    }

    /// Unmarks `trigger` and reports whether another idle pass is needed.
    pub fn finish(&mut self, trigger: &Trigger) -> bool {
        if let Some(pos) = self.executing.iter().rposition(|t| t == trigger) {
            self.executing.remove(pos);
        }
        self.idle_pending = !self.queue.is_empty();
        self.idle_pending
    }

    pub fn needs_poll(&self) -> bool {
        self.idle_pending
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn executing(&self) -> &[Trigger] {
        &self.executing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyEvent, ModState};

    fn map(c: char) -> KeyMap {
        KeyMap::new(
            Trigger::new(c as u32, ModState::CONTROL),
            vec![KeyEvent::press(c as u32, ModState::NONE, "w").into()],
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.enqueue(map('1')));
        assert!(!dispatcher.enqueue(map('2')));
        assert!(dispatcher.needs_poll());

        let first = dispatcher.begin_next().expect("queued");
        assert_eq!(first.trigger, map('1').trigger());
        assert!(dispatcher.is_executing(&first.trigger));
        assert!(dispatcher.finish(&first.trigger));
        assert!(!dispatcher.is_executing(&first.trigger));

        let second = dispatcher.begin_next().expect("queued");
        assert_eq!(second.trigger, map('2').trigger());
        assert!(!dispatcher.finish(&second.trigger));
        assert!(!dispatcher.needs_poll());
        assert!(dispatcher.begin_next().is_none());
    }

    #[test]
    fn test_enqueue_during_execution_reschedules() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.enqueue(map('1'));
        let entry = dispatcher.begin_next().expect("queued");
        // a hit arriving mid-playback joins the pending pass
        assert!(!dispatcher.enqueue(map('2')));
        assert!(dispatcher.finish(&entry.trigger));
        assert_eq!(dispatcher.queued(), 1);
    }
}
