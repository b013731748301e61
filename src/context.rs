//! The playback context stack.
//!
//! Each frame is a position in a response sequence. A nested frame shares the
//! sequence of the frame below it; when the nested frame is popped the parent
//! resumes from wherever the child got to. Starting a new top-level sequence
//! discards whatever chain was running.

use crate::event::Event;
use log::debug;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Frame {
    events: Rc<[Event]>,
    pos: usize,
}

impl Frame {
    fn exhausted(&self) -> bool {
        self.pos >= self.events.len()
    }
}

#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<Frame>,
    pop_requested: bool,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn pop_requested(&self) -> bool {
        self.pop_requested
    }

    /// Replaces the whole chain with a single frame at the start of `events`.
    pub fn start(&mut self, events: Rc<[Event]>) {
        if self.is_active() {
            debug!("discarding {} macro context frame(s)", self.frames.len());
        }
        self.frames.clear();
        self.pop_requested = false;
        self.frames.push(Frame { events, pos: 0 });
    }

    /// Pushes a frame continuing the current one. False without a context.
    pub fn nest(&mut self) -> bool {
        let Some(top) = self.frames.last() else {
            return false;
        };
        let frame = top.clone();
        self.frames.push(frame);
        true
    }

    /// Asks the running frame to stop after the event currently executing.
    /// Only recorded while a context exists.
    pub fn request_pop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.pop_requested = true;
        true
    }

    /// Takes the next event of the top frame and moves past it. An exhausted
    /// top frame tears down the whole chain.
    pub fn advance(&mut self) -> Option<Event> {
        let top = self.frames.last_mut()?;
        match top.events.get(top.pos) {
            Some(event) => {
                let event = event.clone();
                top.pos += 1;
                Some(event)
            }
            None => {
                self.frames.clear();
                None
            }
        }
    }

    /// Bookkeeping after one event ran. Returns true if a pop request was
    /// honoured, in which case the caller stops advancing.
    pub fn settle(&mut self) -> bool {
        if self.frames.last().is_some_and(Frame::exhausted) {
            self.frames.clear();
        }
        if !self.pop_requested {
            return false;
        }
        self.pop_requested = false;
        match self.frames.pop() {
            Some(child) => match self.frames.last_mut() {
                Some(parent) => parent.pos = child.pos,
                None => debug!("macro context dissolved"),
            },
            None => debug!("pop requested after macro finished"),
        }
        true
    }

    /// Drops every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.pop_requested = false;
    }
}
