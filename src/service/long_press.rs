//! Cancellable long-press timers, one per context.
//!
//! `keyDown` arms a timer; `keyUp` cancels it. A timer that runs out posts
//! [`ControlEvent::LongPressElapsed`] to the dispatcher, which claims it
//! with [`LongPressTimers::take_fired`]. Every timer carries an id so an
//! expiry that raced with a cancel or a re-arm is recognised and ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::dispatcher::{ControlEvent, ControlSender};
use crate::domain::ContextId;

/// Pending long-press timers.
#[derive(Debug)]
pub struct LongPressTimers {
    delay: Duration,
    pending: HashMap<ContextId, (u64, JoinHandle<()>)>,
    next_id: u64,
}

impl LongPressTimers {
    /// Creates an empty set of timers that fire after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    /// Starts the timer for `context`, replacing any pending one. Returns
    /// the new timer id.
    pub fn arm(&mut self, context: &ContextId, control: &ControlSender) -> u64 {
        self.cancel(context);
        self.next_id += 1;
        let timer = self.next_id;
        let delay = self.delay;
        let tx = control.clone();
        let ctx = context.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ControlEvent::LongPressElapsed {
                context: ctx,
                timer,
            });
        });
        self.pending.insert(context.clone(), (timer, task));
        timer
    }

    /// Cancels the pending timer for `context`. Returns `true` if one was
    /// pending; cancelling twice, or after the timer fired, is a no-op.
    pub fn cancel(&mut self, context: &ContextId) -> bool {
        match self.pending.remove(context) {
            Some((_, task)) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Claims an expiry. Returns `true` only if `timer` is still the
    /// pending timer for `context`; it is no longer pending afterwards.
    pub fn take_fired(&mut self, context: &ContextId, timer: u64) -> bool {
        match self.pending.get(context) {
            Some((id, _)) if *id == timer => {
                self.pending.remove(context);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if a timer is pending for `context`.
    #[must_use]
    pub fn is_pending(&self, context: &ContextId) -> bool {
        self.pending.contains_key(context)
    }

    /// Cancels every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, (_, task)) in self.pending.drain() {
            task.abort();
        }
    }
}

impl Drop for LongPressTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
