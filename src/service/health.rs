//! Periodic health sweep.
//!
//! [`HealthMonitor`] owns the ticker task that posts
//! [`ControlEvent::HealthTick`] to the dispatcher. It runs only while at
//! least one context exists. [`sweep`] is what a tick does: every context
//! that needs OBS but lacks a healthy authenticated session is reconciled.
//! There is no backoff; retries happen on the tick only.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::dispatcher::{ControlEvent, ControlSender};
use super::session_manager::SessionManager;
use crate::domain::{ContextId, SessionStatus};

/// Process-wide health ticker.
#[derive(Debug)]
pub struct HealthMonitor {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Creates a stopped monitor ticking every `period`.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// Starts ticking. Returns `false` if already running.
    pub fn start(&mut self, control: &ControlSender) -> bool {
        if self.is_running() {
            return false;
        }
        let period = self.period;
        let tx = control.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(ControlEvent::HealthTick).is_err() {
                    break;
                }
            }
        }));
        tracing::debug!(period_secs = period.as_secs(), "health monitor started");
        true
    }

    /// Stops ticking. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("health monitor stopped");
                true
            }
            None => false,
        }
    }

    /// Returns `true` while the ticker task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reconciles every context whose required session is missing, not
/// authenticated, or sitting on a transport that is no longer open. Such
/// sessions are marked Closed first. Returns the contexts that were
/// reconciled.
pub fn sweep(sessions: &mut SessionManager) -> Vec<ContextId> {
    let mut unhealthy = Vec::new();
    for (context, record) in sessions.registry_mut().iter_mut() {
        if !record.config().requires_obs() {
            continue;
        }
        match record.session.as_mut() {
            Some(s) if s.is_authenticated() && s.transport_open() => {}
            Some(s) => {
                let was_authenticated = s.is_authenticated();
                if !s.transport_open() {
                    s.advance(SessionStatus::Closed);
                }
                tracing::debug!(
                    %context,
                    status = %s.status(),
                    age_ms = s.age().num_milliseconds(),
                    "session unhealthy"
                );
                unhealthy.push((context.clone(), was_authenticated));
            }
            None => unhealthy.push((context.clone(), false)),
        }
    }

    for (context, was_authenticated) in &unhealthy {
        sessions.reconcile(context);
        if *was_authenticated {
            sessions.on_status_change(context);
        }
    }
    if !unhealthy.is_empty() {
        tracing::info!(count = unhealthy.len(), "health sweep reconnecting");
    }
    unhealthy.into_iter().map(|(context, _)| context).collect()
}
