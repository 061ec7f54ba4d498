//! Counter semantics on top of the session manager.
//!
//! [`CounterService`] turns host events into configuration changes, value
//! changes and display refreshes. It owns the long-press timers and the
//! health monitor so both live and die with the contexts that need them.

use std::sync::Arc;

use super::dispatcher::{ControlEvent, ControlSender};
use super::health::{self, HealthMonitor};
use super::long_press::LongPressTimers;
use super::session_manager::SessionManager;
use crate::domain::{ContextConfig, ContextId, RawSettings};
use crate::host::{HostSink, InboundEvent, InspectorMessage};
use crate::obs::TransportEvent;

/// Host event handlers for the counter action.
#[derive(Debug)]
pub struct CounterService {
    sessions: SessionManager,
    timers: LongPressTimers,
    health: HealthMonitor,
    host: Arc<dyn HostSink>,
    control: ControlSender,
}

impl CounterService {
    /// Wires the service. `control` is where timers post their expiries.
    #[must_use]
    pub fn new(
        sessions: SessionManager,
        host: Arc<dyn HostSink>,
        control: ControlSender,
        timers: LongPressTimers,
        health: HealthMonitor,
    ) -> Self {
        Self {
            sessions,
            timers,
            health,
            host,
            control,
        }
    }

    /// The session manager.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Returns `true` while the health ticker runs.
    #[must_use]
    pub fn health_running(&self) -> bool {
        self.health.is_running()
    }

    /// Applies one host event.
    pub fn handle_host_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::WillAppear {
                context,
                action,
                payload,
            } => {
                let raw = RawSettings::from_value(payload.settings.as_ref());
                let outcome = self
                    .sessions
                    .apply_config(&context, ContextConfig::from_appear(&raw));
                if let Some(record) = self.sessions.registry_mut().get_mut(&context) {
                    record.action = action;
                    record.inspector_attached = true;
                }
                tracing::info!(%context, ?outcome, "context appeared");
                self.health.start(&self.control);
                self.sessions.refresh_display(&context);
            }
            InboundEvent::DidReceiveSettings { context, payload } => {
                let raw = RawSettings::from_value(payload.settings.as_ref());
                let previous = self.sessions.registry().get(&context).map(|r| r.config().clone());
                let config = ContextConfig::from_update(previous.as_ref(), &raw);
                let outcome = self.sessions.apply_config(&context, config);
                tracing::debug!(%context, ?outcome, "settings received");
                self.health.start(&self.control);
                self.sessions.refresh_display(&context);
            }
            InboundEvent::WillDisappear { context } => {
                self.timers.cancel(&context);
                self.sessions.remove_context(&context);
                tracing::info!(%context, "context disappeared");
                if self.sessions.registry().is_empty() {
                    self.health.stop();
                }
            }
            InboundEvent::KeyDown { context } => {
                if self.sessions.registry().get(&context).is_some() {
                    self.timers.arm(&context, &self.control);
                }
            }
            InboundEvent::KeyUp { context } => {
                if self.timers.cancel(&context) {
                    let value = self
                        .sessions
                        .registry()
                        .get(&context)
                        .map_or(0, |r| r.config().value);
                    self.store_value(&context, value.saturating_add(1));
                }
            }
            InboundEvent::SendToPlugin { context, payload } => {
                match InspectorMessage::from_payload(&payload) {
                    Some(InspectorMessage::UpdateCount { count }) => {
                        self.store_value(&context, count);
                    }
                    None => tracing::debug!(%context, "ignoring settings editor message"),
                }
            }
            InboundEvent::PropertyInspectorDidAppear { context, action } => {
                if let Some(record) = self.sessions.registry_mut().get_mut(&context) {
                    record.inspector_attached = true;
                    if action.is_some() {
                        record.action = action;
                    }
                }
                self.sessions.sync_inspector(&context);
            }
            InboundEvent::PropertyInspectorDidDisappear { context } => {
                if let Some(record) = self.sessions.registry_mut().get_mut(&context) {
                    record.inspector_attached = false;
                }
            }
            InboundEvent::Other => {}
        }
    }

    /// Applies one transport event.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        self.sessions.handle_transport_event(event);
    }

    /// Applies one timer event.
    pub fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::HealthTick => {
                health::sweep(&mut self.sessions);
            }
            ControlEvent::LongPressElapsed { context, timer } => {
                if self.timers.take_fired(&context, timer) {
                    tracing::debug!(%context, "long press, resetting counter");
                    self.store_value(&context, 0);
                    if let Err(e) = self.host.show_ok(&context) {
                        tracing::warn!(%context, error = %e, "showOk failed");
                    }
                }
            }
        }
    }

    /// Stops all timers and closes every session.
    pub fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.health.stop();
        self.sessions.close_all();
        tracing::info!(contexts = self.sessions.registry().len(), "sessions closed");
    }

    fn store_value(&mut self, context: &ContextId, value: i64) {
        let Some(config) = self.sessions.registry_mut().set_value(context, value) else {
            tracing::debug!(%context, "value change for unknown context");
            return;
        };
        let settings = config.to_settings();
        if let Err(e) = self.host.set_settings(context, &settings) {
            tracing::warn!(%context, error = %e, "persisting settings failed");
        }
        self.sessions.refresh_display(context);
    }
}
