//! The single event loop that owns all plugin state.
//!
//! Host events, transport events and timer events arrive on three
//! unbounded channels. [`Dispatcher::run`] handles them one at a time on
//! one task, so every handler sees a consistent registry and no handler
//! ever runs re-entrantly.

use std::future::Future;

use tokio::sync::mpsc;

use super::counter::CounterService;
use crate::domain::ContextId;
use crate::host::InboundEvent;
use crate::obs::TransportEvent;

/// Event posted by a timer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// The health period elapsed.
    HealthTick,
    /// A long-press timer ran out.
    LongPressElapsed {
        /// Context the key belongs to.
        context: ContextId,
        /// Timer id assigned when it was armed.
        timer: u64,
    },
}

/// Sender half for [`ControlEvent`]s.
pub type ControlSender = mpsc::UnboundedSender<ControlEvent>;

/// Event loop over host, transport and control channels.
#[derive(Debug)]
pub struct Dispatcher {
    service: CounterService,
    host_events: mpsc::UnboundedReceiver<InboundEvent>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    control_events: mpsc::UnboundedReceiver<ControlEvent>,
}

impl Dispatcher {
    /// Creates a dispatcher feeding `service` from the three receivers.
    #[must_use]
    pub fn new(
        service: CounterService,
        host_events: mpsc::UnboundedReceiver<InboundEvent>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        control_events: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> Self {
        Self {
            service,
            host_events,
            transport_events,
            control_events,
        }
    }

    /// Runs until `shutdown` resolves or the host event stream ends, then
    /// closes every session and returns the service.
    pub async fn run<F>(mut self, shutdown: F) -> CounterService
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = self.host_events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("host event stream ended");
                        break;
                    };
                    self.service.handle_host_event(event);
                }
                Some(event) = self.transport_events.recv() => {
                    self.service.handle_transport_event(event);
                }
                Some(event) = self.control_events.recv() => {
                    self.service.handle_control(event);
                }
            }
        }
        self.service.shutdown();
        self.service
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::host::HostSink;
    use crate::host::messages::SettingsPayload;
    use crate::obs::{Transport, TransportEventKind};
    use crate::service::display::DisplayNotifier;
    use crate::service::health::HealthMonitor;
    use crate::service::long_press::LongPressTimers;
    use crate::service::session_manager::SessionManager;
    use crate::test_support::{HELLO, IDENTIFIED, MockTransport, RecordingHost};
    use serde_json::json;

    #[tokio::test]
    async fn serializes_all_three_sources() {
        let transport = Arc::new(MockTransport::default());
        let host = Arc::new(RecordingHost::default());
        let sink = Arc::clone(&host) as Arc<dyn HostSink>;
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let sessions = SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            transport_tx.clone(),
            DisplayNotifier::new(Arc::clone(&sink), "?"),
        );
        let service = CounterService::new(
            sessions,
            sink,
            control_tx,
            LongPressTimers::new(Duration::from_secs(3)),
            HealthMonitor::new(Duration::from_secs(12)),
        );
        let dispatcher = Dispatcher::new(service, host_rx, transport_rx, control_rx);
        let running = tokio::spawn(dispatcher.run(std::future::pending()));

        let ctx = ContextId::new("ctx1");
        let _ = host_tx.send(InboundEvent::WillAppear {
            context: ctx.clone(),
            action: None,
            payload: SettingsPayload {
                settings: Some(json!({ "count": 5, "obsEnabled": true })),
            },
        });
        while transport.open_count() == 0 {
            tokio::task::yield_now().await;
        }
        transport.accept(0);
        for frame in [HELLO, IDENTIFIED] {
            let _ = transport_tx.send(transport.event(0, TransportEventKind::Message(frame.into())));
        }
        while host.last_title(&ctx).as_deref() != Some("5") {
            tokio::task::yield_now().await;
        }

        drop(host_tx);
        let Ok(service) = running.await else {
            panic!("dispatcher task failed");
        };
        let has_session = service
            .sessions()
            .registry()
            .get(&ctx)
            .map(|r| r.session.is_some());
        assert_eq!(has_session, Some(false));
        assert!(transport.close_requested(0));
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_loop() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::default());
        let sink: Arc<dyn HostSink> = Arc::new(RecordingHost::default());
        let (_host_tx, host_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let sessions = SessionManager::new(
            transport,
            transport_tx,
            DisplayNotifier::new(Arc::clone(&sink), "?"),
        );
        let service = CounterService::new(
            sessions,
            sink,
            control_tx,
            LongPressTimers::new(Duration::from_secs(3)),
            HealthMonitor::new(Duration::from_secs(12)),
        );
        let dispatcher = Dispatcher::new(service, host_rx, transport_rx, control_rx);
        let service = dispatcher.run(async {}).await;
        assert!(service.sessions().registry().is_empty());
    }
}
