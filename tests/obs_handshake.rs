//! End-to-end handshake against a local obs-websocket stand-in.
#![allow(clippy::panic, missing_docs)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use obs_counter_bridge::domain::{ContextConfig, ContextId, PersistedSettings, SessionStatus};
use obs_counter_bridge::error::BridgeError;
use obs_counter_bridge::host::{HostSink, InspectorMessage};
use obs_counter_bridge::obs::protocol::auth_response;
use obs_counter_bridge::obs::{Transport, WsTransport};
use obs_counter_bridge::service::{DisplayNotifier, SessionManager};

#[derive(Debug, Default)]
struct Titles(Mutex<Vec<(ContextId, String)>>);

impl HostSink for Titles {
    fn set_title(&self, context: &ContextId, title: &str) -> Result<(), BridgeError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((context.clone(), title.to_string()));
        Ok(())
    }

    fn set_settings(&self, _: &ContextId, _: &PersistedSettings) -> Result<(), BridgeError> {
        Ok(())
    }

    fn send_to_inspector(
        &self,
        _: &ContextId,
        _: Option<&str>,
        _: &InspectorMessage,
    ) -> Result<(), BridgeError> {
        Ok(())
    }

    fn show_ok(&self, _: &ContextId) -> Result<(), BridgeError> {
        Ok(())
    }
}

async fn read_json<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("client sent non-JSON text: {text}");
                };
                return value;
            }
            Some(Ok(_)) => {}
            other => panic!("connection ended early: {other:?}"),
        }
    }
}

#[tokio::test]
async fn authenticates_and_pushes_value() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };

    let server = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            panic!("accept failed");
        };
        let Ok(mut ws) = accept_async(stream).await else {
            panic!("websocket handshake failed");
        };
        let hello = json!({
            "op": 0,
            "d": {
                "obsWebSocketVersion": "5.4.2",
                "rpcVersion": 1,
                "authentication": { "salt": "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=", "challenge": "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=" }
            }
        });
        let _ = ws.send(Message::text(hello.to_string())).await;

        let identify = read_json(&mut ws).await;
        let _ = ws
            .send(Message::text(
                json!({ "op": 2, "d": { "negotiatedRpcVersion": 1 } }).to_string(),
            ))
            .await;
        let request = read_json(&mut ws).await;
        (identify, request)
    });

    let host = Arc::new(Titles::default());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(Duration::from_secs(5)));
    let mut sessions = SessionManager::new(
        transport,
        events_tx,
        DisplayNotifier::new(Arc::clone(&host) as Arc<dyn HostSink>, "?"),
    );

    let ctx = ContextId::new("ctx1");
    sessions.apply_config(
        &ctx,
        ContextConfig {
            enabled: true,
            url: format!("ws://{addr}"),
            credential: "supersecretpassword".into(),
            target_field: "CounterText".into(),
            value: 5,
        },
    );

    let authenticated = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events_rx.recv().await {
            sessions.handle_transport_event(event);
            let status = sessions
                .registry()
                .get(&ctx)
                .and_then(|r| r.session.as_ref())
                .map(|s| s.status());
            if status == Some(SessionStatus::Authenticated) {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(authenticated.ok(), Some(true));
    assert_eq!(sessions.render(&ctx).map(|s| s.text).as_deref(), Some("5"));

    let Ok((identify, request)) = server.await else {
        panic!("server task failed");
    };
    assert_eq!(identify.pointer("/op"), Some(&json!(1)));
    assert_eq!(
        identify.pointer("/d/authentication"),
        Some(&json!("1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4="))
    );
    assert_eq!(
        identify.pointer("/d/authentication").and_then(Value::as_str),
        Some(
            auth_response(
                "supersecretpassword",
                "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=",
                "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY="
            )
            .as_str()
        )
    );
    assert_eq!(request.pointer("/op"), Some(&json!(6)));
    assert_eq!(
        request.pointer("/d/requestData/inputSettings/text"),
        Some(&json!("5"))
    );

    let titles = host.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(titles.last(), Some(&(ctx, "5".to_string())));
}

#[tokio::test]
async fn refused_connection_closes_session() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    drop(listener);

    let host = Arc::new(Titles::default());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(Duration::from_secs(5)));
    let mut sessions = SessionManager::new(
        transport,
        events_tx,
        DisplayNotifier::new(Arc::clone(&host) as Arc<dyn HostSink>, "?"),
    );
    let ctx = ContextId::new("ctx1");
    sessions.apply_config(
        &ctx,
        ContextConfig {
            enabled: true,
            url: format!("ws://{addr}"),
            value: 3,
            ..ContextConfig::default()
        },
    );

    let closed = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events_rx.recv().await {
            sessions.handle_transport_event(event);
            let session = sessions.registry().get(&ctx).and_then(|r| r.session.as_ref());
            if session.map(|s| s.status()) == Some(SessionStatus::Closed) {
                return session.and_then(|s| s.last_error.clone());
            }
        }
        None
    })
    .await;
    let Ok(Some(_error)) = closed else {
        panic!("expected an error followed by close");
    };
    assert_eq!(sessions.render(&ctx).map(|s| s.text).as_deref(), Some("?"));
}
