//! Serving DAP clients over stdio or TCP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use swfdap_adapter::{DebugSession, EventEmitter};
use swfdap_config::AdapterConfig;
use swfdap_core::{
    LaunchTarget, NativeError, NativeSession, RuntimeInfo, Scenario, SessionManager,
    SimulatedManager, SimulatedSession,
};
use swfdap_platform::{DebuggeeProcess, ProcessLauncher};
use swfdap_protocol::{read_message, write_message, Event, ProtocolMessage, Request, Response};

/// Creates the session manager for one client connection.
pub(crate) type ManagerFactory = Arc<dyn Fn() -> Arc<dyn SessionManager> + Send + Sync>;

/// A manager replaying `scenario` from scratch for every connection.
pub(crate) fn scenario_factory(scenario: Scenario) -> ManagerFactory {
    Arc::new(move || {
        let session = Arc::new(SimulatedSession::from_scenario(scenario.clone()));
        Arc::new(SimulatedManager::new(session)) as Arc<dyn SessionManager>
    })
}

pub(crate) fn unavailable_factory() -> ManagerFactory {
    Arc::new(|| Arc::new(UnavailableManager) as Arc<dyn SessionManager>)
}

/// Stands in when no native debugger backend is configured. Every request
/// fails with an explanation.
struct UnavailableManager;

impl UnavailableManager {
    fn error() -> NativeError {
        NativeError::Unsupported(
            "no native SWF debugger is configured; start swfdap with --scenario".to_string(),
        )
    }
}

impl SessionManager for UnavailableManager {
    fn start_listening(&self) -> Result<(), NativeError> {
        Err(Self::error())
    }

    fn stop_listening(&self) -> Result<(), NativeError> {
        Ok(())
    }

    fn supports_launch(&self) -> bool {
        false
    }

    fn find_runtime(&self, _target: &LaunchTarget) -> Option<RuntimeInfo> {
        None
    }

    fn launch(
        &self,
        _target: &LaunchTarget,
        _launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Arc<dyn NativeSession>, NativeError> {
        Err(Self::error())
    }

    fn launch_for_run(
        &self,
        _target: &LaunchTarget,
        _launcher: Option<Arc<dyn ProcessLauncher>>,
    ) -> Result<Box<dyn DebuggeeProcess>, NativeError> {
        Err(Self::error())
    }

    fn connect(&self, _port: u16) -> Result<Arc<dyn NativeSession>, NativeError> {
        Err(Self::error())
    }

    fn accept(&self) -> Result<Arc<dyn NativeSession>, NativeError> {
        Err(Self::error())
    }
}

/// Outbound messages, written in the order they were queued.
#[derive(Debug)]
enum Outbound {
    Response(Response),
    Event(Event),
}

/// Serves a single client on stdin/stdout.
pub(crate) async fn serve_stdio(factory: ManagerFactory, config: AdapterConfig) -> Result<()> {
    info!("serving on stdio");
    serve_connection(tokio::io::stdin(), tokio::io::stdout(), factory(), config).await
}

/// Accepts clients on `port` until the process is stopped. Each client
/// gets its own debug session.
pub(crate) async fn serve_tcp(port: u16, factory: ManagerFactory, config: AdapterConfig) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to listen on port {port}"))?;
    info!(port, "waiting for clients");
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        info!(%peer, "client connected");
        let (reader, writer) = stream.into_split();
        let manager = factory();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(reader, writer, manager, config).await {
                error!(%peer, error = %format!("{e:#}"), "client session failed");
            }
            info!(%peer, "client disconnected");
        });
    }
}

/// Runs one debug session over a byte stream pair. Returns when the client
/// disconnects or closes the stream.
pub(crate) async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    manager: Arc<dyn SessionManager>,
    config: AdapterConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_outbound(writer, out_rx));

    let (emitter, mut events) = EventEmitter::channel();
    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if forward_tx.send(Outbound::Event(event)).is_err() {
                break;
            }
        }
    });

    let mut session = DebugSession::new(manager, config, emitter);
    let mut disconnected = false;
    while let Some(raw) = read_message(&mut reader).await.context("failed to read request")? {
        match serde_json::from_value::<ProtocolMessage>(raw.clone()) {
            Ok(header) if header.message_type == "request" => {}
            Ok(header) => {
                debug!(seq = header.seq, kind = %header.message_type, "ignoring non-request message");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "message without seq or type");
                continue;
            }
        }
        let request: Request = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed request");
                continue;
            }
        };
        let response = session.handle_request(&request).await;
        if out_tx.send(Outbound::Response(response)).is_err() {
            break;
        }
        session.start_deferred_tasks();
        if request.command == "disconnect" {
            disconnected = true;
            break;
        }
    }

    if !disconnected {
        info!("client closed the stream, tearing down the session");
        session
            .handle_request(&Request::new(0, "disconnect", None))
            .await;
    }
    drop(session);
    forwarder.abort();
    drop(out_tx);
    writer_task.await.context("writer task failed")?
}

async fn write_outbound<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut seq: i64 = 0;
    while let Some(message) = outbound.recv().await {
        seq += 1;
        let value = match message {
            Outbound::Response(mut response) => {
                response.seq = seq;
                serde_json::to_value(response)
            }
            Outbound::Event(mut event) => {
                event.seq = seq;
                serde_json::to_value(event)
            }
        }
        .context("failed to serialize message")?;
        write_message(&mut writer, &value)
            .await
            .context("failed to write message")?;
    }
    Ok(())
}
