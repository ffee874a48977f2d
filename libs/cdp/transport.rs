// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Correlated JSON-RPC over a single DevTools WebSocket.
//!
//! One writer task keeps outbound frames in FIFO order, one reader task
//! demultiplexes responses from events, and every outstanding command gets
//! its own deadline task. A pending slot is freed exactly once, by exactly
//! one of: response, protocol error, timeout, disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use fastwebsockets::FragmentCollectorRead;
use fastwebsockets::Frame;
use fastwebsockets::OpCode;
use fastwebsockets::Payload;
use fastwebsockets::WebSocketError;
use fastwebsockets::handshake;
use http_body_util::Empty;
use hyper::Request;
use hyper::header;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::errors::CdpError;
use crate::protocol::EventMessage;
use crate::protocol::IncomingMessage;
use crate::protocol::OutgoingCommand;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransportOptions {
  pub command_timeout: Duration,
  pub connect_timeout: Duration,
}

impl Default for TransportOptions {
  fn default() -> Self {
    Self {
      command_timeout: DEFAULT_COMMAND_TIMEOUT,
      connect_timeout: DEFAULT_CONNECT_TIMEOUT,
    }
  }
}

/// Signal emitted for every inbound frame that lacks an `id`, plus a final
/// `Closed` once the socket goes away.
#[derive(Debug, Clone)]
pub enum TransportEvent {
  Event(EventMessage),
  Closed,
}

struct PendingCommand {
  method: String,
  slot: oneshot::Sender<Result<Value, CdpError>>,
  deadline: JoinHandle<()>,
}

#[derive(Default)]
struct Correlation {
  next_id: u32,
  closed: bool,
  slots: HashMap<u32, PendingCommand>,
}

struct Shared {
  correlation: Mutex<Correlation>,
  writer_tx: mpsc::UnboundedSender<Frame<'static>>,
  events_tx: mpsc::UnboundedSender<TransportEvent>,
  session_id: Mutex<Option<String>>,
  closed: AtomicBool,
  command_timeout: Duration,
}

impl Shared {
  /// Idempotent teardown: mark closed, fail every pending slot, announce
  /// `Closed` to the event consumer.
  fn shutdown(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    let drained = {
      let mut correlation = self.correlation.lock();
      correlation.closed = true;
      std::mem::take(&mut correlation.slots)
    };
    for (id, pending) in drained {
      pending.deadline.abort();
      log::debug!(
        "failing in-flight {} (id {id}): connection closed",
        pending.method
      );
      let _ = pending.slot.send(Err(CdpError::ConnectionClosed));
    }
    let _ = self.events_tx.send(TransportEvent::Closed);
  }

  fn handle_frame(&self, payload: &[u8]) {
    let message: IncomingMessage = match serde_json::from_slice(payload) {
      Ok(message) => message,
      Err(err) => {
        // Never kill the reader over a bad payload.
        log::warn!("dropping undecodable frame: {err}");
        return;
      }
    };
    if let Some(id) = message.id {
      self.handle_response(id, message);
    } else if let Some(method) = message.method {
      let event = EventMessage {
        method,
        params: message.params.unwrap_or(Value::Null),
      };
      let _ = self.events_tx.send(TransportEvent::Event(event));
    } else {
      log::warn!("dropping frame with neither id nor method");
    }
  }

  fn handle_response(&self, id: u32, message: IncomingMessage) {
    let Some(pending) = self.correlation.lock().slots.remove(&id) else {
      // The caller's deadline already freed the slot; drain silently.
      log::trace!("draining late response for id {id}");
      return;
    };
    pending.deadline.abort();
    let outcome = match message.error {
      Some(error) => Err(CdpError::Protocol {
        method: pending.method.clone(),
        error,
      }),
      None => Ok(message.result.unwrap_or(Value::Null)),
    };
    if pending.slot.send(outcome).is_err() {
      // The caller stopped waiting (a pause won an evaluate race, or the
      // surrounding future was dropped). The slot is still freed here.
      log::trace!("no caller left for {} (id {id})", pending.method);
    }
  }
}

fn spawn_deadline(
  shared: Arc<Shared>,
  id: u32,
  method: String,
  timeout: Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    tokio::time::sleep(timeout).await;
    let Some(pending) = shared.correlation.lock().slots.remove(&id) else {
      return;
    };
    let ms = timeout.as_millis() as u64;
    log::debug!("{method} (id {id}) exceeded its {ms} ms deadline");
    let _ = pending.slot.send(Err(CdpError::Timeout { method, id, ms }));
  })
}

struct SpawnExecutor;

impl<Fut> hyper::rt::Executor<Fut> for SpawnExecutor
where
  Fut: std::future::Future + Send + 'static,
  Fut::Output: Send + 'static,
{
  fn execute(&self, fut: Fut) {
    tokio::spawn(fut);
  }
}

/// The session's single connection to a browser target.
pub struct CdpTransport {
  shared: Arc<Shared>,
  reader: JoinHandle<()>,
  writer: JoinHandle<()>,
}

impl CdpTransport {
  /// Open the WebSocket and start the reader/writer tasks. The returned
  /// receiver sees every event frame in arrival order, then one `Closed`.
  pub async fn connect(
    ws_url: &Url,
    options: TransportOptions,
  ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), CdpError> {
    let host = ws_url.host_str().ok_or(url::ParseError::EmptyHost)?;
    let port = ws_url.port().unwrap_or(match ws_url.scheme() {
      "wss" | "https" => 443,
      _ => 80,
    });
    let addr = format!("{host}:{port}");

    let connect = TcpStream::connect(&addr);
    let stream = tokio::time::timeout(options.connect_timeout, connect)
      .await
      .map_err(|_| CdpError::WebSocket(format!("connecting to {addr} timed out")))?
      .map_err(|err| CdpError::WebSocket(err.to_string()))?;

    let req = Request::builder()
      .method("GET")
      .uri(ws_url.path())
      .header("Host", host)
      .header(header::UPGRADE, "websocket")
      .header(header::CONNECTION, "Upgrade")
      .header("Sec-WebSocket-Key", handshake::generate_key())
      .header("Sec-WebSocket-Version", "13")
      .body(Empty::<Bytes>::new())
      .map_err(|err| CdpError::WebSocket(err.to_string()))?;

    let upgrade = handshake::client(&SpawnExecutor, req, stream);
    let (mut ws, _response) =
      tokio::time::timeout(options.connect_timeout, upgrade)
        .await
        .map_err(|_| {
          CdpError::WebSocket("websocket handshake timed out".to_string())
        })??;
    ws.set_auto_close(true);
    ws.set_auto_pong(true);

    let (ws_rx, mut ws_tx) = ws.split(tokio::io::split);

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Frame<'static>>();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(Shared {
      correlation: Mutex::new(Correlation::default()),
      writer_tx: writer_tx.clone(),
      events_tx,
      session_id: Mutex::new(None),
      closed: AtomicBool::new(false),
      command_timeout: options.command_timeout,
    });

    // Single writer: frames leave in exactly the order they were queued.
    let writer = tokio::spawn(async move {
      while let Some(frame) = writer_rx.recv().await {
        let is_close = frame.opcode == OpCode::Close;
        if let Err(err) = ws_tx.write_frame(frame).await {
          log::debug!("websocket write failed: {err}");
          break;
        }
        if is_close {
          break;
        }
      }
    });

    let reader_shared = shared.clone();
    let reader = tokio::spawn(async move {
      let mut ws_rx = FragmentCollectorRead::new(ws_rx);
      // Control replies (pong, close echo) the read half is obligated to
      // produce are routed through the writer task like everything else.
      let mut obligated = |frame: Frame<'_>| {
        let frame = Frame::new(
          frame.fin,
          frame.opcode,
          None,
          Payload::Owned(frame.payload.to_vec()),
        );
        let sent = writer_tx
          .send(frame)
          .map_err(|_| WebSocketError::ConnectionClosed);
        async move { sent }
      };
      loop {
        match ws_rx.read_frame::<_, WebSocketError>(&mut obligated).await {
          Ok(frame) => match frame.opcode {
            OpCode::Text | OpCode::Binary => {
              log::trace!("<- {}", String::from_utf8_lossy(&frame.payload));
              reader_shared.handle_frame(&frame.payload);
            }
            OpCode::Close => break,
            _ => {}
          },
          Err(err) => {
            if !reader_shared.closed.load(Ordering::SeqCst) {
              log::debug!("websocket read failed: {err}");
            }
            break;
          }
        }
      }
      reader_shared.shutdown();
    });

    Ok((
      Self {
        shared,
        reader,
        writer,
      },
      events_rx,
    ))
  }

  /// `send` with the transport's default per-command deadline.
  pub async fn send(
    &self,
    method: &str,
    params: Option<Value>,
  ) -> Result<Value, CdpError> {
    self
      .send_with_timeout(method, params, self.shared.command_timeout)
      .await
  }

  pub async fn send_with_timeout(
    &self,
    method: &str,
    params: Option<Value>,
    timeout: Duration,
  ) -> Result<Value, CdpError> {
    if self.shared.closed.load(Ordering::SeqCst) {
      return Err(CdpError::NotConnected);
    }
    let session_id = self.shared.session_id.lock().clone();
    let (slot_tx, slot_rx) = oneshot::channel();

    let id = {
      let mut correlation = self.shared.correlation.lock();
      if correlation.closed {
        return Err(CdpError::ConnectionClosed);
      }
      let id = correlation.next_id;
      correlation.next_id = correlation.next_id.wrapping_add(1);
      id
    };

    let command = OutgoingCommand {
      id,
      method,
      params,
      session_id: session_id.as_deref(),
    };
    let payload = serde_json::to_vec(&command)
      .map_err(|err| CdpError::Decode(err.to_string()))?;
    log::trace!("-> {}", String::from_utf8_lossy(&payload));

    let deadline =
      spawn_deadline(self.shared.clone(), id, method.to_string(), timeout);
    {
      let mut correlation = self.shared.correlation.lock();
      if correlation.closed {
        deadline.abort();
        return Err(CdpError::ConnectionClosed);
      }
      correlation.slots.insert(
        id,
        PendingCommand {
          method: method.to_string(),
          slot: slot_tx,
          deadline,
        },
      );
    }

    let frame = Frame::text(Payload::Owned(payload));
    if self.shared.writer_tx.send(frame).is_err() {
      if let Some(pending) = self.shared.correlation.lock().slots.remove(&id) {
        pending.deadline.abort();
      }
      return Err(CdpError::ConnectionClosed);
    }

    match slot_rx.await {
      Ok(outcome) => outcome,
      // The slot sender can only disappear through `shutdown`.
      Err(_) => Err(CdpError::ConnectionClosed),
    }
  }

  /// Attach (or clear) the flat `sessionId` stamped onto outgoing frames.
  pub fn set_session_id(&self, session_id: Option<String>) {
    *self.shared.session_id.lock() = session_id;
  }

  pub fn is_connected(&self) -> bool {
    !self.shared.closed.load(Ordering::SeqCst)
  }

  /// Number of commands currently awaiting a response.
  pub fn pending_count(&self) -> usize {
    self.shared.correlation.lock().slots.len()
  }

  /// Close the socket and fail every in-flight call with
  /// `ConnectionClosed`.
  pub async fn disconnect(&self) {
    let _ = self.shared.writer_tx.send(Frame::close(1000, b""));
    self.shared.shutdown();
  }
}

impl Drop for CdpTransport {
  fn drop(&mut self) {
    self.shared.shutdown();
    self.reader.abort();
    self.writer.abort();
  }
}
