// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Exercises the transport against an in-process WebSocket endpoint that
//! speaks just enough of the DevTools framing to script every correlation
//! path: results, protocol errors, silence, late replies and hangups.

use std::time::Duration;

use fastwebsockets::FragmentCollector;
use fastwebsockets::Frame;
use fastwebsockets::OpCode;
use fastwebsockets::Payload;
use fastwebsockets::upgrade;
use headlamp_cdp::CdpError;
use headlamp_cdp::CdpTransport;
use headlamp_cdp::TransportEvent;
use headlamp_cdp::TransportOptions;
use hyper::body::Incoming;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

/// Accepts connections and answers scripted pseudo-CDP commands:
///
/// - `Echo.ok` replies `{"echoed": <params>}`.
/// - `Echo.fail` replies with a protocol error.
/// - `Echo.silent` never replies.
/// - `Echo.late` replies after 200 ms.
/// - `Echo.emit` sends a `Custom.event` notification, then replies.
/// - `Echo.hangUp` closes the socket without replying.
async fn spawn_scripted_endpoint() -> Url {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();

  tokio::spawn(async move {
    while let Ok((stream, _)) = listener.accept().await {
      let service = hyper::service::service_fn(
        move |mut req: hyper::Request<Incoming>| async move {
          let (response, upgrade_fut) = upgrade::upgrade(&mut req)?;
          tokio::spawn(async move {
            let ws = upgrade_fut.await.unwrap();
            let _ = run_script(ws).await;
          });
          Ok::<_, fastwebsockets::WebSocketError>(response)
        },
      );
      let io = TokioIo::new(stream);
      tokio::spawn(async move {
        let _ = hyper::server::conn::http1::Builder::new()
          .serve_connection(io, service)
          .with_upgrades()
          .await;
      });
    }
  });

  Url::parse(&format!("ws://127.0.0.1:{port}/devtools/page/TEST")).unwrap()
}

async fn run_script(
  ws: fastwebsockets::WebSocket<TokioIo<Upgraded>>,
) -> Result<(), fastwebsockets::WebSocketError> {
  let mut ws = FragmentCollector::new(ws);
  loop {
    let frame = ws.read_frame().await?;
    match frame.opcode {
      OpCode::Close => break,
      OpCode::Text => {
        let command: Value = serde_json::from_slice(&frame.payload).unwrap();
        let id = command["id"].as_u64().unwrap();
        let method = command["method"].as_str().unwrap().to_string();
        match method.as_str() {
          "Echo.ok" => {
            let reply = json!({"id": id, "result": {"echoed": command["params"]}});
            write_json(&mut ws, &reply).await?;
          }
          "Echo.fail" => {
            let reply = json!({
              "id": id,
              "error": {"code": -32000, "message": "scripted failure"}
            });
            write_json(&mut ws, &reply).await?;
          }
          "Echo.silent" => {}
          "Echo.late" => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            write_json(&mut ws, &json!({"id": id, "result": {"late": true}}))
              .await?;
          }
          "Echo.emit" => {
            let event = json!({
              "method": "Custom.event",
              "params": {"from": "endpoint"}
            });
            write_json(&mut ws, &event).await?;
            write_json(&mut ws, &json!({"id": id, "result": {}})).await?;
          }
          "Echo.hangUp" => {
            ws.write_frame(Frame::close(1000, b"")).await?;
            break;
          }
          other => panic!("unscripted method {other}"),
        }
      }
      _ => {}
    }
  }
  Ok(())
}

async fn write_json(
  ws: &mut FragmentCollector<TokioIo<Upgraded>>,
  value: &Value,
) -> Result<(), fastwebsockets::WebSocketError> {
  let payload = serde_json::to_vec(value).unwrap();
  ws.write_frame(Frame::text(Payload::Owned(payload))).await
}

fn fast_options() -> TransportOptions {
  TransportOptions {
    command_timeout: Duration::from_millis(100),
    connect_timeout: Duration::from_secs(5),
  }
}

#[tokio::test]
async fn send_correlates_result_with_caller() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();

  let result = transport
    .send("Echo.ok", Some(json!({"n": 1})))
    .await
    .unwrap();
  assert_eq!(result, json!({"echoed": {"n": 1}}));
  assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn protocol_error_is_typed() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();

  let err = transport.send("Echo.fail", None).await.unwrap_err();
  match err {
    CdpError::Protocol { method, error } => {
      assert_eq!(method, "Echo.fail");
      assert_eq!(error.code, -32000);
      assert_eq!(error.message, "scripted failure");
    }
    other => panic!("expected protocol error, got {other:?}"),
  }
}

#[tokio::test]
async fn unanswered_send_times_out_and_frees_the_slot() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) = CdpTransport::connect(&url, fast_options())
    .await
    .unwrap();

  let err = transport.send("Echo.silent", None).await.unwrap_err();
  match err {
    CdpError::Timeout { method, ms, .. } => {
      assert_eq!(method, "Echo.silent");
      assert_eq!(ms, 100);
    }
    other => panic!("expected timeout, got {other:?}"),
  }
  assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn late_response_is_drained_without_breaking_the_stream() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) = CdpTransport::connect(&url, fast_options())
    .await
    .unwrap();

  // The deadline fires first; the scripted reply lands 100 ms later and
  // must be swallowed without disturbing later traffic.
  let err = transport.send("Echo.late", None).await.unwrap_err();
  assert!(matches!(err, CdpError::Timeout { .. }));
  tokio::time::sleep(Duration::from_millis(300)).await;
  assert_eq!(transport.pending_count(), 0);

  let result = transport.send("Echo.ok", None).await.unwrap();
  assert_eq!(result, json!({"echoed": null}));
}

#[tokio::test]
async fn events_flow_to_the_subscriber_in_order() {
  let url = spawn_scripted_endpoint().await;
  let (transport, mut events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();

  transport.send("Echo.emit", None).await.unwrap();

  match events.recv().await.unwrap() {
    TransportEvent::Event(event) => {
      assert_eq!(event.method, "Custom.event");
      assert_eq!(event.params, json!({"from": "endpoint"}));
    }
    TransportEvent::Closed => panic!("closed before the scripted event"),
  }
}

#[tokio::test]
async fn disconnect_fails_outstanding_sends_with_connection_closed() {
  let url = spawn_scripted_endpoint().await;
  let (transport, mut events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();
  let transport = std::sync::Arc::new(transport);

  let in_flight = {
    let transport = transport.clone();
    tokio::spawn(async move { transport.send("Echo.silent", None).await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;

  transport.disconnect().await;

  let err = in_flight.await.unwrap().unwrap_err();
  assert!(matches!(err, CdpError::ConnectionClosed));
  assert!(!transport.is_connected());
  assert_eq!(transport.pending_count(), 0);

  // New calls are refused without touching the wire.
  let err = transport.send("Echo.ok", None).await.unwrap_err();
  assert!(matches!(err, CdpError::NotConnected));

  // The subscriber observes the closure as a final signal.
  loop {
    match events.recv().await {
      Some(TransportEvent::Closed) => break,
      Some(TransportEvent::Event(_)) => continue,
      None => panic!("event stream ended without a Closed signal"),
    }
  }
}

#[tokio::test]
async fn peer_hangup_fails_outstanding_sends() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();

  let err = transport.send("Echo.hangUp", None).await.unwrap_err();
  assert!(matches!(err, CdpError::ConnectionClosed));
  assert!(!transport.is_connected());
}

#[tokio::test]
async fn writes_keep_issue_order() {
  let url = spawn_scripted_endpoint().await;
  let (transport, _events) =
    CdpTransport::connect(&url, TransportOptions::default())
      .await
      .unwrap();

  let (first, second, third) = tokio::join!(
    transport.send("Echo.ok", Some(json!({"seq": 0}))),
    transport.send("Echo.ok", Some(json!({"seq": 1}))),
    transport.send("Echo.ok", Some(json!({"seq": 2}))),
  );
  assert_eq!(first.unwrap(), json!({"echoed": {"seq": 0}}));
  assert_eq!(second.unwrap(), json!({"echoed": {"seq": 1}}));
  assert_eq!(third.unwrap(), json!({"echoed": {"seq": 2}}));
}
