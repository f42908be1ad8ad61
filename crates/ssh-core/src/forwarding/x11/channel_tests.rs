//! Unit tests for the forwarding channel relay.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc,
};
use xb_types::ssh::{X11Display, X11Forward};

use super::*;
use crate::{
    SshCoreError,
    forwarding::x11::{cookie::X11Cookie, setup::BYTE_ORDER_LSB_FIRST},
};

const PROTOCOL: &[u8] = b"MIT-MAGIC-COOKIE-1";

struct MockChannel {
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    sent: Arc<Mutex<Vec<u8>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl X11ChannelIo for MockChannel {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        self.inbound.recv().await
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn confirm_open(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("confirm");
        Ok(())
    }

    async fn refuse_open(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("refuse");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("close");
        Ok(())
    }
}

struct Harness {
    remote: mpsc::UnboundedSender<ChannelEvent>,
    sent: Arc<Mutex<Vec<u8>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

fn mock_channel() -> (MockChannel, Harness) {
    let (remote, inbound) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let channel = MockChannel {
        inbound,
        sent: Arc::clone(&sent),
        calls: Arc::clone(&calls),
    };
    (channel, Harness { remote, sent, calls })
}

fn context(local_cookie: Option<Vec<u8>>) -> Arc<X11Context> {
    Arc::new(X11Context::new(Some(&X11Forward {
        display: X11Display {
            host: Some("127.0.0.1".into()),
            display: 0,
            screen: 0,
        },
        local_cookie,
    })))
}

fn session_cookie() -> X11Cookie {
    X11Cookie::from_bytes([0x5a; 16])
}

fn setup_packet(data: &[u8]) -> Vec<u8> {
    let mut packet = vec![BYTE_ORDER_LSB_FIRST, 0, 11, 0, 0, 0];
    packet.extend_from_slice(&(PROTOCOL.len() as u16).to_le_bytes());
    packet.extend_from_slice(&(data.len() as u16).to_le_bytes());
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(PROTOCOL);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(data);
    packet
}

async fn display() -> (TcpListener, DisplayTarget) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (
        listener,
        DisplayTarget::Tcp {
            host: "127.0.0.1".into(),
            port,
        },
    )
}

async fn wait_for_sent(sent: &Arc<Mutex<Vec<u8>>>, expected: &[u8]) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if sent.lock().unwrap().as_slice() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("relayed bytes arrive");
}

#[tokio::test]
async fn accepted_cookie_relays_both_directions() {
    let context = context(None);
    context.install_cookie(session_cookie()).unwrap();
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let channel = X11Channel::new(&context, target, io);
    assert_eq!(channel.state(), ChannelState::Opening);
    let relay = tokio::spawn(channel.run());
    let (mut server, _) = listener.accept().await.unwrap();

    let first = setup_packet(session_cookie().raw());
    harness.remote.send(ChannelEvent::Data(first.clone())).unwrap();
    let mut received = vec![0u8; first.len()];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(received, first);

    server.write_all(b"setup-reply").await.unwrap();
    wait_for_sent(&harness.sent, b"setup-reply").await;

    // Later frames are not inspected, even if they look like a bad setup packet.
    let second = setup_packet(&[0u8; 16]);
    harness.remote.send(ChannelEvent::Data(second.clone())).unwrap();
    let mut received = vec![0u8; second.len()];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(received, second);

    harness.remote.send(ChannelEvent::Eof).unwrap();
    let report = relay.await.unwrap().unwrap();
    assert_eq!(
        report,
        RelayReport {
            outcome: RelayOutcome::Closed,
            validated: true,
        }
    );
    assert_eq!(*harness.calls.lock().unwrap(), vec!["confirm", "close"]);
    assert_eq!(context.active_channels(), 0);
}

#[tokio::test]
async fn mismatched_cookie_forwards_nothing() {
    let context = context(None);
    context.install_cookie(session_cookie()).unwrap();
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let relay = tokio::spawn(X11Channel::new(&context, target, io).run());
    let (mut server, _) = listener.accept().await.unwrap();

    let mut wrong = *session_cookie().raw();
    wrong[0] ^= 0x01;
    harness.remote.send(ChannelEvent::Data(setup_packet(&wrong))).unwrap();

    let report = relay.await.unwrap().unwrap();
    assert_eq!(report.outcome, RelayOutcome::Rejected);
    assert!(!report.validated);

    let mut leaked = Vec::new();
    server.read_to_end(&mut leaked).await.unwrap();
    assert!(leaked.is_empty());
    assert_eq!(*harness.calls.lock().unwrap(), vec!["confirm", "close"]);
}

#[tokio::test]
async fn first_frame_passes_untouched_without_session_cookie() {
    let context = context(None);
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let relay = tokio::spawn(X11Channel::new(&context, target, io).run());
    let (mut server, _) = listener.accept().await.unwrap();

    let frame = setup_packet(&[9u8; 16]);
    harness.remote.send(ChannelEvent::Data(frame.clone())).unwrap();
    let mut received = vec![0u8; frame.len()];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(received, frame);

    drop(harness.remote);
    let report = relay.await.unwrap().unwrap();
    assert_eq!(report.outcome, RelayOutcome::Closed);
    assert!(!report.validated);
}

#[tokio::test]
async fn accepted_cookie_is_swapped_for_local_cookie() {
    let real = vec![0xc3u8; 16];
    let context = context(Some(real.clone()));
    context.install_cookie(session_cookie()).unwrap();
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let relay = tokio::spawn(X11Channel::new(&context, target, io).run());
    let (mut server, _) = listener.accept().await.unwrap();

    harness.remote.send(ChannelEvent::Data(setup_packet(session_cookie().raw()))).unwrap();
    let expected = setup_packet(&real);
    let mut received = vec![0u8; expected.len()];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(received, expected);

    harness.remote.send(ChannelEvent::Close).unwrap();
    assert!(relay.await.unwrap().unwrap().validated);
}

#[tokio::test]
async fn connect_failure_refuses_channel() {
    let context = context(None);
    let (listener, target) = display().await;
    drop(listener);
    let (io, harness) = mock_channel();

    let result = X11Channel::new(&context, target, io).run().await;
    assert!(matches!(result, Err(SshCoreError::ConnectionFailed { .. })));
    assert_eq!(*harness.calls.lock().unwrap(), vec!["refuse"]);
    assert_eq!(context.active_channels(), 0);
}

#[tokio::test]
async fn local_close_closes_channel() {
    let context = context(None);
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let relay = tokio::spawn(X11Channel::new(&context, target, io).run());
    let (mut server, _) = listener.accept().await.unwrap();
    server.write_all(b"last words").await.unwrap();
    drop(server);

    let report = relay.await.unwrap().unwrap();
    assert_eq!(report.outcome, RelayOutcome::Closed);
    assert_eq!(harness.sent.lock().unwrap().as_slice(), b"last words");
    assert_eq!(*harness.calls.lock().unwrap(), vec!["confirm", "close"]);
}

#[tokio::test]
async fn session_shutdown_cancels_relay() {
    let context = context(None);
    let (listener, target) = display().await;
    let (io, harness) = mock_channel();

    let relay = tokio::spawn(X11Channel::new(&context, target, io).run());
    let (mut server, _) = listener.accept().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.calls.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(context.close_all(), 1);
    let report = relay.await.unwrap().unwrap();
    assert_eq!(report.outcome, RelayOutcome::Cancelled);

    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(context.active_channels(), 0);
    drop(harness.remote);
}
