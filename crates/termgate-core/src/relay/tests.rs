use super::*;
use crate::test_support::{fake_peer, fake_pty, Sent, StalledSink};
use tokio::time::Instant;

fn config(idle_secs: u64) -> RelayConfig {
    RelayConfig {
        idle_timeout: Duration::from_secs(idle_secs),
        watchdog_tick: Duration::from_secs(1),
        initial_size: TerminalSize::default(),
    }
}

#[tokio::test]
async fn test_output_is_forwarded_and_eof_closes_normally() {
    let (shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();
    let relay = DuplexRelay::new(config(600));
    let state = relay.subscribe();
    assert_eq!(relay.state(), RelayState::Starting);

    shell.emit(b"hello ");
    shell.emit(b"world");
    shell.hang_up();

    let end = relay
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(end, RelayEnd::PtyClosed);
    assert_eq!(peer.output(), b"hello world".to_vec());
    assert_eq!(peer.close_codes(), vec![close_code::NORMAL]);
    assert_eq!(*state.borrow(), RelayState::Closed);
}

#[tokio::test]
async fn test_input_is_written_in_order() {
    let (shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();

    peer.send_binary(b"ls\n");
    peer.send_binary(b"");
    peer.send_binary(b"pwd\n");
    peer.disconnect();

    let end = DuplexRelay::new(config(600))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(end, RelayEnd::PeerDisconnected);
    assert_eq!(shell.input_string(), "ls\npwd\n");
    // nobody left to receive a close frame
    assert!(peer.close_codes().is_empty());
}

#[tokio::test]
async fn test_resize_requests_are_clamped() {
    let (shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();

    peer.send_text(r#"{"type":"resize","cols":1000,"rows":1}"#);
    peer.send_text(r#"{"type":"resize","cols":"120","rows":40}"#);
    peer.send_text(r#"{"type":"resize","cols":"wide"}"#);
    peer.send_text("garbage");
    peer.disconnect();

    DuplexRelay::new(config(600))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(
        shell.sizes(),
        vec![
            TerminalSize { cols: 400, rows: 5 },
            TerminalSize {
                cols: 120,
                rows: 40
            },
        ]
    );
    assert!(shell.input_string().is_empty());
}

#[tokio::test]
async fn test_ping_gets_pong() {
    let (_shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();

    peer.send_text(r#"{"type":"ping"}"#);
    peer.disconnect();

    DuplexRelay::new(config(600))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(peer.sent(), vec![Sent::Text(r#"{"type":"pong"}"#.to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_sends_error_then_closes() {
    let (_shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();

    let started = Instant::now();
    let end = DuplexRelay::new(config(30))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;
    let elapsed = started.elapsed();

    assert_eq!(end, RelayEnd::IdleTimeout);
    assert!(elapsed > Duration::from_secs(30));
    assert!(elapsed <= Duration::from_secs(31));

    let sent = peer.sent();
    assert_eq!(
        sent,
        vec![
            Sent::Text(r#"{"type":"error","message":"idle timeout"}"#.to_string()),
            Sent::Close(close_code::IDLE_TIMEOUT),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_ends_even_if_peer_stopped_reading() {
    let (_shell, handles) = fake_pty(false);
    let (_peer, _sink, source) = fake_peer();

    let started = Instant::now();
    let end = tokio::time::timeout(
        Duration::from_secs(3600),
        DuplexRelay::new(config(30)).run(
            RelayIo {
                sink: Box::new(StalledSink),
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        ),
    )
    .await
    .expect("relay should end despite a stalled peer");

    assert_eq!(end, RelayEnd::IdleTimeout);
    // idle timeout plus at most the bounded idle notice and close frame
    assert!(started.elapsed() <= Duration::from_secs(31) + CLOSE_TIMEOUT * 2);
}

#[tokio::test(start_paused = true)]
async fn test_pings_count_as_activity() {
    let (_shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();

    let pinger = {
        let peer = peer.clone();
        tokio::spawn(async move {
            for _ in 0..6 {
                tokio::time::sleep(Duration::from_secs(10)).await;
                peer.send_text(r#"{"type":"ping"}"#);
            }
        })
    };

    let started = Instant::now();
    let end = DuplexRelay::new(config(30))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;
    pinger.await.unwrap();

    assert_eq!(end, RelayEnd::IdleTimeout);
    assert!(started.elapsed() >= Duration::from_secs(90));
    let pongs = peer
        .texts()
        .into_iter()
        .filter(|msg| msg["type"] == "pong")
        .count();
    assert_eq!(pongs, 6);
}

#[tokio::test]
async fn test_shutdown_closes_with_going_away() {
    let (_shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();
    let token = CancellationToken::new();
    token.cancel();

    let end = DuplexRelay::new(config(600))
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            token,
        )
        .await;

    assert_eq!(end, RelayEnd::Shutdown);
    assert_eq!(peer.close_codes(), vec![close_code::GOING_AWAY]);
}

#[tokio::test]
async fn test_unattachable_pty_ends_with_process_io() {
    let (_shell, handles) = fake_pty(false);
    let (peer, sink, source) = fake_peer();
    // the fake hands out its reader only once
    let _reader = handles.master.try_clone_reader().unwrap();

    let relay = DuplexRelay::new(config(600));
    let state = relay.subscribe();
    let end = relay
        .run(
            RelayIo {
                sink,
                source,
                master: handles.master,
            },
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(end, RelayEnd::ProcessIo(_)));
    assert!(end.as_error().is_some());
    assert_eq!(peer.close_codes(), vec![close_code::NORMAL]);
    assert_eq!(*state.borrow(), RelayState::Closed);
}

#[test]
fn test_relay_end_mapping() {
    assert!(RelayEnd::PtyClosed.as_error().is_none());
    assert!(RelayEnd::Shutdown.as_error().is_none());
    assert!(matches!(
        RelayEnd::IdleTimeout.as_error(),
        Some(SessionError::IdleTimeout)
    ));
    assert!(matches!(
        RelayEnd::PeerDisconnected.as_error(),
        Some(SessionError::PeerDisconnected)
    ));
    assert_eq!(RelayEnd::ProcessIo("boom".into()).to_string(), "process_io: boom");
}
