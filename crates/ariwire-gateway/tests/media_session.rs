#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ariwire_core::error::Result;
use ariwire_gateway::config::{PlaybackConfig, RelayMode};
use ariwire_gateway::media::{run_media_session, MediaSession, MediaSettings};
use ariwire_gateway::transport::Frame;

use common::{pipe, Peer, WAIT};

fn source(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

struct TempAudio(PathBuf);

impl TempAudio {
    fn new(data: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("ariwire-{}.ulaw", uuid::Uuid::new_v4()));
        std::fs::write(&path, data).unwrap();
        Self(path)
    }

    fn name(&self) -> String {
        self.0.file_name().unwrap().to_string_lossy().into_owned()
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn settings(mode: RelayMode, playback: PlaybackConfig) -> Arc<MediaSettings> {
    Arc::new(MediaSettings {
        mode,
        playback,
        proxy: None,
    })
}

fn start(
    settings: Arc<MediaSettings>,
) -> (Peer, CancellationToken, JoinHandle<Result<Arc<MediaSession>>>) {
    let (conn, peer) = pipe("asterisk");
    let shutdown = CancellationToken::new();
    let task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { run_media_session(conn, "conn-1", settings, shutdown).await }
    });
    (peer, shutdown, task)
}

async fn finished(task: JoinHandle<Result<Arc<MediaSession>>>) -> Arc<MediaSession> {
    tokio::time::timeout(WAIT, task)
        .await
        .expect("session must end")
        .unwrap()
        .unwrap()
}

/// Frames between the buffering sentinels.
async fn read_transfer(peer: &mut Peer) -> (Vec<usize>, Vec<u8>, String) {
    assert_eq!(peer.recv_text().await, "START_MEDIA_BUFFERING");
    let mut sizes = Vec::new();
    let mut bytes = Vec::new();
    loop {
        match peer.recv().await {
            Frame::Binary(b) => {
                sizes.push(b.len());
                bytes.extend_from_slice(&b);
            }
            Frame::Text(stop) => return (sizes, bytes, stop),
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn echo_returns_frames_unchanged_and_in_order() {
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, PlaybackConfig::default()));

    peer.text("MEDIA_START channel:abc optimal_frame_size:160").await;
    for i in 0..10u8 {
        peer.binary(&[i; 160]).await;
    }
    for i in 0..10u8 {
        assert_eq!(peer.recv_binary().await.as_ref(), &[i; 160][..]);
    }

    // Control text is consumed, never echoed.
    peer.text("SOMETHING_ELSE").await;
    assert!(peer.is_silent_for(Duration::from_millis(50)).await);

    shutdown.cancel();
    let session = finished(task).await;
    assert_eq!(session.tag().as_deref(), Some("abc"));
    assert_eq!(session.optimal_frame_size(), 160);
    assert_eq!(session.id(), "conn-1");
}

#[tokio::test]
async fn xoff_holds_echo_until_xon() {
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, PlaybackConfig::default()));

    peer.text("MEDIA_START channel:abc").await;
    peer.text("MEDIA_XOFF").await;
    peer.binary(b"held").await;
    assert!(peer.is_silent_for(Duration::from_millis(100)).await);

    peer.text("MEDIA_XON").await;
    assert_eq!(peer.recv_binary().await.as_ref(), b"held");

    shutdown.cancel();
    finished(task).await;
}

#[tokio::test]
async fn media_start_plays_the_announcement_in_frame_sized_chunks() {
    let data = source(10_000);
    let announce = TempAudio::new(&data);
    let playback = PlaybackConfig {
        announce: Some(announce.0.clone()),
        ..PlaybackConfig::default()
    };
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, playback));

    peer.text("MEDIA_START channel:abc optimal_frame_size:160").await;
    let (sizes, bytes, stop) = read_transfer(&mut peer).await;
    assert_eq!(sizes.len(), 63);
    assert_eq!(sizes.iter().filter(|&&n| n == 160).count(), 62);
    assert_eq!(sizes[62], 80);
    assert_eq!(bytes, data);
    assert_eq!(stop, format!("STOP_MEDIA_BUFFERING {}", announce.name()));

    shutdown.cancel();
    finished(task).await;
}

#[tokio::test]
async fn audio_right_behind_media_start_is_not_echoed() {
    let data = source(1_000);
    let announce = TempAudio::new(&data);
    let playback = PlaybackConfig {
        announce: Some(announce.0.clone()),
        ..PlaybackConfig::default()
    };
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, playback));

    peer.text("MEDIA_START channel:abc optimal_frame_size:160").await;
    peer.binary(b"early").await;

    // Only the announcement goes out, untouched by the early frame.
    let (sizes, bytes, stop) = read_transfer(&mut peer).await;
    assert_eq!(sizes.len(), 7);
    assert_eq!(bytes, data);
    assert_eq!(stop, format!("STOP_MEDIA_BUFFERING {}", announce.name()));
    assert!(peer.is_silent_for(Duration::from_millis(100)).await);

    shutdown.cancel();
    finished(task).await;
}

#[tokio::test]
async fn echo_resumes_only_after_buffering_completes() {
    let data = source(1_000);
    let announce = TempAudio::new(&data);
    let playback = PlaybackConfig {
        announce: Some(announce.0.clone()),
        ..PlaybackConfig::default()
    };
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, playback));

    peer.text("MEDIA_START channel:abc optimal_frame_size:160").await;
    read_transfer(&mut peer).await;

    // Everything is queued but the far end is still playing it.
    peer.binary(b"during").await;
    assert!(peer.is_silent_for(Duration::from_millis(100)).await);

    peer.text("MEDIA_BUFFERING_COMPLETED").await;
    peer.binary(b"after").await;
    assert_eq!(peer.recv_binary().await.as_ref(), b"after");

    shutdown.cancel();
    let session = finished(task).await;
    assert!(!session.is_playback_active());
}

#[tokio::test]
async fn terminal_completion_hangs_up() {
    let (mut peer, _shutdown, task) = start(settings(RelayMode::Echo, PlaybackConfig::default()));

    peer.text("MEDIA_START channel:abc").await;
    peer.text("MEDIA_BUFFERING_COMPLETED zombies").await;
    assert_eq!(peer.recv_text().await, "HANGUP");

    // The session ends on its own and closes the socket.
    let session = finished(task).await;
    assert_eq!(session.tag().as_deref(), Some("abc"));
    assert_eq!(peer.recv().await, Frame::Close);
}

#[tokio::test]
async fn first_completion_arms_the_follow_up_once() {
    let follow = source(400);
    let follow_up = TempAudio::new(&follow);
    let playback = PlaybackConfig {
        follow_up: Some(follow_up.0.clone()),
        follow_up_delay_ms: 20,
        ..PlaybackConfig::default()
    };
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, playback));

    peer.text("MEDIA_START channel:abc optimal_frame_size:160").await;
    peer.text("MEDIA_BUFFERING_COMPLETED").await;

    let (sizes, bytes, stop) = read_transfer(&mut peer).await;
    assert_eq!(sizes, vec![160, 160, 80]);
    assert_eq!(bytes, follow);
    assert_eq!(stop, format!("STOP_MEDIA_BUFFERING {}", follow_up.name()));

    // A second non-terminal completion does not replay it.
    peer.text("MEDIA_BUFFERING_COMPLETED").await;
    assert!(peer.is_silent_for(Duration::from_millis(100)).await);

    shutdown.cancel();
    finished(task).await;
}

#[tokio::test]
async fn playback_mode_verifies_the_round_trip() {
    let data = source(1_000);
    let announce = TempAudio::new(&data);
    let playback = PlaybackConfig {
        announce: Some(announce.0.clone()),
        settle_ms: 20,
        ..PlaybackConfig::default()
    };
    let (mut peer, _shutdown, task) = start(settings(RelayMode::Playback, playback));

    peer.text("MEDIA_START channel:verify optimal_frame_size:160").await;
    let (sizes, bytes, _) = read_transfer(&mut peer).await;
    assert_eq!(sizes.len(), 7);
    assert_eq!(bytes, data);

    // Echo it back the way the far end does: whole frames, last one padded.
    for chunk in bytes.chunks(160) {
        let mut frame = chunk.to_vec();
        frame.resize(160, 0xff);
        peer.binary(&frame).await;
    }
    peer.text("MEDIA_BUFFERING_COMPLETED").await;
    assert_eq!(peer.recv_text().await, "HANGUP");

    let session = finished(task).await;
    let verdict = session.verdict().expect("verdict recorded");
    assert!(verdict.passed, "{verdict:?}");
    assert_eq!(verdict.sent, 1_000);
    assert_eq!(verdict.expected, 1_120);
    assert_eq!(verdict.received, 1_120);
}

#[tokio::test]
async fn playback_mode_flags_a_short_echo() {
    let data = source(1_000);
    let announce = TempAudio::new(&data);
    let playback = PlaybackConfig {
        announce: Some(announce.0.clone()),
        settle_ms: 20,
        ..PlaybackConfig::default()
    };
    let (mut peer, _shutdown, task) = start(settings(RelayMode::Playback, playback));

    peer.text("MEDIA_START channel:verify optimal_frame_size:160").await;
    let (_, bytes, _) = read_transfer(&mut peer).await;
    peer.binary(&bytes[..500]).await;
    peer.text("MEDIA_BUFFERING_COMPLETED").await;
    assert_eq!(peer.recv_text().await, "HANGUP");

    let verdict = finished(task).await.verdict().unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.received, 500);
}

#[tokio::test]
async fn peer_leaving_ends_the_session() {
    let (peer, _shutdown, task) = start(settings(RelayMode::Echo, PlaybackConfig::default()));
    peer.text("MEDIA_START channel:gone").await;
    drop(peer.hang_up());
    let session = finished(task).await;
    assert_eq!(session.tag().as_deref(), Some("gone"));
}

#[tokio::test]
async fn ping_is_answered() {
    let (mut peer, shutdown, task) = start(settings(RelayMode::Echo, PlaybackConfig::default()));
    peer.send(Frame::Ping(b"hb".to_vec())).await;
    assert_eq!(peer.recv().await, Frame::Pong(b"hb".to_vec()));
    shutdown.cancel();
    finished(task).await;
}
