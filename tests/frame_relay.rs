mod common;

use common::{wait_until, Call, CountingSurface, RecordingSession};
use playshell::config::FrameSettings;
use playshell::frame::FrameRelay;
use playshell::relay::RelayState;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> FrameSettings {
    FrameSettings {
        width: 2,
        height: 2,
        max_fps: 60,
    }
}

#[tokio::test]
async fn stop_without_any_frame_returns_promptly() {
    let session = RecordingSession::new();
    let mut relay = FrameRelay::new(
        session.clone(),
        Arc::new(CountingSurface::default()),
        settings(),
    );

    assert!(relay.start());
    assert_eq!(relay.state(), RelayState::Running);

    tokio::time::timeout(Duration::from_secs(1), relay.stop())
        .await
        .expect("stop did not hang")
        .unwrap();
    assert_eq!(relay.state(), RelayState::Stopped);
    assert_eq!(
        session.calls(),
        vec![Call::FrameHandler(true), Call::FrameHandler(false)]
    );

    relay.stop().await.unwrap();
    assert_eq!(session.count(&Call::FrameHandler(false)), 1);
}

#[tokio::test]
async fn published_frames_reach_the_surface() {
    let session = RecordingSession::new();
    let surface = Arc::new(CountingSurface::default());
    let mut relay = FrameRelay::new(session.clone(), surface.clone(), settings());
    relay.start();

    session.push_frame(&[1; 12]);
    assert!(wait_until(Duration::from_secs(1), || surface.presented() == 1).await);

    // Wrong size: rejected before it wakes the relay.
    session.push_frame(&[1; 5]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(surface.presented(), 1);

    relay.stop().await.unwrap();
}
