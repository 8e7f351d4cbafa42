mod common;

use common::{wait_until, Call, RecordingSession, ScriptedDevice};
use playshell::config::ControllerSettings;
use playshell::controller::{
    ButtonType, ControllerRelay, ControllerSample, JoystickType, TriggerType,
};
use playshell::relay::RelayState;
use playshell::session::SessionButton;
use playshell::translate::encode_orientation;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn settings() -> ControllerSettings {
    ControllerSettings {
        poll_interval_ms: 5,
        ..ControllerSettings::default()
    }
}

async fn relay_samples(samples: Vec<ControllerSample>) -> Vec<Call> {
    let expected = samples.len();
    let session = RecordingSession::new();
    let mut relay = ControllerRelay::new(
        session.clone(),
        Box::new(ScriptedDevice::new(samples)),
        settings(),
    );
    relay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || session.calls().len() >= expected).await);
    relay.stop().await.unwrap();
    session.calls().into_iter().take(expected).collect()
}

#[tokio::test]
async fn buttons_follow_the_binding_table() {
    let calls = relay_samples(vec![
        ControllerSample::pressed(ButtonType::Options),
        ControllerSample::released(ButtonType::Options),
        ControllerSample::pressed(ButtonType::Create),
        ControllerSample::released(ButtonType::Create),
        ControllerSample::pressed(ButtonType::DPadUp),
        ControllerSample::released(ButtonType::DPadUp),
    ])
    .await;

    assert_eq!(
        calls,
        vec![
            Call::Press(SessionButton::Options),
            Call::Release(SessionButton::Touchpad),
            Call::Press(SessionButton::Create),
            Call::Release(SessionButton::Touchpad),
            Call::Press(SessionButton::DpadUp),
            Call::Release(SessionButton::DpadUp),
        ]
    );
}

#[tokio::test]
async fn axes_and_motion_are_translated() {
    let calls = relay_samples(vec![
        ControllerSample::Joystick {
            stick: JoystickType::Right,
            x: -1.0,
            y: 0.5,
        },
        ControllerSample::Trigger {
            trigger: TriggerType::Left,
            value: 1.0,
        },
        ControllerSample::Accelerometer {
            x: 0.1,
            y: 0.9,
            z: 0.0,
        },
        ControllerSample::Gyroscope {
            x: 0.0,
            y: 0.0,
            z: 2.5,
        },
        ControllerSample::Orientation {
            yaw: 90.0,
            pitch: 0.0,
            roll: 0.0,
        },
    ])
    .await;

    assert_eq!(
        calls,
        vec![
            Call::SetRight(-1023, 511),
            Call::SetL2(255),
            Call::Accelerometer(0.1, 0.9, 0.0),
            Call::Gyroscope(0.0, 0.0, 2.5),
            Call::Orientation(encode_orientation(90.0, 0.0, 0.0)),
        ]
    );
}

#[tokio::test]
async fn stopping_twice_neutralizes_once_and_closes_the_device() {
    let session = RecordingSession::new();
    let device = ScriptedDevice::new(Vec::new());
    let closed = device.closed_flag();
    let mut relay = ControllerRelay::new(session.clone(), Box::new(device), settings());

    relay.start().unwrap();
    tokio::time::timeout(Duration::from_secs(2), relay.stop())
        .await
        .expect("stop finished in time")
        .unwrap();
    relay.stop().await.unwrap();

    assert_eq!(relay.state(), RelayState::Stopped);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(session.count(&Call::Feedback), 1);
    assert_eq!(session.count(&Call::SetLeft(0, 0)), 1);
}

#[tokio::test]
async fn stop_before_start_touches_nothing() {
    let session = RecordingSession::new();
    let mut relay = ControllerRelay::new(
        session.clone(),
        Box::new(ScriptedDevice::new(Vec::new())),
        settings(),
    );

    relay.stop().await.unwrap();
    assert_eq!(relay.state(), RelayState::Stopped);
    assert!(session.calls().is_empty());

    // A stopped relay does not come back.
    relay.start().unwrap();
    assert_eq!(relay.state(), RelayState::Stopped);
}

#[tokio::test]
async fn device_failure_mid_run_still_allows_a_clean_stop() {
    let session = RecordingSession::new();
    let device = ScriptedDevice::failing_after(vec![ControllerSample::pressed(ButtonType::Cross)]);
    let closed = device.closed_flag();
    let mut relay = ControllerRelay::new(session.clone(), Box::new(device), settings());

    relay.start().unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || {
            closed.load(Ordering::SeqCst) && session.count(&Call::Press(SessionButton::Cross)) == 1
        })
        .await
    );

    relay.stop().await.unwrap();
    assert_eq!(relay.state(), RelayState::Stopped);
    assert_eq!(session.count(&Call::Feedback), 1);
}
