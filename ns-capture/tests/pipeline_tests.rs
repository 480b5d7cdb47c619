//! Assessment controller tests
//!
//! Every test runs on paused time, so a full 30 second recording completes
//! instantly and deterministically.

mod common;

use common::{ApiReply, FakeDevices, FakeRecorderFactory, FakeApi, Harness, RecorderScript};
use ns_capture::device::FacingMode;
use ns_capture::error::{CaptureError, DeviceErrorKind, PROCESSING_FAILED_MESSAGE};
use ns_capture::Stage;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_full_assessment_reports_low_risk() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    assert_eq!(tool.stage(), Stage::Prep);
    assert!(tool.has_live_stream());
    assert_eq!(harness.preview.attached(), 1);

    let started = Instant::now();
    let result = tool.start_recording().await.unwrap();

    // 3 s countdown, 30 s recording, 1 s settle
    assert_eq!(started.elapsed(), Duration::from_secs(34));

    assert_eq!(result.display_percent(), "15%");
    assert_eq!(result.risk_class, "Low Risk");
    assert_eq!(result.motor_control, "Normal");
    assert_eq!(result.speech_pattern, "Normal");
    assert_eq!(result.facial_expression, "Normal");

    let snapshot = tool.snapshot();
    assert_eq!(snapshot.stage, Stage::Results);
    assert_eq!(snapshot.progress, 100.0);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.result.as_ref(), Some(&result));

    assert!(!harness.devices.any_live());
    assert_eq!(harness.preview.detached(), 1);
    assert_eq!(harness.recorders.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_uploaded_blobs_keep_fragment_order() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    tool.start_recording().await.unwrap();

    let uploads = harness.api.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (video, audio) = &uploads[0];

    assert_eq!(video.mime_type, "video/webm");
    assert_eq!(audio.mime_type, "audio/webm");
    assert!(video.data.starts_with(b"video-1video-2video-3"));
    assert!(video.data.ends_with(b"video-final"));
    assert!(audio.data.starts_with(b"audio-1audio-2"));
    assert!(audio.data.ends_with(b"audio-final"));
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_monotonic_and_reaches_100() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();
    let mut rx = tool.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.stage == Stage::Recording {
                seen.push(snapshot.progress);
            }
            if snapshot.stage == Stage::Results {
                break;
            }
        }
        seen
    });

    tool.begin().await.unwrap();
    tool.start_recording().await.unwrap();

    let seen = watcher.await.unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last().copied(), Some(100.0));
    assert!(seen.iter().all(|p| *p <= 100.0));
}

#[tokio::test(start_paused = true)]
async fn test_countdown_runs_three_two_one() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();
    let mut rx = tool.subscribe();

    let watcher = tokio::spawn(async move {
        let mut values = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(value) = snapshot.countdown {
                if values.last() != Some(&value) {
                    values.push(value);
                }
            }
            if snapshot.stage == Stage::Recording {
                break;
            }
        }
        values
    });

    tool.begin().await.unwrap();
    tool.start_recording().await.unwrap();

    assert_eq!(watcher.await.unwrap(), vec![3, 2, 1]);
    assert!(tool.snapshot().countdown.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_stays_in_prep() {
    let harness = Harness::new(
        FakeDevices::failing("NotAllowedError"),
        FakeRecorderFactory::default(),
        FakeApi::new(ApiReply::Status(500)),
    );
    let mut tool = harness.tool();

    let err = tool.begin().await.unwrap_err();
    match err {
        CaptureError::Device(e) => assert_eq!(e.kind, DeviceErrorKind::PermissionDenied),
        other => panic!("expected device error, got {:?}", other),
    }

    let snapshot = tool.snapshot();
    assert_eq!(snapshot.stage, Stage::Prep);
    assert_eq!(
        snapshot.error.as_deref(),
        Some(DeviceErrorKind::PermissionDenied.user_message())
    );

    // starting retries acquisition and fails the same way
    assert!(matches!(
        tool.start_recording().await,
        Err(CaptureError::Device(_))
    ));
    assert_eq!(tool.stage(), Stage::Prep);
    assert_eq!(harness.recorders.created(), 0);
    assert_eq!(harness.api.upload_count(), 0);
    assert_eq!(harness.preview.attached(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_permission_granted() {
    let harness = Harness::new(
        FakeDevices::failing("NotReadableError"),
        FakeRecorderFactory::default(),
        FakeApi::new(ApiReply::Status(500)),
    );
    let mut tool = harness.tool();

    assert!(tool.begin().await.is_err());
    assert_eq!(
        tool.snapshot().error.as_deref(),
        Some(DeviceErrorKind::DeviceBusy.user_message())
    );

    *harness.devices.fail_with.lock().unwrap() = None;
    tool.prepare().await.unwrap();

    assert!(tool.has_live_stream());
    assert!(tool.snapshot().error.is_none());
    assert_eq!(tool.stage(), Stage::Prep);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_returns_to_intro() {
    let harness = Harness::with_reply(ApiReply::Status(500));
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    let err = tool.start_recording().await.unwrap_err();
    assert!(matches!(err, CaptureError::ServerError { status: 500, .. }));

    let snapshot = tool.snapshot();
    assert_eq!(snapshot.stage, Stage::Intro);
    assert_eq!(snapshot.error.as_deref(), Some(PROCESSING_FAILED_MESSAGE));
    assert_eq!(snapshot.video_chunks, 0);
    assert_eq!(snapshot.audio_chunks, 0);
    assert_eq!(snapshot.progress, 0.0);
    assert!(snapshot.result.is_none());

    assert!(!tool.has_live_stream());
    assert!(!harness.devices.any_live());
    assert_eq!(harness.preview.detached(), 1);
    assert_eq!(harness.api.upload_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_recording_skips_upload() {
    let harness = Harness::new(
        FakeDevices::default(),
        FakeRecorderFactory::with_script(RecorderScript {
            silent: true,
            end_after: None,
        }),
        FakeApi::new(ApiReply::Success {
            risk_score: 0.15,
            risk_class: "Low Risk",
        }),
    );
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    let err = tool.start_recording().await.unwrap_err();

    assert!(matches!(err, CaptureError::EmptyRecording));
    assert_eq!(harness.api.upload_count(), 0);
    assert_eq!(tool.stage(), Stage::Intro);
    assert_eq!(tool.snapshot().error.as_deref(), Some(PROCESSING_FAILED_MESSAGE));
    assert!(!harness.devices.any_live());
}

#[tokio::test(start_paused = true)]
async fn test_recorder_stopping_early_ends_recording() {
    let harness = Harness::new(
        FakeDevices::default(),
        FakeRecorderFactory::with_script(RecorderScript {
            silent: false,
            end_after: Some(5),
        }),
        FakeApi::new(ApiReply::Success {
            risk_score: 0.45,
            risk_class: "",
        }),
    );
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    let started = Instant::now();
    let result = tool.start_recording().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(34));
    assert!(tool.snapshot().progress < 100.0);
    assert_eq!(tool.stage(), Stage::Results);

    // blank server label falls back to the threshold label
    assert_eq!(result.risk_class, "Moderate Risk");
    assert_eq!(result.motor_control, "Mild Irregularity");
}

#[tokio::test(start_paused = true)]
async fn test_toggle_camera_stops_old_tracks_first() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    tool.toggle_camera().await.unwrap();

    let issued = harness.devices.issued();
    assert_eq!(issued.len(), 2);
    assert!(!issued[0].is_active());
    assert!(issued[1].is_active());
    assert_eq!(
        *harness.devices.requests.lock().unwrap(),
        vec![FacingMode::Front, FacingMode::Back]
    );
    assert_eq!(tool.snapshot().facing_mode, FacingMode::Back);
    assert_eq!(harness.preview.detached(), 1);
    assert_eq!(harness.preview.attached(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_facing_mode_survives_restart() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();

    tool.begin().await.unwrap();
    tool.toggle_camera().await.unwrap();
    tool.start_recording().await.unwrap();
    tool.restart().unwrap();

    assert_eq!(tool.stage(), Stage::Intro);
    assert!(tool.snapshot().result.is_none());

    tool.begin().await.unwrap();
    assert_eq!(
        harness.devices.requests.lock().unwrap().last(),
        Some(&FacingMode::Back)
    );
}

#[tokio::test(start_paused = true)]
async fn test_operations_in_wrong_stage_are_rejected() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();

    assert!(matches!(
        tool.start_recording().await,
        Err(CaptureError::InvalidStage {
            operation: "start_recording",
            stage: Stage::Intro
        })
    ));
    assert!(matches!(
        tool.toggle_camera().await,
        Err(CaptureError::InvalidStage { .. })
    ));
    assert!(matches!(tool.restart(), Err(CaptureError::InvalidStage { .. })));

    tool.begin().await.unwrap();
    assert!(matches!(tool.begin().await, Err(CaptureError::InvalidStage { .. })));

    // rejected calls have no side effects
    assert_eq!(harness.devices.request_count(), 1);
    assert_eq!(tool.stage(), Stage::Prep);
    assert!(tool.snapshot().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_hanging_upload() {
    let harness = Harness::with_reply(ApiReply::Hang);
    let mut tool = harness.tool();
    tool.begin().await.unwrap();

    let cancel = tool.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(40)).await;
        cancel.cancel();
    });

    let err = tool.start_recording().await.unwrap_err();
    assert!(matches!(err, CaptureError::Cancelled));
    assert_eq!(harness.api.upload_count(), 1);
    assert!(!harness.devices.any_live());

    tool.teardown();
    let snapshot = tool.snapshot();
    assert_eq!(snapshot.stage, Stage::Intro);
    assert!(snapshot.error.is_none());

    // usable again after teardown
    tool.begin().await.unwrap();
    assert!(tool.has_live_stream());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_countdown() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();
    tool.begin().await.unwrap();

    let cancel = tool.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
    });

    assert!(matches!(
        tool.start_recording().await,
        Err(CaptureError::Cancelled)
    ));
    assert_eq!(harness.recorders.created(), 0);
    assert!(tool.snapshot().countdown.is_none());

    tool.teardown();
    assert!(!harness.devices.any_live());
    assert_eq!(tool.stage(), Stage::Intro);
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_stream() {
    let harness = Harness::low_risk();
    let mut tool = harness.tool();
    tool.begin().await.unwrap();
    assert!(harness.devices.any_live());

    drop(tool);
    assert!(!harness.devices.any_live());
    assert_eq!(harness.preview.detached(), 1);
}
