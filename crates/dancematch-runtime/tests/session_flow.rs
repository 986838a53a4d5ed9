//! End-to-end session behavior with a manual clock and scripted provider

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dancematch_core::{DanceError, ManualClock};
use dancematch_pose::{Joint, Landmark, Pose};
use dancematch_runtime::synthetic::{standing_pose, DetectorStep, ScriptedDetector, TestPatternSource};
use dancematch_runtime::{DanceConfig, DanceSession, Frame, PhaseHint, Rgb};

fn frame() -> Option<Frame> {
    Some(Frame::filled(64, 36, Rgb::BLACK))
}

fn session_with(config: DanceConfig, steps: Vec<DetectorStep>) -> (DanceSession, ManualClock) {
    let clock = ManualClock::new();
    let session = DanceSession::with_clock(
        &config,
        Box::new(TestPatternSource::new(64, 36)),
        Box::new(ScriptedDetector::new(steps)),
        Arc::new(clock.clone()),
    );
    (session, clock)
}

fn write_reference(name: &str, json: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dancematch-{}-{name}.json", std::process::id()));
    std::fs::write(&path, json).unwrap();
    path
}

/// Provider rows for `pose`, 33 rows in landmark order, unknown rows far off
fn provider_rows(pose: &Pose) -> String {
    let rows: Vec<String> = (0..33)
        .map(|i| match Joint::from_provider_index(i).and_then(|j| pose.get(j)) {
            Some(lm) => format!("[{}, {}, {}]", lm.x, lm.y, lm.z),
            None => "[0.0, 0.0, 0.0]".to_string(),
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

fn shifted(pose: &Pose, dx: f32) -> Pose {
    pose.iter().fold(Pose::new(), |out, (joint, lm)| {
        out.with(joint, Landmark::visible(lm.x + dx, lm.y))
    })
}

#[test]
fn score_is_zero_right_after_start() {
    let (session, _) = session_with(DanceConfig::default(), vec![DetectorStep::Pose(standing_pose())]);
    session.start_session().unwrap();
    assert_eq!(session.current_score(), 0.0);
    assert!(session.recent_score_samples().is_empty());
}

#[test]
fn countdown_then_scored_dancing_from_reference_file() {
    let path = write_reference("sequence", &format!("[{}]", provider_rows(&standing_pose())));
    let config = DanceConfig {
        reference_path: Some(path.clone()),
        ..DanceConfig::default()
    };
    let steps = vec![DetectorStep::Pose(standing_pose()); 20];
    let (session, clock) = session_with(config, steps);

    session.start_session().unwrap();
    let out = session.process_frame(frame()).unwrap();
    assert!(matches!(out.overlay.hint, PhaseHint::Countdown { remaining_secs: 5, .. }));
    assert_eq!(session.current_score(), 0.0);

    clock.advance(Duration::from_secs(5));
    for _ in 0..4 {
        session.process_frame(frame());
    }
    // Responsive smoothing rises 5 per frame toward 100
    assert_eq!(session.current_score(), 20.0);
    assert_eq!(session.status().phase, "dancing");

    let samples = session.recent_score_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].score, 20.0);

    std::fs::remove_file(path).ok();
}

#[test]
fn stop_resets_and_summarizes() {
    let config = DanceConfig {
        countdown: Duration::ZERO,
        lazy_seed: true,
        ..DanceConfig::default()
    };
    let steps = vec![DetectorStep::Pose(standing_pose()); 10];
    let (session, clock) = session_with(config, steps);

    session.start_session().unwrap();
    // First frame seeds, the rest score against the seed
    for _ in 0..3 {
        session.process_frame(frame());
        clock.advance(Duration::from_millis(500));
    }
    let summary = session.stop_session().unwrap();
    assert_eq!(summary.frames_scored, 2);
    assert_eq!(summary.peak_score, 10.0);
    assert!((summary.average_score - 7.5).abs() < 1e-4);
    assert!((summary.danced_for_secs - 1.5).abs() < 1e-9);

    assert_eq!(session.current_score(), 0.0);
    assert_eq!(session.status().phase, "idle");
    assert!(session.recent_score_samples().is_empty());
}

#[test]
fn best_match_over_key_poses_is_the_maximum() {
    let near = standing_pose();
    let far = shifted(&standing_pose(), 0.6);
    let json = format!(
        r#"{{"poses": {{"far": {}, "near": {}}}}}"#,
        provider_rows(&far),
        provider_rows(&near)
    );
    let path = write_reference("keyposes", &json);
    let config = DanceConfig {
        reference_path: Some(path.clone()),
        countdown: Duration::ZERO,
        smoothing: dancematch_pose::ScoreSmoother::new(100.0, 100.0).unwrap(),
        ..DanceConfig::default()
    };
    let (session, _) = session_with(config, vec![DetectorStep::Pose(standing_pose())]);

    session.start_session().unwrap();
    session.process_frame(frame());
    assert_eq!(session.current_score(), 100.0);

    std::fs::remove_file(path).ok();
}

#[test]
fn provider_failures_degrade_to_no_person() {
    let config = DanceConfig {
        countdown: Duration::ZERO,
        lazy_seed: true,
        smoothing: dancematch_pose::ScoreSmoother::new(100.0, 100.0).unwrap(),
        ..DanceConfig::default()
    };
    let steps = vec![
        DetectorStep::Pose(standing_pose()),
        DetectorStep::Pose(standing_pose()),
        DetectorStep::Fail("inference timeout".to_string()),
        DetectorStep::NoBody,
    ];
    let (session, _) = session_with(config, steps);
    session.start_session().unwrap();

    session.process_frame(frame());
    session.process_frame(frame());
    assert_eq!(session.current_score(), 100.0);

    let failed = session.process_frame(frame()).unwrap();
    assert!(!failed.overlay.person_detected);
    let empty = session.process_frame(frame()).unwrap();
    assert!(!empty.overlay.person_detected);

    // Default no-detection fallback holds the score
    assert_eq!(session.current_score(), 100.0);
    assert_eq!(session.pipeline_stats().detector_failures, 1);
}

#[test]
fn missing_reference_file_degrades_to_empty_set() {
    let config = DanceConfig {
        reference_path: Some(PathBuf::from("/nonexistent/dancematch/reference.json")),
        countdown: Duration::ZERO,
        ..DanceConfig::default()
    };
    let (session, _) = session_with(config, vec![DetectorStep::Pose(standing_pose())]);
    session.start_session().unwrap();
    session.process_frame(frame());

    assert_eq!(session.current_score(), 0.0);
    assert_eq!(session.recent_score_samples().len(), 1);
}

#[test]
fn camera_failure_leaves_core_inert() {
    let clock = ManualClock::new();
    let session = DanceSession::with_clock(
        &DanceConfig::default(),
        Box::new(TestPatternSource::unavailable(64, 36)),
        Box::new(ScriptedDetector::default()),
        Arc::new(clock),
    );

    assert!(matches!(session.start_session(), Err(DanceError::CameraUnavailable(_))));
    let out = session.process_frame(frame()).unwrap();
    assert_eq!(out.overlay.hint, PhaseHint::Idle);
    assert_eq!(session.current_score(), 0.0);
}
