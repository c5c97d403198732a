//! Full-loop integration test with synthetic collaborators
//!
//! Drives real frame cycles end to end: trigger, snapshot, stop, sweep.
//! Timing here is real (the controller reads the clock itself), so the
//! config uses one-second minimums and the test sleeps across boundaries.

use std::fs;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use tempfile::TempDir;

use sentrycam::controller::Action;
use sentrycam::detector::Inference;
use sentrycam::testing::{
    single_detection, CopyTranscoder, CountingPower, FileSinkEncoder, FixedClock, FixedProbe,
    ScriptedDetector, SyntheticSource,
};
use sentrycam::{Agent, AgentConfig, WatchList};

fn test_config(root: &TempDir) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.detection.watch = vec!["cat".into()];
    config.recording.width = 8;
    config.recording.height = 8;
    config.recording.fps = 4;
    config.recording.min_secs = 1;
    config.recording.pre_roll_secs = 1;
    config.storage.scratch_dir = root.path().join("shm");
    config.storage.video_dir = root.path().join("Videos");
    config.storage.picture_dir = root.path().join("Pictures");
    config.storage.media_root = root.path().join("media");
    config.storage.sweep_secs = 1;
    fs::create_dir_all(&config.storage.scratch_dir).unwrap();
    config
}

#[test]
fn test_trigger_snapshot_stop_and_sweep() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);

    let labels: Vec<String> = vec!["cat".into()];
    let watch = WatchList::resolve(&labels, &config.detection.watch).unwrap();

    // Quiet frame, then one detection, then silence.
    let detector = ScriptedDetector::new(vec![Inference::default(), single_detection(0, 0.9, 1)]);

    let mut agent = Agent::new(
        &config,
        watch,
        Box::new(SyntheticSource::new(8, 8)),
        Box::new(detector),
        Box::new(FileSinkEncoder::new()),
        Box::new(CopyTranscoder),
        Box::new(FixedProbe {
            volumes: Vec::new(),
            used_percent: 0.0,
        }),
        Box::new(FixedClock { synced: false }),
        Box::new(CountingPower::new()),
    );

    let quiet = agent.run_cycle().unwrap();
    assert_eq!(quiet.action, Action::None);

    let triggered = agent.run_cycle().unwrap();
    let stem = match &triggered.action {
        Action::Started { stem, class, .. } => {
            assert_eq!(class, "cat");
            stem.clone()
        }
        other => panic!("expected Started, got {:?}", other),
    };

    // Trigger side effects: raw capture open in scratch, snapshot written,
    // last-capture pointer protected.
    let raw = config.storage.scratch_dir.join(format!("{}.h264", stem));
    assert!(raw.exists());
    let snapshot = config.storage.picture_dir.join(format!("{}.jpg", stem));
    assert!(snapshot.exists(), "trigger snapshot missing");
    let expected_mp4: PathBuf = config.storage.video_dir.join(format!("{}.mp4", stem));
    assert!(agent.protected().contains(&expected_mp4));
    assert!(agent.protected().contains(&snapshot));

    // Let the minimum duration lapse, then the next quiet cycle stops.
    sleep(Duration::from_millis(1200));
    let stopped = agent.run_cycle().unwrap();
    assert!(matches!(stopped.action, Action::Stopped { .. }));

    // Sweep timer was reset by the stop; after it lapses the next idle cycle
    // converts and relocates the capture.
    sleep(Duration::from_millis(1200));
    let swept = agent.run_cycle().unwrap();
    assert!(swept.swept);
    assert!(!raw.exists(), "raw capture cleaned out of scratch");
    assert!(expected_mp4.exists(), "distribution file in durable storage");
}
