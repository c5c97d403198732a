//! The control loop driver
//!
//! One iteration = one frame cycle, in fixed order: capture and free-RAM
//! sample, pre-roll feed, inference, controller tick, then — only while idle
//! — the archive sweep and the shutdown check. All filesystem work happens
//! inline in the idle branch, so it never competes with an active recording.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::archive::{ArchivePipeline, Transcoder, VolumeProbe};
use crate::config::AgentConfig;
use crate::controller::{Action, EventController, RecordingState};
use crate::detector::Detector;
use crate::errors::AgentError;
use crate::labels::WatchList;
use crate::recording::{Encoder, PrerollBuffer, RecordingSession};
use crate::shutdown::{ClockSync, PowerOff, SchedulerState, ShutdownScheduler};
use crate::source::FrameSource;
use crate::types::{distribution_path, snapshot_path, Frame};

/// What one frame cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub action: Action,
    pub swept: bool,
    pub shutdown: bool,
}

pub struct Agent {
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    watch: WatchList,
    controller: EventController,
    archive: ArchivePipeline,
    scheduler: ShutdownScheduler,
    clock: Box<dyn ClockSync>,
    power: Box<dyn PowerOff>,
    video_dir: PathBuf,
    picture_dir: PathBuf,
    protected: HashSet<PathBuf>,
    shutdown_grace: Duration,
    shutdown_settle: Duration,
    started: Instant,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AgentConfig,
        watch: WatchList,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        encoder: Box<dyn Encoder>,
        transcoder: Box<dyn Transcoder>,
        probe: Box<dyn VolumeProbe>,
        clock: Box<dyn ClockSync>,
        power: Box<dyn PowerOff>,
    ) -> Self {
        let preroll =
            PrerollBuffer::for_duration(config.recording.pre_roll_secs, config.recording.fps);
        let session = RecordingSession::new(encoder, preroll);
        let controller = EventController::new(config, watch.clone(), session);
        let archive = ArchivePipeline::new(config, transcoder, probe);
        let scheduler = ShutdownScheduler::new(&config.shutdown);

        Self {
            source,
            detector,
            watch,
            controller,
            archive,
            scheduler,
            clock,
            power,
            video_dir: config.storage.video_dir.clone(),
            picture_dir: config.storage.picture_dir.clone(),
            protected: HashSet::new(),
            shutdown_grace: Duration::from_secs(2 * config.storage.sweep_secs),
            shutdown_settle: Duration::from_secs(5),
            started: Instant::now(),
        }
    }

    /// Shorten the shutdown delays (tests and demos).
    pub fn set_shutdown_delays(&mut self, grace: Duration, settle: Duration) {
        self.shutdown_grace = grace;
        self.shutdown_settle = settle;
    }

    pub fn recording_state(&self) -> RecordingState {
        self.controller.state()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Files the archive pipeline must leave alone.
    pub fn protected(&self) -> &HashSet<PathBuf> {
        &self.protected
    }

    /// Run until the stop flag is raised or the shutdown scheduler fires.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), AgentError> {
        log::info!("agent loop starting");
        while !stop.load(Ordering::Relaxed) {
            let outcome = self.run_cycle()?;
            if outcome.shutdown {
                break;
            }
        }
        log::info!("agent loop stopped");
        Ok(())
    }

    /// One frame cycle. Capture and inference failures are fatal to the run;
    /// encoder and archive failures are reported and the loop carries on.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, AgentError> {
        // Fresh sample every cycle; caching would defeat the backpressure
        // guarantee.
        let free_ram = self.source.free_ram()?;
        let frame = self.source.capture()?;

        if let Err(e) = self.controller.feed(&frame) {
            log::error!("frame feed failed: {}", e);
        }

        let inference = self.detector.infer(&frame)?;
        let scores = self.watch.scores(&inference);

        let action = match self.controller.tick(&scores, free_ram) {
            Ok(action) => action,
            Err(e) => {
                // Start/stop failures are reported, not retried in-cycle;
                // the controller is back in Idle either way.
                log::error!("controller transition failed: {}", e);
                Action::None
            }
        };

        match &action {
            Action::Started { path, stem, .. } => {
                self.save_snapshot(&frame, stem);
                self.protected = self.last_capture_pointer(path, stem);
            }
            Action::Stopped { pending, .. } => {
                self.archive.note_stopped(pending.clone());
            }
            _ => {}
        }

        let mut swept = false;
        let mut shutdown = false;
        if self.controller.is_idle() && self.archive.due() {
            match self.archive.sweep(&self.protected) {
                Ok(_) => swept = true,
                Err(e) => log::warn!("archive sweep aborted: {}", e),
            }

            let synced = self.clock.synced();
            if self
                .scheduler
                .check(Local::now(), self.started.elapsed(), synced)
            {
                self.perform_shutdown();
                shutdown = true;
            }
        }

        Ok(CycleOutcome {
            action,
            swept,
            shutdown,
        })
    }

    /// The two archive destinations of the most recent capture. The pipeline
    /// must never migrate the file the operator is most likely looking at.
    fn last_capture_pointer(&self, raw_path: &std::path::Path, stem: &str) -> HashSet<PathBuf> {
        let mut protect = HashSet::new();
        if let Some(name) = distribution_path(raw_path).file_name() {
            protect.insert(self.video_dir.join(name));
        }
        protect.insert(snapshot_path(&self.picture_dir, stem));
        protect
    }

    /// Best-effort JPEG of the trigger frame beside the capture.
    fn save_snapshot(&self, frame: &Frame, stem: &str) {
        if !frame.is_well_formed() {
            log::warn!("trigger frame malformed, skipping snapshot for {}", stem);
            return;
        }
        if let Err(e) = fs::create_dir_all(&self.picture_dir) {
            log::warn!("cannot create picture directory: {}", e);
            return;
        }
        let path = snapshot_path(&self.picture_dir, stem);
        if let Err(e) = image::save_buffer(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
        ) {
            log::warn!("snapshot write failed for {:?}: {}", path, e);
        }
    }

    /// Final migration and power-off. Reached at most once.
    fn perform_shutdown(&mut self) {
        log::info!(
            "shutdown firing, final migration after {}s grace",
            self.shutdown_grace.as_secs()
        );
        std::thread::sleep(self.shutdown_grace);

        if let Err(e) = self.archive.offload_now(&self.protected) {
            log::warn!("final offload failed: {}", e);
        }

        std::thread::sleep(self.shutdown_settle);
        if let Err(e) = self.power.power_off() {
            log::error!("power-off request failed: {}", e);
        }
    }
}
