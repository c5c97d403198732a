//! Detection-triggered recording state machine
//!
//! One `tick` per frame cycle: detection scores plus a fresh free-RAM sample
//! in, at most one session transition out. The controller owns the
//! `RecordingState` exclusively; nothing else starts or stops the session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::labels::WatchList;
use crate::recording::RecordingSession;
use crate::types::{capture_stem, raw_capture_path, Frame, PendingFile, StopReason};

/// Recording state as seen by the rest of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Outcome of one controller cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Started {
        path: PathBuf,
        stem: String,
        class: String,
    },
    Extended,
    Stopped {
        pending: PendingFile,
        reason: StopReason,
    },
}

struct ActiveRecording {
    file_path: PathBuf,
    stem: String,
    #[allow(dead_code)]
    start_instant: Instant,
    last_trigger: Instant,
}

pub struct EventController {
    threshold: f32,
    min_duration: Duration,
    ram_limit_bytes: u64,
    scratch_dir: PathBuf,
    watch: WatchList,
    session: RecordingSession,
    active: Option<ActiveRecording>,
}

impl EventController {
    pub fn new(config: &AgentConfig, watch: WatchList, session: RecordingSession) -> Self {
        Self {
            threshold: config.detection.score_threshold,
            min_duration: Duration::from_secs(config.recording.min_secs),
            ram_limit_bytes: config.ram_limit_bytes(),
            scratch_dir: config.storage.scratch_dir.clone(),
            watch,
            session,
            active: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        if self.active.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Stem of the capture currently being written, if any.
    pub fn active_stem(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.stem.as_str())
    }

    /// Ingest one frame into the pre-roll ring and, while recording, the open
    /// output. An encoder failure abandons the current attempt: the session
    /// closes its output and the controller returns to Idle.
    pub fn feed(&mut self, frame: &Frame) -> Result<(), AgentError> {
        let result = self.session.feed(frame);
        if result.is_err() {
            if let Some(active) = self.active.take() {
                log::error!("recording {} aborted by encoder failure", active.stem);
            }
        }
        result
    }

    /// Run one cycle against the current detection scores and free-RAM
    /// sample.
    pub fn tick(
        &mut self,
        scores: &BTreeMap<usize, f32>,
        free_ram: u64,
    ) -> Result<Action, AgentError> {
        self.tick_at(Instant::now(), scores, free_ram)
    }

    /// Deterministic variant of `tick` taking an explicit instant.
    pub fn tick_at(
        &mut self,
        now: Instant,
        scores: &BTreeMap<usize, f32>,
        free_ram: u64,
    ) -> Result<Action, AgentError> {
        let trigger = self.best_trigger(scores);

        if let Some(active) = &mut self.active {
            // RAM pressure overrides everything, including a simultaneous
            // qualifying detection; once stopped this cycle, no restart.
            if free_ram <= self.ram_limit_bytes {
                return self.stop_active(StopReason::RamPressure);
            }
            if trigger.is_some() {
                active.last_trigger = now;
                return Ok(Action::Extended);
            }
            if now.duration_since(active.last_trigger) > self.min_duration {
                return self.stop_active(StopReason::Lapsed);
            }
            return Ok(Action::None);
        }

        if let Some((class_id, score)) = trigger {
            if free_ram > self.ram_limit_bytes {
                return self.start_recording(now, class_id, score);
            }
            log::debug!(
                "qualifying detection ignored, free RAM {} at or below limit {}",
                free_ram,
                self.ram_limit_bytes
            );
        }
        Ok(Action::None)
    }

    /// Highest qualifying score among watched classes. Scores of 1.0 or above
    /// are treated as malformed detector output, not triggers.
    fn best_trigger(&self, scores: &BTreeMap<usize, f32>) -> Option<(usize, f32)> {
        scores
            .iter()
            .filter(|(_, &s)| s > self.threshold && s < 1.0)
            .map(|(&id, &s)| (id, s))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn start_recording(
        &mut self,
        now: Instant,
        class_id: usize,
        score: f32,
    ) -> Result<Action, AgentError> {
        let stem = capture_stem(&Local::now());
        let path = raw_capture_path(&self.scratch_dir, &stem);
        let class = self
            .watch
            .name_of(class_id)
            .unwrap_or("unknown")
            .to_string();

        // A start failure leaves the session inactive and the controller
        // Idle; the next cycle's trigger may re-attempt naturally.
        self.session.start(&path)?;

        self.active = Some(ActiveRecording {
            file_path: path.clone(),
            stem: stem.clone(),
            start_instant: now,
            last_trigger: now,
        });
        log::info!("new detection {} ({} {:.2})", stem, class, score);
        Ok(Action::Started { path, stem, class })
    }

    fn stop_active(&mut self, reason: StopReason) -> Result<Action, AgentError> {
        let active = self
            .active
            .take()
            .expect("stop_active called while idle");

        self.session.stop()?;

        log::info!("stopped recording {} ({:?})", active.stem, reason);
        Ok(Action::Stopped {
            pending: PendingFile::new(active.file_path),
            reason,
        })
    }
}
