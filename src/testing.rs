//! Testing utilities for sentrycam
//!
//! Synthetic collaborators for offline runs and tests. The camera, the
//! accelerator, and the encoder are external hardware by construction, so
//! these stand-ins let the whole control loop run on any machine.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::archive::{Transcoder, VolumeProbe};
use crate::detector::{Detector, Inference};
use crate::errors::AgentError;
use crate::recording::Encoder;
use crate::shutdown::{ClockSync, PowerOff};
use crate::source::FrameSource;
use crate::types::Frame;

/// Create a synthetic RGB8 frame with content that varies by frame number.
pub fn synthetic_frame(frame_number: u64, width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    Frame::new(data, width, height)
}

/// Frame source producing synthetic frames and a settable free-RAM reading.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_number: u64,
    free_ram: u64,
    interval: Duration,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_number: 0,
            free_ram: 1 << 30,
            interval: Duration::ZERO,
        }
    }

    /// Pace captures like a real camera would.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn set_free_ram(&mut self, bytes: u64) {
        self.free_ram = bytes;
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self) -> Result<Frame, AgentError> {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        let frame = synthetic_frame(self.frame_number, self.width, self.height);
        self.frame_number += 1;
        Ok(frame)
    }

    fn free_ram(&mut self) -> Result<u64, AgentError> {
        Ok(self.free_ram)
    }
}

/// Inference with a single detection of `class_id` in a vocabulary of
/// `classes` classes.
pub fn single_detection(class_id: usize, score: f32, classes: usize) -> Inference {
    let mut scores = vec![Vec::new(); classes];
    scores[class_id].push(score);
    Inference::new(scores)
}

/// Detector replaying a fixed script of inferences, then empty frames.
pub struct ScriptedDetector {
    script: VecDeque<Inference>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Inference>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Detector for ScriptedDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<Inference, AgentError> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

/// Detector emitting a burst of detections of one class every `period`
/// frames. Drives the synthetic demo.
pub struct PulseDetector {
    class_id: usize,
    classes: usize,
    score: f32,
    period: u64,
    burst: u64,
    counter: u64,
}

impl PulseDetector {
    pub fn new(class_id: usize, classes: usize, score: f32, period: u64, burst: u64) -> Self {
        Self {
            class_id,
            classes,
            score,
            period: period.max(1),
            burst,
            counter: 0,
        }
    }
}

impl Detector for PulseDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<Inference, AgentError> {
        let phase = self.counter % self.period;
        self.counter += 1;
        if phase < self.burst {
            Ok(single_detection(self.class_id, self.score, self.classes))
        } else {
            Ok(Inference::default())
        }
    }
}

/// Call log shared between a `MemoryEncoder` and the test observing it.
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub starts: Vec<PathBuf>,
    pub stops: u32,
    pub writes: u64,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_write: bool,
}

/// Encoder recording every call, with scriptable failures.
#[derive(Default)]
pub struct MemoryEncoder {
    log: Arc<Mutex<EncoderLog>>,
}

impl MemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Arc<Mutex<EncoderLog>> {
        self.log.clone()
    }
}

impl Encoder for MemoryEncoder {
    fn start(&mut self, path: &Path) -> Result<(), AgentError> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.fail_start {
            return Err(AgentError::EncodingError("scripted start failure".into()));
        }
        log.starts.push(path.to_path_buf());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AgentError> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.fail_stop {
            return Err(AgentError::EncodingError("scripted stop failure".into()));
        }
        log.stops += 1;
        Ok(())
    }

    fn write(&mut self, _frame: &Frame) -> Result<(), AgentError> {
        let mut log = self.log.lock().expect("lock poisoned");
        if log.fail_write {
            return Err(AgentError::EncodingError("scripted write failure".into()));
        }
        log.writes += 1;
        Ok(())
    }
}

/// Encoder that appends raw frame bytes to the output file. A stand-in for
/// the hardware H.264 encoder: real files land on disk, no real bitstream.
#[derive(Default)]
pub struct FileSinkEncoder {
    sink: Option<BufWriter<File>>,
}

impl FileSinkEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder for FileSinkEncoder {
    fn start(&mut self, path: &Path) -> Result<(), AgentError> {
        let file = File::create(path)
            .map_err(|e| AgentError::EncodingError(format!("create {:?}: {}", path, e)))?;
        self.sink = Some(BufWriter::new(file));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AgentError> {
        match self.sink.take() {
            Some(mut sink) => sink
                .flush()
                .map_err(|e| AgentError::EncodingError(format!("flush: {}", e))),
            None => Ok(()),
        }
    }

    fn write(&mut self, frame: &Frame) -> Result<(), AgentError> {
        match &mut self.sink {
            Some(sink) => sink
                .write_all(&frame.data)
                .map_err(|e| AgentError::EncodingError(format!("write: {}", e))),
            None => Ok(()),
        }
    }
}

/// Transcoder that copies the raw file to the destination.
pub struct CopyTranscoder;

impl Transcoder for CopyTranscoder {
    fn remux(&self, raw: &Path, dest: &Path) -> Result<(), AgentError> {
        fs::copy(raw, dest)
            .map(|_| ())
            .map_err(|e| AgentError::EncodingError(format!("copy remux: {}", e)))
    }
}

/// Transcoder that fails a fixed number of times before behaving like
/// `CopyTranscoder`.
pub struct FlakyTranscoder {
    failures_remaining: Mutex<u32>,
}

impl FlakyTranscoder {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_remaining: Mutex::new(times),
        }
    }
}

impl Transcoder for FlakyTranscoder {
    fn remux(&self, raw: &Path, dest: &Path) -> Result<(), AgentError> {
        let mut remaining = self.failures_remaining.lock().expect("lock poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AgentError::EncodingError("scripted remux failure".into()));
        }
        drop(remaining);
        CopyTranscoder.remux(raw, dest)
    }
}

/// Volume probe with fixed volumes and a fixed used-percent.
pub struct FixedProbe {
    pub volumes: Vec<PathBuf>,
    pub used_percent: f64,
}

impl VolumeProbe for FixedProbe {
    fn removable_volumes(&self, _media_root: &Path) -> Vec<PathBuf> {
        self.volumes.clone()
    }

    fn used_percent(&self, _mount: &Path) -> Result<f64, AgentError> {
        Ok(self.used_percent)
    }
}

/// Clock-sync check with a fixed answer.
pub struct FixedClock {
    pub synced: bool,
}

impl ClockSync for FixedClock {
    fn synced(&self) -> bool {
        self.synced
    }
}

/// Power-off that only counts how often it was asked.
#[derive(Default)]
pub struct CountingPower {
    fired: Arc<AtomicU32>,
}

impl CountingPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> Arc<AtomicU32> {
        self.fired.clone()
    }
}

impl PowerOff for CountingPower {
    fn power_off(&self) -> Result<(), AgentError> {
        self.fired.fetch_add(1, Ordering::SeqCst);
        log::info!("power-off requested (suppressed by synthetic power handler)");
        Ok(())
    }
}
