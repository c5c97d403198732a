use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::errors::AgentError;
use crate::recording::{Encoder, PrerollBuffer};
use crate::types::Frame;

/// Owns the encoder handle and the pre-roll ring.
///
/// At most one output is active at a time; `start` on an active session is a
/// caller bug and fails with `ResourceBusy`. `stop` is safe against
/// double-stop (warned no-op). The ring is filled by `feed` on every cycle;
/// recording state only decides whether frames additionally reach the open
/// output.
pub struct RecordingSession {
    encoder: Box<dyn Encoder>,
    preroll: PrerollBuffer,
    active: Option<ActiveOutput>,
}

struct ActiveOutput {
    path: PathBuf,
    started_at: Instant,
}

impl RecordingSession {
    pub fn new(encoder: Box<dyn Encoder>, preroll: PrerollBuffer) -> Self {
        Self {
            encoder,
            preroll,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Elapsed recording time of the active output, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.started_at.elapsed())
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Ingest one frame: always into the pre-roll ring, and into the open
    /// output while recording. A write failure closes the output and
    /// deactivates the session so no half-open recording survives.
    pub fn feed(&mut self, frame: &Frame) -> Result<(), AgentError> {
        self.preroll.push(frame.clone());
        if self.active.is_some() {
            if let Err(e) = self.encoder.write(frame) {
                log::error!("encoder write failed, closing output: {}", e);
                if let Err(stop_err) = self.encoder.stop() {
                    log::warn!("encoder stop after failed write: {}", stop_err);
                }
                self.active = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Begin writing to `path`, flushing the pre-roll ring first so the
    /// output contains footage preceding the trigger.
    pub fn start(&mut self, path: &Path) -> Result<(), AgentError> {
        if let Some(active) = &self.active {
            return Err(AgentError::ResourceBusy(format!(
                "encoder already writing {:?}",
                active.path
            )));
        }

        self.encoder.start(path)?;

        for frame in self.preroll.snapshot() {
            if let Err(e) = self.encoder.write(&frame) {
                // Mid-flush failure: close the output and stay inactive
                // rather than report a session that never really started.
                if let Err(stop_err) = self.encoder.stop() {
                    log::warn!("encoder stop after failed pre-roll flush: {}", stop_err);
                }
                return Err(e);
            }
        }

        self.active = Some(ActiveOutput {
            path: path.to_path_buf(),
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Flush and close the output. Stopping an idle session is a warned
    /// no-op, not an error.
    pub fn stop(&mut self) -> Result<(), AgentError> {
        if self.active.is_none() {
            log::warn!("stop requested but no recording is active");
            return Ok(());
        }
        let result = self.encoder.stop();
        self.active = None;
        result
    }

    pub fn preroll(&self) -> &PrerollBuffer {
        &self.preroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default, Clone)]
    struct Script {
        starts: Vec<PathBuf>,
        stops: u32,
        writes: u32,
        fail_write: bool,
    }

    struct ScriptedEncoder(Rc<RefCell<Script>>);

    impl Encoder for ScriptedEncoder {
        fn start(&mut self, path: &Path) -> Result<(), AgentError> {
            self.0.borrow_mut().starts.push(path.to_path_buf());
            Ok(())
        }
        fn stop(&mut self) -> Result<(), AgentError> {
            self.0.borrow_mut().stops += 1;
            Ok(())
        }
        fn write(&mut self, _frame: &Frame) -> Result<(), AgentError> {
            let mut s = self.0.borrow_mut();
            if s.fail_write {
                return Err(AgentError::EncodingError("scripted failure".into()));
            }
            s.writes += 1;
            Ok(())
        }
    }

    fn session(script: &Rc<RefCell<Script>>, capacity: usize) -> RecordingSession {
        RecordingSession::new(
            Box::new(ScriptedEncoder(script.clone())),
            PrerollBuffer::new(capacity),
        )
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 3], 1, 1)
    }

    #[test]
    fn test_start_flushes_preroll() {
        let script = Rc::new(RefCell::new(Script::default()));
        let mut session = session(&script, 4);
        for _ in 0..3 {
            session.feed(&frame()).unwrap();
        }
        session.start(Path::new("/tmp/out.h264")).unwrap();
        assert_eq!(script.borrow().writes, 3);
        assert!(session.is_active());
    }

    #[test]
    fn test_double_start_is_resource_busy() {
        let script = Rc::new(RefCell::new(Script::default()));
        let mut session = session(&script, 4);
        session.start(Path::new("/tmp/a.h264")).unwrap();
        let err = session.start(Path::new("/tmp/b.h264")).unwrap_err();
        assert!(matches!(err, AgentError::ResourceBusy(_)));
        assert_eq!(script.borrow().starts.len(), 1);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let script = Rc::new(RefCell::new(Script::default()));
        let mut session = session(&script, 4);
        session.start(Path::new("/tmp/a.h264")).unwrap();
        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(script.borrow().stops, 1);
    }

    #[test]
    fn test_feed_writes_only_while_active() {
        let script = Rc::new(RefCell::new(Script::default()));
        let mut session = session(&script, 4);
        session.feed(&frame()).unwrap();
        assert_eq!(script.borrow().writes, 0);
        session.start(Path::new("/tmp/a.h264")).unwrap();
        session.feed(&frame()).unwrap();
        assert_eq!(script.borrow().writes, 2); // 1 flushed + 1 live
    }

    #[test]
    fn test_write_failure_deactivates() {
        let script = Rc::new(RefCell::new(Script::default()));
        let mut session = session(&script, 4);
        session.start(Path::new("/tmp/a.h264")).unwrap();
        script.borrow_mut().fail_write = true;
        assert!(session.feed(&frame()).is_err());
        assert!(!session.is_active());
        assert_eq!(script.borrow().stops, 1);
    }
}
