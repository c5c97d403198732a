//! Core value types shared across the agent

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A single low-resolution frame from the camera's inference stream.
///
/// Frames are tightly packed RGB8. The agent never inspects pixel data
/// itself; it hands frames to the detector and the encoder and, at trigger
/// time, writes one out as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Whether the buffer length matches the declared RGB8 dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

/// A finished raw capture awaiting remux to the distribution format.
///
/// Created when a recording stops; consumed (raw file deleted) once the remux
/// succeeds. A failed remux leaves the record for the next sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub raw_path: PathBuf,
    pub created: Instant,
}

impl PendingFile {
    pub fn new(raw_path: PathBuf) -> Self {
        Self {
            raw_path,
            created: Instant::now(),
        }
    }
}

/// Reason a recording was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Minimum recording length elapsed since the last qualifying detection.
    Lapsed,
    /// Free RAM fell to or below the configured limit.
    RamPressure,
}

/// Derive the sortable capture stem for a wall-clock instant.
///
/// Lexical order equals chronological order at one-second granularity within
/// the same day, which the archive sweep's sort-then-process policy relies on.
pub fn capture_stem(now: &DateTime<Local>) -> String {
    now.format("%y%m%d_%H%M%S").to_string()
}

/// Raw capture path for a stem inside the scratch directory.
pub fn raw_capture_path(scratch_dir: &Path, stem: &str) -> PathBuf {
    scratch_dir.join(format!("{}.h264", stem))
}

/// Distribution-format path derived from a raw capture path.
pub fn distribution_path(raw: &Path) -> PathBuf {
    raw.with_extension("mp4")
}

/// Snapshot path for a stem inside the picture directory.
pub fn snapshot_path(picture_dir: &Path, stem: &str) -> PathBuf {
    picture_dir.join(format!("{}.jpg", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_capture_stem_format() {
        let t = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(capture_stem(&t), "250309_140507");
    }

    #[test]
    fn test_capture_stem_sorts_chronologically() {
        let a = Local.with_ymd_and_hms(2025, 3, 9, 9, 59, 59).unwrap();
        let b = Local.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        assert!(capture_stem(&a) < capture_stem(&b));
    }

    #[test]
    fn test_path_derivation() {
        let raw = raw_capture_path(Path::new("/run/shm"), "250309_140507");
        assert_eq!(raw, PathBuf::from("/run/shm/250309_140507.h264"));
        assert_eq!(
            distribution_path(&raw),
            PathBuf::from("/run/shm/250309_140507.mp4")
        );
    }

    #[test]
    fn test_frame_well_formed() {
        let frame = Frame::new(vec![0u8; 12], 2, 2);
        assert!(frame.is_well_formed());
        let bad = Frame::new(vec![0u8; 11], 2, 2);
        assert!(!bad.is_well_formed());
    }
}
