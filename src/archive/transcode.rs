use std::path::Path;
use std::process::Command;

use crate::errors::AgentError;

/// Opaque remux operation: raw capture in, distribution-format file out.
/// Container change only — the bitstream and its timing must pass through
/// untouched.
pub trait Transcoder {
    fn remux(&self, raw: &Path, dest: &Path) -> Result<(), AgentError>;
}

/// Remux via the system ffmpeg with `-c copy`.
pub struct FfmpegRemuxer {
    fps: u32,
}

impl FfmpegRemuxer {
    pub fn new(fps: u32) -> Self {
        Self { fps }
    }
}

impl Transcoder for FfmpegRemuxer {
    fn remux(&self, raw: &Path, dest: &Path) -> Result<(), AgentError> {
        let output = Command::new("ffmpeg")
            .arg("-nostdin")
            .arg("-loglevel")
            .arg("error")
            .arg("-framerate")
            .arg(self.fps.to_string())
            .arg("-i")
            .arg(raw)
            .arg("-c")
            .arg("copy")
            .arg(dest)
            .output()
            .map_err(|e| AgentError::EncodingError(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::EncodingError(format!(
                "ffmpeg remux of {:?} failed ({}): {}",
                raw,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}
