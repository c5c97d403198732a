use std::path::Path;

use crate::errors::AgentError;
use crate::types::Frame;

/// Opaque H.264 encoder and output sink.
///
/// The encoder runs continuously; `start`/`stop` only control where its
/// output lands. `write` is called once per frame while an output is open.
/// Codec internals, bitrate control, and container details are the
/// implementation's business.
pub trait Encoder {
    /// Open `path` as the active output.
    fn start(&mut self, path: &Path) -> Result<(), AgentError>;

    /// Flush and close the active output.
    fn stop(&mut self) -> Result<(), AgentError>;

    /// Write one frame to the active output.
    fn write(&mut self, frame: &Frame) -> Result<(), AgentError>;
}
