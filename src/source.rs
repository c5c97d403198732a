//! Frame acquisition seam
//!
//! The camera stack (sensor, ISP, low-resolution inference stream) lives
//! outside this crate. The agent only needs successive frames plus a fresh
//! free-memory reading each cycle, so that is the whole contract.

use crate::errors::AgentError;
use crate::types::Frame;

/// Source of low-resolution frames and free-RAM samples.
///
/// `capture` may block for up to nominal camera latency; nothing else in the
/// control loop tolerates blocking collaborators. Implementations must return
/// a fresh `free_ram` measurement on every call — the controller's
/// backpressure guarantee depends on the sample never being stale.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, AgentError>;

    /// Current free RAM in bytes.
    fn free_ram(&mut self) -> Result<u64, AgentError>;
}
