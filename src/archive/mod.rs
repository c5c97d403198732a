//! Archive pipeline
//!
//! Converts finished raw captures to the distribution format, relocates them
//! from the scratch area to durable storage, and opportunistically offloads
//! older archives to removable storage. Runs only while the controller is
//! idle, on a time-gated sweep schedule:
//! - `Transcoder`: opaque remux operation (container change, same bitstream)
//! - `VolumeProbe`: removable-volume enumeration and capacity inspection
//! - `ArchivePipeline`: the sweep itself (transcode, relocate, offload)
//!
//! The transcode stage rediscovers raw captures by scanning the scratch
//! directory each sweep, so files orphaned by a crash or an aborted cycle
//! are archived like any other.

mod sweep;
mod transcode;
mod volumes;

pub use sweep::{ArchivePipeline, SweepReport};
pub use transcode::{FfmpegRemuxer, Transcoder};
pub use volumes::{move_file, SysinfoProbe, VolumeProbe};
