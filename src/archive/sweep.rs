use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::archive::{move_file, Transcoder, VolumeProbe};
use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::types::{distribution_path, PendingFile};

/// Counters for one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub transcoded: u32,
    pub relocated: u32,
    pub offloaded: u32,
    pub failures: u32,
}

/// The transcode / relocate / offload pipeline.
///
/// Sweeps are time-gated, not event-gated: a stop registers the pending file
/// and resets the timer, and the conversion work happens on the next due
/// sweep while the controller is idle. Single-file failures are isolated and
/// retried next sweep; a sweep-level failure aborts the remainder of that
/// sweep and nothing more.
pub struct ArchivePipeline {
    transcoder: Box<dyn Transcoder>,
    probe: Box<dyn VolumeProbe>,
    scratch_dir: PathBuf,
    video_dir: PathBuf,
    picture_dir: PathBuf,
    media_root: PathBuf,
    interval: Duration,
    high_water_percent: f64,
    last_sweep: Instant,
    pending: Vec<PendingFile>,
}

impl ArchivePipeline {
    pub fn new(
        config: &AgentConfig,
        transcoder: Box<dyn Transcoder>,
        probe: Box<dyn VolumeProbe>,
    ) -> Self {
        Self {
            transcoder,
            probe,
            scratch_dir: config.storage.scratch_dir.clone(),
            video_dir: config.storage.video_dir.clone(),
            picture_dir: config.storage.picture_dir.clone(),
            media_root: config.storage.media_root.clone(),
            interval: Duration::from_secs(config.storage.sweep_secs),
            high_water_percent: config.storage.high_water_percent,
            last_sweep: Instant::now(),
            pending: Vec::new(),
        }
    }

    /// Register a finished raw capture and reset the sweep timer.
    pub fn note_stopped(&mut self, pending: PendingFile) {
        self.last_sweep = Instant::now();
        self.pending.push(pending);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn due(&self) -> bool {
        self.due_at(Instant::now())
    }

    pub fn due_at(&self, now: Instant) -> bool {
        now.duration_since(self.last_sweep) > self.interval
    }

    /// Run one sweep. `protect` names files the pipeline must not touch
    /// (the caller's last-known pointer into the archive).
    pub fn sweep(&mut self, protect: &HashSet<PathBuf>) -> Result<SweepReport, AgentError> {
        self.last_sweep = Instant::now();
        let mut report = SweepReport::default();

        self.transcode_stage(&mut report);
        self.relocate_stage(&mut report)?;
        self.offload_stage(protect, &mut report)?;

        if report != SweepReport::default() {
            log::info!(
                "sweep: {} transcoded, {} relocated, {} offloaded, {} failures",
                report.transcoded,
                report.relocated,
                report.offloaded,
                report.failures
            );
        }
        Ok(report)
    }

    /// Run only the offload stage. Used for the best-effort final migration
    /// on the shutdown path.
    pub fn offload_now(&mut self, protect: &HashSet<PathBuf>) -> Result<SweepReport, AgentError> {
        let mut report = SweepReport::default();
        self.offload_stage(protect, &mut report)?;
        Ok(report)
    }

    /// Remux every pending raw capture. The queue is merged with a scratch
    /// scan so orphans from a crash are picked up too. A raw file is deleted
    /// only after its distribution file exists; failures leave it for the
    /// next sweep.
    fn transcode_stage(&mut self, report: &mut SweepReport) {
        let mut raws: Vec<PathBuf> = self.pending.drain(..).map(|p| p.raw_path).collect();
        raws.extend(files_with_extension(&self.scratch_dir, "h264"));
        raws.sort();
        raws.dedup();

        for raw in raws {
            if !raw.exists() {
                continue;
            }
            let dest = distribution_path(&raw);

            if !dest.exists() {
                if let Err(e) = self.transcoder.remux(&raw, &dest) {
                    log::warn!("remux failed, keeping {:?} for next sweep: {}", raw, e);
                    self.pending.push(PendingFile::new(raw));
                    report.failures += 1;
                    continue;
                }
            }

            match fs::remove_file(&raw) {
                Ok(()) => {
                    log::info!("saved {:?}", dest);
                    report.transcoded += 1;
                }
                Err(e) => {
                    // The mp4 exists, so the next sweep resolves this
                    // without re-remuxing.
                    log::warn!("failed to remove raw {:?}: {}", raw, e);
                    report.failures += 1;
                }
            }
        }
    }

    /// Move distribution files from scratch to the durable tree, skipping
    /// any that already arrived.
    fn relocate_stage(&mut self, report: &mut SweepReport) -> Result<(), AgentError> {
        fs::create_dir_all(&self.video_dir)
            .map_err(|e| AgentError::io(e, "create video directory"))?;

        for src in files_with_extension(&self.scratch_dir, "mp4") {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = self.video_dir.join(name);
            if dest.exists() {
                continue;
            }
            match move_file(&src, &dest) {
                Ok(()) => report.relocated += 1,
                Err(e) => {
                    log::warn!("relocate of {:?} failed: {}", src, e);
                    report.failures += 1;
                }
            }
        }
        Ok(())
    }

    /// Best-effort migration to the first removable volume, suppressed at or
    /// above the high-water mark. Only the first enumerated volume is
    /// consulted.
    fn offload_stage(
        &mut self,
        protect: &HashSet<PathBuf>,
        report: &mut SweepReport,
    ) -> Result<(), AgentError> {
        let volumes = self.probe.removable_volumes(&self.media_root);
        let Some(volume) = volumes.first() else {
            return Ok(());
        };

        let used = self.probe.used_percent(volume)?;
        if used >= self.high_water_percent {
            log::info!(
                "offload skipped, {:?} at {:.1}% (high-water {:.0}%)",
                volume,
                used,
                self.high_water_percent
            );
            return Ok(());
        }

        for (src_dir, dest_dir, ext) in [
            (self.video_dir.clone(), volume.join("Videos"), "mp4"),
            (self.picture_dir.clone(), volume.join("Pictures"), "jpg"),
        ] {
            let (moved, failures) = self.offload_tree(&src_dir, &dest_dir, ext, protect)?;
            report.offloaded += moved;
            report.failures += failures;
        }
        Ok(())
    }

    fn offload_tree(
        &self,
        src_dir: &Path,
        dest_dir: &Path,
        ext: &str,
        protect: &HashSet<PathBuf>,
    ) -> Result<(u32, u32), AgentError> {
        fs::create_dir_all(dest_dir)
            .map_err(|e| AgentError::io(e, "create offload directory"))?;

        let mut moved = 0;
        let mut failures = 0;
        for src in files_with_extension(src_dir, ext) {
            if protect.contains(&src) {
                continue;
            }
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = dest_dir.join(name);
            if dest.exists() {
                continue;
            }
            match move_file(&src, &dest) {
                Ok(()) => moved += 1,
                Err(e) => {
                    log::warn!("offload of {:?} failed: {}", src, e);
                    failures += 1;
                }
            }
        }
        Ok((moved, failures))
    }
}

/// Files in `dir` with the given extension, sorted so lexical (and therefore
/// chronological) order drives processing. Missing directory reads as empty.
fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == ext).unwrap_or(false))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_with_extension_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.h264"), b"x").unwrap();
        fs::write(dir.path().join("a.h264"), b"x").unwrap();
        fs::write(dir.path().join("c.mp4"), b"x").unwrap();

        let files = files_with_extension(dir.path(), "h264");
        assert_eq!(
            files,
            vec![dir.path().join("a.h264"), dir.path().join("b.h264")]
        );
    }

    #[test]
    fn test_files_with_extension_missing_dir() {
        assert!(files_with_extension(Path::new("/no/such/dir"), "mp4").is_empty());
    }
}
