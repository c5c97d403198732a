use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AgentError;

/// Removable-volume inspection.
pub trait VolumeProbe {
    /// Mount entries under the media root, sorted. Empty when nothing is
    /// mounted.
    fn removable_volumes(&self, media_root: &Path) -> Vec<PathBuf>;

    /// Used capacity of the volume holding `mount`, as a percentage.
    fn used_percent(&self, mount: &Path) -> Result<f64, AgentError>;
}

/// Probe backed by the mounted filesystem table.
pub struct SysinfoProbe;

impl VolumeProbe for SysinfoProbe {
    fn removable_volumes(&self, media_root: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(media_root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut volumes: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        volumes.sort();
        volumes
    }

    fn used_percent(&self, mount: &Path) -> Result<f64, AgentError> {
        let disks = sysinfo::Disks::new_with_refreshed_list();

        // Longest mount-point prefix wins, so nested mounts resolve to the
        // volume actually holding the path.
        let disk = disks
            .iter()
            .filter(|d| mount.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                AgentError::IoError(format!("no mounted filesystem holds {:?}", mount))
            })?;

        let total = disk.total_space();
        if total == 0 {
            return Err(AgentError::IoError(format!(
                "filesystem at {:?} reports zero capacity",
                disk.mount_point()
            )));
        }
        let available = disk.available_space();
        Ok((1.0 - available as f64 / total as f64) * 100.0)
    }
}

/// Move a file across filesystems if need be. The scratch area is
/// memory-backed, so a plain rename to durable or removable storage fails
/// with EXDEV; fall back to copy-then-remove.
pub fn move_file(src: &Path, dest: &Path) -> Result<(), AgentError> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest).map_err(|e| AgentError::io(e, "copy during move"))?;
    fs::remove_file(src).map_err(|e| AgentError::io(e, "remove source after copy"))?;
    Ok(())
}
