//! Operating system queries behind the system collector.
//!
//! Every query is synchronous and independent; a failing query costs only
//! the metric family built from it.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};
use sysprom_common::error::{Result, SyspromError};

#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub mount: PathBuf,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

pub trait HostProbe: Send + Sync {
    /// Blocks for `window` while measuring.
    fn cpu_usage_percent(&self, window: Duration) -> Result<f64>;
    fn memory_used_bytes(&self) -> Result<u64>;
    /// Usage of the filesystem holding `path`, which need not be a mount point.
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage>;
    fn network_counters(&self) -> Result<Vec<InterfaceCounters>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl SysinfoProbe {
    pub fn new() -> Self {
        Self
    }

    fn ensure_supported() -> Result<()> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(SyspromError::Probe(
                "host metrics are not supported on this platform".to_string(),
            ))
        }
    }
}

impl HostProbe for SysinfoProbe {
    fn cpu_usage_percent(&self, window: Duration) -> Result<f64> {
        Self::ensure_supported()?;

        let mut system = System::new();
        system.refresh_cpu_usage();
        if system.cpus().is_empty() {
            return Err(SyspromError::Probe("no cpus reported".to_string()));
        }

        std::thread::sleep(window.max(MINIMUM_CPU_UPDATE_INTERVAL));
        system.refresh_cpu_usage();

        let usage = f64::from(system.global_cpu_usage());
        if usage.is_finite() {
            Ok(usage)
        } else {
            Err(SyspromError::Probe(format!("cpu usage is not finite: {usage}")))
        }
    }

    fn memory_used_bytes(&self) -> Result<u64> {
        Self::ensure_supported()?;

        let mut system = System::new();
        system.refresh_memory();
        if system.total_memory() == 0 {
            return Err(SyspromError::Probe("total memory reported as zero".to_string()));
        }

        Ok(system.used_memory())
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage> {
        Self::ensure_supported()?;

        let space = filesystem_space(path)?;
        let used_percent = space.used_percent().ok_or_else(|| {
            SyspromError::Probe(format!(
                "filesystem at {} reports zero capacity",
                path.display()
            ))
        })?;

        Ok(DiskUsage {
            mount: path.to_path_buf(),
            used_percent,
        })
    }

    fn network_counters(&self) -> Result<Vec<InterfaceCounters>> {
        Self::ensure_supported()?;

        let networks = Networks::new_with_refreshed_list();
        let mut counters = networks
            .list()
            .iter()
            .map(|(name, data)| InterfaceCounters {
                name: name.clone(),
                bytes_sent: data.total_transmitted(),
                bytes_received: data.total_received(),
            })
            .collect::<Vec<_>>();

        counters.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(counters)
    }
}

/// Byte counts for the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FilesystemSpace {
    total: u64,
    free: u64,
    available: u64,
}

impl FilesystemSpace {
    /// Used share of the space visible to unprivileged users; blocks reserved
    /// for root count as neither used nor available.
    fn used_percent(&self) -> Option<f64> {
        let used = self.total.saturating_sub(self.free);
        let visible = used.saturating_add(self.available);
        if self.total == 0 || visible == 0 {
            return None;
        }
        Some(used as f64 / visible as f64 * 100.0)
    }
}

#[cfg(unix)]
fn filesystem_space(path: &Path) -> Result<FilesystemSpace> {
    use std::{ffi::CString, os::unix::ffi::OsStrExt};

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        SyspromError::Probe(format!("path contains a nul byte: {}", path.display()))
    })?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(SyspromError::Probe(format!(
            "statvfs {} failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        )));
    }

    let block_size = stat.f_frsize as u64;
    Ok(FilesystemSpace {
        total: (stat.f_blocks as u64).saturating_mul(block_size),
        free: (stat.f_bfree as u64).saturating_mul(block_size),
        available: (stat.f_bavail as u64).saturating_mul(block_size),
    })
}

#[cfg(not(unix))]
fn filesystem_space(path: &Path) -> Result<FilesystemSpace> {
    use sysinfo::Disks;

    let target = path.canonicalize().map_err(|err| {
        SyspromError::Probe(format!("cannot resolve {}: {err}", path.display()))
    })?;

    let disks = Disks::new_with_refreshed_list();
    let mount = longest_mount_prefix(
        disks.list().iter().map(|disk| disk.mount_point()),
        &target,
    )
    .ok_or_else(|| SyspromError::Probe(format!("no disk holds {}", target.display())))?;
    let disk = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == mount)
        .ok_or_else(|| SyspromError::Probe(format!("no disk mounted at {}", mount.display())))?;

    // sysinfo exposes no separate free count here.
    Ok(FilesystemSpace {
        total: disk.total_space(),
        free: disk.available_space(),
        available: disk.available_space(),
    })
}

/// The mount point that is the longest component-wise prefix of `target`.
#[cfg_attr(unix, allow(dead_code))]
fn longest_mount_prefix<'a>(
    mounts: impl IntoIterator<Item = &'a Path>,
    target: &Path,
) -> Option<&'a Path> {
    mounts
        .into_iter()
        .filter(|mount| target.starts_with(mount))
        .max_by_key(|mount| mount.components().count())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use sysinfo::MINIMUM_CPU_UPDATE_INTERVAL;
    use sysprom_common::error::SyspromError;

    use super::{FilesystemSpace, HostProbe, SysinfoProbe, longest_mount_prefix};

    #[test]
    fn used_percent_excludes_reserved_blocks() {
        let space = FilesystemSpace {
            total: 100,
            free: 30,
            available: 20,
        };
        let percent = space.used_percent().unwrap();
        assert!((percent - 70.0 / 90.0 * 100.0).abs() < 1e-9);

        let empty = FilesystemSpace {
            total: 0,
            free: 0,
            available: 0,
        };
        assert_eq!(empty.used_percent(), None);
    }

    #[test]
    fn picks_the_deepest_mount_holding_the_path() {
        let mounts = [
            Path::new("/"),
            Path::new("/var"),
            Path::new("/var/lib/data"),
        ];
        assert_eq!(
            longest_mount_prefix(mounts, Path::new("/var/lib/data/db")),
            Some(Path::new("/var/lib/data"))
        );
        assert_eq!(
            longest_mount_prefix(mounts, Path::new("/var/log")),
            Some(Path::new("/var"))
        );
        assert_eq!(
            longest_mount_prefix(mounts, Path::new("/variable")),
            Some(Path::new("/"))
        );
        assert_eq!(longest_mount_prefix([Path::new("/mnt")], Path::new("/root")), None);
    }

    #[test]
    fn root_disk_usage_is_a_percentage() {
        let usage = SysinfoProbe::new().disk_usage(Path::new("/")).unwrap();
        assert_eq!(usage.mount, Path::new("/"));
        assert!(usage.used_percent.is_finite());
        assert!((0.0..=100.0).contains(&usage.used_percent));
    }

    #[test]
    fn directories_below_a_mount_are_resolved() {
        let dir = std::env::temp_dir();
        let usage = SysinfoProbe::new().disk_usage(&dir).unwrap();
        assert_eq!(usage.mount, dir);
        assert!((0.0..=100.0).contains(&usage.used_percent));
    }

    #[test]
    fn missing_paths_fail_to_resolve() {
        let err = SysinfoProbe::new()
            .disk_usage(Path::new("/definitely/not/a/real/sysprom/path"))
            .unwrap_err();
        assert!(matches!(err, SyspromError::Probe(_)), "unexpected error: {err}");
    }

    #[test]
    fn memory_in_use_is_reported() {
        assert!(SysinfoProbe::new().memory_used_bytes().unwrap() > 0);
    }

    #[test]
    fn cpu_usage_is_a_percentage() {
        let percent = SysinfoProbe::new()
            .cpu_usage_percent(MINIMUM_CPU_UPDATE_INTERVAL)
            .unwrap();
        assert!(percent.is_finite());
        assert!((0.0..=100.0).contains(&percent));
    }
}
