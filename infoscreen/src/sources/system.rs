//! Local host metrics
//!
//! | Key      | Source                                        |
//! |----------|-----------------------------------------------|
//! | `cpu_u`  | `/proc/stat` busy/total delta between polls   |
//! | `cpu_t`  | `/sys/class/thermal/thermal_zone0/temp` (m°C) |
//! | `ram`    | `/proc/meminfo` `MemTotal` vs `MemAvailable`  |
//! | `disk`   | `statvfs("/")`                                |
//! | `uptime` | `/proc/uptime`, formatted `{d}d {h}h`         |
//! | `ip`     | local address of a connected UDP socket       |
//!
//! Each metric is read independently; one unreadable file leaves the
//! others updating.

use std::fs;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::Value;

use crate::store::{keys, Store};
use crate::worker::Update;

/// Cumulative CPU jiffies from the aggregate `cpu` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// Parse the first `cpu ` line of `/proc/stat`
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Usage percent between two samples
pub fn cpu_percent(prev: CpuTimes, now: CpuTimes) -> f64 {
    let total = now.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let busy = now.busy.saturating_sub(prev.busy);
    round1(busy as f64 * 100.0 / total as f64)
}

/// Used memory percent from `/proc/meminfo`
pub fn parse_meminfo(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    (total > 0.0).then(|| round1((total - available) * 100.0 / total))
}

/// `"{d}d {h}h"` from the first field of `/proc/uptime`
pub fn parse_uptime(uptime: &str) -> Option<String> {
    let secs: f64 = uptime.split_whitespace().next()?.parse().ok()?;
    let secs = secs as u64;
    Some(format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3_600))
}

/// Whole degrees from a millidegree reading
pub fn parse_thermal(raw: &str) -> Option<i64> {
    raw.trim().parse::<f64>().ok().map(|m| (m / 1000.0) as i64)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Used space percent of the filesystem holding `path`
#[cfg(unix)]
pub fn disk_percent(path: &str) -> Result<f64> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let path_cstr = CString::new(path).with_context(|| format!("Invalid path {path}"))?;
    let stat = unsafe {
        let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
        if libc::statvfs(path_cstr.as_ptr(), stat.as_mut_ptr()) != 0 {
            return Err(std::io::Error::last_os_error()).with_context(|| format!("statvfs {path}"));
        }
        stat.assume_init()
    };
    let frsize = stat.f_frsize as f64;
    let used = (stat.f_blocks as f64 - stat.f_bfree as f64) * frsize;
    let available = stat.f_bavail as f64 * frsize;
    if used + available <= 0.0 {
        return Ok(0.0);
    }
    Ok(round1(used * 100.0 / (used + available)))
}

#[cfg(not(unix))]
pub fn disk_percent(_path: &str) -> Result<f64> {
    anyhow::bail!("disk usage is only available on unix")
}

/// Address the default route would use; `"N/A"` when offline
pub fn local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|e| {
            debug!("Local address lookup failed: {}", e);
            String::from("N/A")
        })
}

/// Filesystem locations read each poll
#[derive(Debug, Clone)]
pub struct ProcPaths {
    pub stat: PathBuf,
    pub meminfo: PathBuf,
    pub uptime: PathBuf,
    pub thermal: PathBuf,
    pub mount: String,
}

impl Default for ProcPaths {
    fn default() -> Self {
        Self {
            stat: PathBuf::from("/proc/stat"),
            meminfo: PathBuf::from("/proc/meminfo"),
            uptime: PathBuf::from("/proc/uptime"),
            thermal: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            mount: String::from("/"),
        }
    }
}

/// Worker publishing local metrics
#[derive(Debug, Default)]
pub struct SystemMonitor {
    paths: ProcPaths,
    last_cpu: Option<CpuTimes>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: ProcPaths) -> Self {
        Self { paths, last_cpu: None }
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn sample_cpu(&mut self) -> Result<f64> {
        let now = parse_cpu_times(&self.read(&self.paths.stat)?).context("no aggregate cpu line")?;
        // first sample has no baseline
        let percent = self.last_cpu.map(|prev| cpu_percent(prev, now)).unwrap_or(0.0);
        self.last_cpu = Some(now);
        Ok(percent)
    }

    /// Read every metric, returning the store entries that succeeded
    pub fn collect(&mut self) -> Vec<(String, Value)> {
        let mut entries = Vec::new();
        let mut put = |key: &str, value: Value| entries.push((key.to_string(), value));

        match self.sample_cpu() {
            Ok(cpu) => put(keys::CPU_USAGE, cpu.into()),
            Err(e) => warn!("CPU usage unavailable: {:#}", e),
        }
        match self.read(&self.paths.meminfo).map(|s| parse_meminfo(&s)) {
            Ok(Some(ram)) => put(keys::RAM, ram.into()),
            Ok(None) => warn!("Unrecognized meminfo format"),
            Err(e) => warn!("Memory usage unavailable: {:#}", e),
        }
        match disk_percent(&self.paths.mount) {
            Ok(disk) => put(keys::DISK, disk.into()),
            Err(e) => warn!("Disk usage unavailable: {:#}", e),
        }
        if let Ok(Some(uptime)) = self.read(&self.paths.uptime).map(|s| parse_uptime(&s)) {
            put(keys::UPTIME, uptime.into());
        }
        // boards without a thermal zone report 0
        let temp = self
            .read(&self.paths.thermal)
            .ok()
            .and_then(|s| parse_thermal(&s))
            .unwrap_or(0);
        put(keys::CPU_TEMP, temp.into());
        put(keys::IP, local_ip().into());
        entries
    }
}

impl Update for SystemMonitor {
    fn update(&mut self, store: &Store) -> Result<()> {
        let entries = self.collect();
        debug!("System metrics: {} keys", entries.len());
        store.update(entries);
        Ok(())
    }
}
