/*
 *  metrics.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	System health readings from /proc and /sys
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Every reading is best effort: anything missing or unparsable reads as 0.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// Re-probes of the GPU after it reports a zero temperature
const GPU_RETRIES: usize = 1;

/// Plausible CPU temperatures, anything else is a dead sensor
const CPU_TEMP_RANGE: std::ops::Range<i64> = 1..120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    CpuTemp,
    GpuTemp,
    MemoryPct,
    GpuPct,
    CpuPct,
}

/// One snapshot of all metrics; missing keys read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsReading {
    values: HashMap<MetricKey, i64>,
}

impl MetricsReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: MetricKey, value: i64) {
        self.values.insert(key, value);
    }

    pub fn with(mut self, key: MetricKey, value: i64) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: MetricKey) -> i64 {
        self.values.get(&key).copied().unwrap_or(0)
    }
}

/// Polling collaborator; never fails, a broken sensor reads 0.
pub trait MetricsSource: Send {
    fn read_all(&mut self) -> MetricsReading;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    total: u64,
    idle: u64,
}

/// Linux sensors. `root` is prepended to every path so tests can fake a tree.
#[derive(Debug)]
pub struct ProcMetrics {
    root: PathBuf,
    last_cpu: Option<CpuTimes>,
    gpu_device: Option<PathBuf>,
}

impl Default for ProcMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn read_first_i64(path: &Path) -> io::Result<i64> {
    let content = fs::read_to_string(path)?;
    let first = content.split_whitespace().next().unwrap_or("0");
    first.parse::<i64>().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Entries of `dir` whose file name starts with `prefix`, sorted
fn prefixed_entries(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect();
    found.sort();
    found
}

impl ProcMetrics {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), last_cpu: None, gpu_device: None }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn cpu_times(&self) -> io::Result<CpuTimes> {
        let stat = fs::read_to_string(self.path("proc/stat"))?;
        let line = stat
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no aggregate cpu line"))?;
        // user nice system idle iowait irq softirq steal
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse::<u64>().unwrap_or(0))
            .collect();
        if fields.len() < 4 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "short cpu line"));
        }
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Ok(CpuTimes { total: fields.iter().sum(), idle })
    }

    /// Busy share since the previous call; the first call has nothing to compare and reads 0
    pub fn cpu_pct(&mut self) -> i64 {
        let now = match self.cpu_times() {
            Ok(t) => t,
            Err(e) => {
                debug!("metrics: cpu times unavailable: {}", e);
                return 0;
            }
        };
        let pct = match self.last_cpu {
            Some(prev) if now.total > prev.total => {
                let total = now.total - prev.total;
                let idle = now.idle.saturating_sub(prev.idle).min(total);
                ((total - idle) * 100 / total) as i64
            }
            _ => 0,
        };
        self.last_cpu = Some(now);
        pct
    }

    pub fn memory_pct(&self) -> i64 {
        let meminfo = match fs::read_to_string(self.path("proc/meminfo")) {
            Ok(s) => s,
            Err(e) => {
                debug!("metrics: meminfo unavailable: {}", e);
                return 0;
            }
        };
        let field = |name: &str| -> Option<u64> {
            meminfo
                .lines()
                .find(|l| l.starts_with(name))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|v| v.parse().ok())
        };
        match (field("MemTotal:"), field("MemAvailable:")) {
            (Some(total), Some(avail)) if total > 0 => {
                (total.saturating_sub(avail) * 100 / total) as i64
            }
            _ => 0,
        }
    }

    /// First thermal zone with a believable reading, whole degrees
    pub fn cpu_temp(&self) -> i64 {
        for zone in prefixed_entries(&self.path("sys/class/thermal"), "thermal_zone") {
            if let Ok(milli) = read_first_i64(&zone.join("temp")) {
                let c = milli / 1000;
                if CPU_TEMP_RANGE.contains(&c) {
                    return c;
                }
            }
        }
        0
    }

    /// First DRM card exposing a busy counter
    fn probe_gpu(&self) -> Option<PathBuf> {
        prefixed_entries(&self.path("sys/class/drm"), "card")
            .into_iter()
            .map(|card| card.join("device"))
            .find(|dev| dev.join("gpu_busy_percent").exists())
    }

    fn gpu_sample(dev: &Path) -> (i64, i64) {
        let temp = prefixed_entries(&dev.join("hwmon"), "hwmon")
            .into_iter()
            .find_map(|hw| read_first_i64(&hw.join("temp1_input")).ok())
            .map_or(0, |milli| milli / 1000);
        let busy = read_first_i64(&dev.join("gpu_busy_percent")).unwrap_or(0);
        (temp, busy)
    }

    /// (temperature, utilisation). A zero temperature usually means the
    /// cached device went away, so the card is probed again a bounded
    /// number of times before giving up.
    pub fn gpu(&mut self) -> (i64, i64) {
        let mut last = (0, 0);
        for attempt in 0..=GPU_RETRIES {
            if self.gpu_device.is_none() {
                self.gpu_device = self.probe_gpu();
            }
            let Some(dev) = self.gpu_device.as_deref() else {
                return last;
            };
            last = Self::gpu_sample(dev);
            if last.0 != 0 {
                return last;
            }
            debug!("metrics: gpu temperature read 0 (attempt {})", attempt + 1);
            self.gpu_device = None;
        }
        last
    }
}

impl MetricsSource for ProcMetrics {
    fn read_all(&mut self) -> MetricsReading {
        let (gpu_temp, gpu_pct) = self.gpu();
        MetricsReading::new()
            .with(MetricKey::CpuTemp, self.cpu_temp())
            .with(MetricKey::GpuTemp, gpu_temp)
            .with(MetricKey::MemoryPct, self.memory_pct())
            .with(MetricKey::GpuPct, gpu_pct)
            .with(MetricKey::CpuPct, self.cpu_pct())
    }
}
