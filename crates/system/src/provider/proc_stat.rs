use super::CpuUsageProvider;
use meter_core::{MeterError, Result};
use std::path::{Path, PathBuf};

/// Linux backend reading the aggregate `cpu` line of `/proc/stat`.
///
/// Usage is the share of non-idle jiffies between two consecutive reads.
/// The baseline is taken in [`from_path`](Self::from_path), so a reading
/// right after construction usually spans zero jiffies and reports 0.0; the
/// loop's immediate first tick therefore pulls `min`/`average` down.
#[derive(Debug)]
pub struct ProcStatProvider {
    path: PathBuf,
    prev: CpuTimes,
}

/// Jiffy counters from one aggregate `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle
            + self.iowait + self.irq + self.softirq + self.steal
    }

    #[must_use]
    pub const fn busy(&self) -> u64 {
        self.total() - self.idle - self.iowait
    }

    /// Busy share since `prev`, clamped to 0.0 – 100.0.
    ///
    /// Counter wraparound saturates to zero; no elapsed jiffies reads as idle.
    #[must_use]
    pub fn usage_since(&self, prev: &Self) -> f32 {
        let total = self.total().saturating_sub(prev.total());
        let busy = self.busy().saturating_sub(prev.busy());
        if total == 0 {
            return 0.0;
        }
        ((busy as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
    }

    /// Parse the aggregate `cpu ` line (the first line of `/proc/stat`).
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return Err(MeterError::Provider(format!(
                "expected aggregate 'cpu' line, got '{line}'"
            )));
        }

        let values = fields
            .take(8)
            .map(str::parse::<u64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MeterError::Provider(format!("bad /proc/stat counter: {e}")))?;

        if values.len() < 4 {
            return Err(MeterError::Provider(format!(
                "expected at least 4 cpu counters, got {}",
                values.len()
            )));
        }

        let at = |i: usize| values.get(i).copied().unwrap_or(0);
        Ok(Self {
            user: at(0),
            nice: at(1),
            system: at(2),
            idle: at(3),
            iowait: at(4),
            irq: at(5),
            softirq: at(6),
            steal: at(7),
        })
    }
}

impl ProcStatProvider {
    pub const PROC_STAT_PATH: &'static str = "/proc/stat";

    pub fn new() -> Result<Self> {
        Self::from_path(Self::PROC_STAT_PATH)
    }

    /// Bind to a stat file at `path` and take the baseline reading.
    ///
    /// An unreadable or unparsable file means the backend does not exist on
    /// this host and yields [`MeterError::PlatformUnsupported`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let prev = read_times(&path).map_err(|e| {
            MeterError::PlatformUnsupported(format!("{} unavailable: {e}", path.display()))
        })?;
        Ok(Self { path, prev })
    }
}

impl CpuUsageProvider for ProcStatProvider {
    fn current_usage_percent(&mut self) -> Result<f32> {
        let now = read_times(&self.path)?;
        let usage = now.usage_since(&self.prev);
        self.prev = now;
        Ok(usage)
    }

    fn name(&self) -> &'static str {
        "proc-stat"
    }
}

fn read_times(path: &Path) -> Result<CpuTimes> {
    let content = std::fs::read_to_string(path)?;
    let first = content
        .lines()
        .next()
        .ok_or_else(|| MeterError::Provider(format!("{} is empty", path.display())))?;
    CpuTimes::parse(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_line() {
        let t = CpuTimes::parse("cpu  4705 356 584 3699 23 0 12 7 0 0").unwrap();
        assert_eq!(t.user, 4705);
        assert_eq!(t.steal, 7);
        assert_eq!(t.total(), 4705 + 356 + 584 + 3699 + 23 + 12 + 7);
        assert_eq!(t.busy(), t.total() - 3699 - 23);
    }

    #[test]
    fn parses_short_line_with_zero_padding() {
        let t = CpuTimes::parse("cpu 1 2 3 4").unwrap();
        assert_eq!(t.iowait, 0);
        assert_eq!(t.total(), 10);
    }

    #[test]
    fn rejects_per_core_and_malformed_lines() {
        assert!(CpuTimes::parse("cpu0 1 2 3 4").is_err());
        assert!(CpuTimes::parse("cpu 1 2").is_err());
        assert!(CpuTimes::parse("cpu 1 x 3 4").is_err());
        assert!(CpuTimes::parse("intr 1 2 3 4").is_err());
    }

    #[test]
    fn usage_is_busy_share_of_delta() {
        let prev = CpuTimes::parse("cpu 100 0 100 800").unwrap();
        let now = CpuTimes::parse("cpu 200 0 200 1600").unwrap();
        assert_eq!(now.usage_since(&prev), 20.0);
        assert_eq!(now.usage_since(&now), 0.0);
    }

    #[test]
    fn wrapped_counters_do_not_underflow() {
        let prev = CpuTimes::parse("cpu 500 0 500 500").unwrap();
        let now = CpuTimes::parse("cpu 1 0 1 1").unwrap();
        assert_eq!(now.usage_since(&prev), 0.0);
    }

    #[test]
    fn provider_reports_delta_between_reads() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "cpu  100 0 100 800 0 0 0 0\ncpu0 1 1 1 1\n").unwrap();
        let mut provider = ProcStatProvider::from_path(file.path()).unwrap();

        std::fs::write(file.path(), "cpu  200 0 200 1600 0 0 0 0\n").unwrap();
        assert_eq!(provider.current_usage_percent().unwrap(), 20.0);

        std::fs::write(file.path(), "cpu  1200 0 200 1600 0 0 0 0\n").unwrap();
        assert_eq!(provider.current_usage_percent().unwrap(), 100.0);
    }

    #[test]
    fn vanished_file_is_a_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        std::fs::write(&path, "cpu 1 1 1 1\n").unwrap();
        let mut provider = ProcStatProvider::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            provider.current_usage_percent(),
            Err(MeterError::Io { .. })
        ));
    }

    #[test]
    fn missing_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ProcStatProvider::from_path(dir.path().join("nope")),
            Err(MeterError::PlatformUnsupported(_))
        ));
    }
}
