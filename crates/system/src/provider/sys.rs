use super::CpuUsageProvider;
use meter_core::{MeterError, Result};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Cross-platform backend built on `sysinfo`'s global CPU usage.
///
/// The first reading after construction covers the time since `new`, so the
/// loop's immediate first tick may report a low value on some platforms.
#[derive(Debug)]
pub struct SysinfoProvider {
    sys: System,
}

impl SysinfoProvider {
    pub fn new() -> Result<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(MeterError::PlatformUnsupported(format!(
                "sysinfo has no CPU backend for {}",
                std::env::consts::OS
            )));
        }

        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        sys.refresh_cpu_usage();

        if sys.cpus().is_empty() {
            return Err(MeterError::PlatformUnsupported(
                "sysinfo reported no CPUs on this host".into(),
            ));
        }

        Ok(Self { sys })
    }
}

impl CpuUsageProvider for SysinfoProvider {
    fn current_usage_percent(&mut self) -> Result<f32> {
        self.sys.refresh_cpu_usage();
        Ok(self.sys.global_cpu_usage())
    }

    fn name(&self) -> &'static str {
        "sysinfo"
    }
}
