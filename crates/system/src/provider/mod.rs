//! CPU-usage providers.
//!
//! A provider answers one question, "how busy is the host right now?", and is
//! bound to a session at construction time. [`PlatformProvider`] is the tagged
//! set of backends shipped with cpumeter; tests and embedders can plug in any
//! other [`CpuUsageProvider`].

pub mod proc_stat;
pub mod sys;

pub use proc_stat::ProcStatProvider;
pub use sys::SysinfoProvider;

use meter_core::{ProviderKind, Result};
use std::path::Path;
use tracing::debug;

/// Source of instantaneous host-wide CPU usage.
pub trait CpuUsageProvider: Send + 'static {
    /// Current CPU usage in percent (0.0 – 100.0).
    ///
    /// Called once per tick from the sampling loop. Must not block for long;
    /// there is no timeout around it.
    fn current_usage_percent(&mut self) -> Result<f32>;

    /// Short backend name used in log output.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Backends available on the current host, selected once by [`detect`].
///
/// [`detect`]: PlatformProvider::detect
#[derive(Debug)]
pub enum PlatformProvider {
    Sysinfo(SysinfoProvider),
    ProcStat(ProcStatProvider),
}

impl PlatformProvider {
    /// Bind to the backend named by `kind`.
    ///
    /// Fails with [`MeterError::PlatformUnsupported`] when that backend (or,
    /// for [`ProviderKind::Auto`], every backend) is unavailable here.
    ///
    /// [`MeterError::PlatformUnsupported`]: meter_core::MeterError::PlatformUnsupported
    pub fn detect(kind: ProviderKind) -> Result<Self> {
        Self::detect_with(kind, Path::new(ProcStatProvider::PROC_STAT_PATH))
    }

    /// Like [`detect`](Self::detect) but reads kernel counters from `proc_stat`.
    pub fn detect_with(kind: ProviderKind, proc_stat: &Path) -> Result<Self> {
        match kind {
            ProviderKind::Sysinfo => SysinfoProvider::new().map(Self::Sysinfo),
            ProviderKind::ProcStat => ProcStatProvider::from_path(proc_stat).map(Self::ProcStat),
            ProviderKind::Auto => {
                if cfg!(target_os = "linux") {
                    match ProcStatProvider::from_path(proc_stat) {
                        Ok(p) => return Ok(Self::ProcStat(p)),
                        Err(e) => debug!("proc-stat backend unavailable ({e}); trying sysinfo"),
                    }
                }
                SysinfoProvider::new().map(Self::Sysinfo)
            }
        }
    }
}

impl CpuUsageProvider for PlatformProvider {
    fn current_usage_percent(&mut self) -> Result<f32> {
        match self {
            Self::Sysinfo(p) => p.current_usage_percent(),
            Self::ProcStat(p) => p.current_usage_percent(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sysinfo(p) => p.name(),
            Self::ProcStat(p) => p.name(),
        }
    }
}
