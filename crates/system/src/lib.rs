//! Host CPU sampling: usage providers and the [`Session`] that records them.

pub mod provider;
pub mod session;

pub use provider::{CpuUsageProvider, PlatformProvider, ProcStatProvider, SysinfoProvider};
pub use session::{Session, DEFAULT_INTERVAL_MS};
