use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which CPU-usage backend a session should bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Prefer `/proc/stat` on Linux, fall back to `sysinfo` elsewhere.
    #[default]
    Auto,
    Sysinfo,
    ProcStat,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Sysinfo => "sysinfo",
            Self::ProcStat => "proc-stat",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sysinfo" => Ok(Self::Sysinfo),
            "proc-stat" | "procstat" => Ok(Self::ProcStat),
            other => Err(format!(
                "unknown provider '{other}' (expected auto, sysinfo or proc-stat)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("auto".parse::<ProviderKind>(), Ok(ProviderKind::Auto));
        assert_eq!("SysInfo".parse::<ProviderKind>(), Ok(ProviderKind::Sysinfo));
        assert_eq!("procstat".parse::<ProviderKind>(), Ok(ProviderKind::ProcStat));
        assert!("wmi".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in [ProviderKind::Auto, ProviderKind::Sysinfo, ProviderKind::ProcStat] {
            assert_eq!(kind.to_string().parse::<ProviderKind>(), Ok(kind));
        }
    }
}
