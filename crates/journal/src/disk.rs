//! Disk-pressure sampling (spec.md §4.1). Real "bytes free on this
//! filesystem" probing is platform-specific and not part of the teacher's
//! dependency stack, so this is expressed as an injectable probe — tests
//! and hosts that care can wire up a real `statvfs`-backed one; the default
//! always reports plenty of space.

use std::sync::Arc;

use crate::types::DiskPressure;

/// Reports bytes available on the journal's filesystem, or `None` if
/// unknown (in which case pressure is always [`DiskPressure::Ok`]).
pub type DiskSpaceProbe = Arc<dyn Fn() -> Option<u64> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct DiskPressureThresholds {
    pub warn_bytes: u64,
    pub critical_bytes: u64,
}

impl Default for DiskPressureThresholds {
    fn default() -> Self {
        Self {
            warn_bytes: 512 * 1024 * 1024,
            critical_bytes: 64 * 1024 * 1024,
        }
    }
}

pub fn unlimited_probe() -> DiskSpaceProbe {
    Arc::new(|| None)
}

pub fn classify(thresholds: &DiskPressureThresholds, available: Option<u64>) -> DiskPressure {
    match available {
        None => DiskPressure::Ok,
        Some(bytes) if bytes < thresholds.critical_bytes => DiskPressure::Critical,
        Some(bytes) if bytes < thresholds.warn_bytes => DiskPressure::Warning,
        Some(_) => DiskPressure::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_thresholds() {
        let t = DiskPressureThresholds::default();
        assert_eq!(classify(&t, None), DiskPressure::Ok);
        assert_eq!(classify(&t, Some(1024)), DiskPressure::Critical);
        assert_eq!(classify(&t, Some(100 * 1024 * 1024)), DiskPressure::Warning);
        assert_eq!(classify(&t, Some(10 * 1024 * 1024 * 1024)), DiskPressure::Ok);
    }
}
