//! Processing statistics tracking.
//!
//! Thread-safe counters for fetch errors, discovery warnings and
//! informational events of one archival run.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::{ErrorType, InfoType, WarningType};

/// Thread-safe processing statistics tracker.
///
/// Every counter is created at zero in `new()`, so lookups never miss for a
/// properly constructed tracker. Shared between the owning task and the fetch
/// workers through `Arc`.
#[derive(Debug)]
pub struct ProcessingStats {
    errors: HashMap<ErrorType, AtomicUsize>,
    warnings: HashMap<WarningType, AtomicUsize>,
    info: HashMap<InfoType, AtomicUsize>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        ProcessingStats {
            errors: zeroed(),
            warnings: zeroed(),
            info: zeroed(),
        }
    }

    pub fn increment_error(&self, error: ErrorType) {
        bump(&self.errors, error);
    }

    pub fn increment_warning(&self, warning: WarningType) {
        bump(&self.warnings, warning);
    }

    pub fn increment_info(&self, info_type: InfoType) {
        bump(&self.info, info_type);
    }

    pub fn get_error_count(&self, error: ErrorType) -> usize {
        read(&self.errors, error)
    }

    pub fn get_warning_count(&self, warning: WarningType) -> usize {
        read(&self.warnings, warning)
    }

    pub fn get_info_count(&self, info_type: InfoType) -> usize {
        read(&self.info, info_type)
    }

    pub fn total_errors(&self) -> usize {
        sum(&self.errors)
    }

    pub fn total_warnings(&self) -> usize {
        sum(&self.warnings)
    }

    pub fn total_info(&self) -> usize {
        sum(&self.info)
    }

    /// Logs every non-zero counter: failures and warnings at info, the
    /// rest at debug.
    pub fn log_summary(&self) {
        let failures = ErrorType::iter()
            .map(|e| (e.to_string(), self.get_error_count(e)))
            .chain(WarningType::iter().map(|w| (w.to_string(), self.get_warning_count(w))));
        for (label, count) in failures.filter(|(_, count)| *count > 0) {
            log::info!("   {label}: {count}");
        }
        for info_type in InfoType::iter() {
            let count = self.get_info_count(info_type);
            if count > 0 {
                log::debug!("   {info_type}: {count}");
            }
        }
    }
}

fn zeroed<K: IntoEnumIterator + Eq + Hash>() -> HashMap<K, AtomicUsize> {
    K::iter().map(|key| (key, AtomicUsize::new(0))).collect()
}

fn bump<K: Eq + Hash + Debug>(counters: &HashMap<K, AtomicUsize>, key: K) {
    match counters.get(&key) {
        Some(counter) => {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        None => log::error!("Counter for {key:?} missing from stats map"),
    }
}

fn read<K: Eq + Hash>(counters: &HashMap<K, AtomicUsize>, key: K) -> usize {
    counters
        .get(&key)
        .map_or(0, |counter| counter.load(Ordering::SeqCst))
}

fn sum<K>(counters: &HashMap<K, AtomicUsize>) -> usize {
    counters.values().map(|c| c.load(Ordering::SeqCst)).sum()
}
