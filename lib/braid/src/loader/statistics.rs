use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct LoaderStatistics {
    load_count: AtomicU64,
    batch_invoke_count: AtomicU64,
    batch_load_count: AtomicU64,
    load_error_count: AtomicU64,
}

impl LoaderStatistics {
    pub fn record_load(&self) {
        self.load_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, size: usize) {
        self.batch_invoke_count.fetch_add(1, Ordering::Relaxed);
        self.batch_load_count
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.load_error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            load_count: self.load_count.load(Ordering::Relaxed),
            batch_invoke_count: self.batch_invoke_count.load(Ordering::Relaxed),
            batch_load_count: self.batch_load_count.load(Ordering::Relaxed),
            load_error_count: self.load_error_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub load_count: u64,
    pub batch_invoke_count: u64,
    pub batch_load_count: u64,
    pub load_error_count: u64,
}

impl Add for StatisticsSnapshot {
    type Output = StatisticsSnapshot;

    fn add(self, other: StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            load_count: self.load_count + other.load_count,
            batch_invoke_count: self.batch_invoke_count + other.batch_invoke_count,
            batch_load_count: self.batch_load_count + other.batch_load_count,
            load_error_count: self.load_error_count + other.load_error_count,
        }
    }
}
