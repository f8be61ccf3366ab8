use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::status::{ComponentReport, Status};

/// Thread-safe component -> report map. Readers (the HTTP handler) take a
/// shared lock; writers (collectors, uploader, skew probe) take it briefly
/// per update, so neither side blocks the other for long.
pub struct HealthAggregator {
    components: RwLock<HashMap<String, ComponentReport>>,
    ever_uploaded: AtomicBool,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub overall: Status,
    pub generated_at: DateTime<Utc>,
    pub components: HashMap<String, ComponentReport>,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self {
            components: RwLock::new(HashMap::new()),
            ever_uploaded: AtomicBool::new(false),
        }
    }

    pub fn update(&self, component: impl Into<String>, report: ComponentReport) {
        self.components.write().insert(component.into(), report);
    }

    pub fn record_upload_success(&self) {
        self.ever_uploaded.store(true, Ordering::Relaxed);
    }

    /// Overall status per the fan-in rule: `uploader` or `storage` in
    /// `error` dominates; otherwise all collectors erroring dominates;
    /// otherwise any degraded component (or a single failing collector)
    /// degrades the whole; otherwise `ok`.
    pub fn report(&self) -> HealthReport {
        let components = self.components.read().clone();

        let uploader_error = components.get("uploader").map(|c| c.status == Status::Error).unwrap_or(false);
        let storage_error = components.get("storage").map(|c| c.status == Status::Error).unwrap_or(false);

        let collectors: Vec<&ComponentReport> = components
            .iter()
            .filter(|(name, _)| name.starts_with("collector."))
            .map(|(_, report)| report)
            .collect();
        let all_collectors_error = !collectors.is_empty() && collectors.iter().all(|c| c.status == Status::Error);
        let any_collector_error = collectors.iter().any(|c| c.status == Status::Error);
        let any_degraded = components.values().any(|c| c.status == Status::Degraded);

        let overall = if uploader_error || storage_error || all_collectors_error {
            Status::Error
        } else if any_degraded || any_collector_error {
            Status::Degraded
        } else {
            Status::Ok
        };

        HealthReport {
            overall,
            generated_at: Utc::now(),
            components,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.report().overall == Status::Ok && self.ever_uploaded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregator_reports_ok() {
        let agg = HealthAggregator::new();
        assert_eq!(agg.report().overall, Status::Ok);
    }

    #[test]
    fn uploader_error_dominates() {
        let agg = HealthAggregator::new();
        agg.update("uploader", ComponentReport::new(Status::Error, "down"));
        agg.update("collector.cpu", ComponentReport::new(Status::Ok, "fine"));
        assert_eq!(agg.report().overall, Status::Error);
    }

    #[test]
    fn single_failing_collector_degrades_not_errors() {
        let agg = HealthAggregator::new();
        agg.update("collector.cpu", ComponentReport::new(Status::Error, "down"));
        agg.update("collector.memory", ComponentReport::new(Status::Ok, "fine"));
        assert_eq!(agg.report().overall, Status::Degraded);
    }

    #[test]
    fn all_collectors_failing_is_error() {
        let agg = HealthAggregator::new();
        agg.update("collector.cpu", ComponentReport::new(Status::Error, "down"));
        agg.update("collector.memory", ComponentReport::new(Status::Error, "down"));
        assert_eq!(agg.report().overall, Status::Error);
    }

    #[test]
    fn readiness_requires_a_prior_successful_upload() {
        let agg = HealthAggregator::new();
        assert!(!agg.is_ready());
        agg.record_upload_success();
        assert!(agg.is_ready());
    }
}
