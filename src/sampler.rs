//! Host resource sampler
//!
//! Samples CPU/memory/disk utilization on a fixed interval and compares each
//! metric against warning/critical thresholds. Zone transitions are
//! edge-triggered: one alert per zone entry, never one per sample, so a
//! sustained condition cannot flood the dispatcher. Returning to the normal
//! zone clears the memory so a future re-entry fires again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use sysinfo::{Disks, System};
use tracing::debug;

use crate::clock::Clock;
use crate::config::ResourcesConfig;
use crate::domain::{AlertEvent, Metric, ResourceSample, Zone};

pub struct ResourceSampler {
    thresholds: ResourcesConfig,
    history_size: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<SamplerInner>,
}

struct SamplerInner {
    sys: System,
    disks: Disks,
    /// Zone each metric currently sits in; the edge-trigger memory
    zones: HashMap<Metric, Zone>,
    /// Bounded ring of recent samples for short-term trend display
    history: VecDeque<ResourceSample>,
    latest: Option<ResourceSample>,
}

impl ResourceSampler {
    pub fn new(thresholds: ResourcesConfig, history_size: usize, clock: Arc<dyn Clock>) -> Self {
        // CPU usage is a delta between two refreshes; prime the counters
        // here so the first interval sample reads real load
        let mut sys = System::new();
        sys.refresh_cpu();

        Self {
            thresholds,
            history_size,
            clock,
            inner: Mutex::new(SamplerInner {
                sys,
                disks: Disks::new_with_refreshed_list(),
                zones: HashMap::new(),
                history: VecDeque::with_capacity(history_size),
                latest: None,
            }),
        }
    }

    /// Collect a fresh sample from the host and evaluate thresholds
    pub fn tick(&self) -> Vec<AlertEvent> {
        let sample = self.collect();
        self.observe(sample)
    }

    /// Evaluate one sample against the thresholds. Split out from [`tick`]
    /// so tests can feed synthetic value sequences.
    pub fn observe(&self, sample: ResourceSample) -> Vec<AlertEvent> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut events = Vec::new();

        for (metric, value, threshold) in [
            (Metric::Cpu, sample.cpu_percent, self.thresholds.cpu),
            (Metric::Memory, sample.memory_percent, self.thresholds.memory),
            (Metric::Disk, sample.disk_percent, self.thresholds.disk),
        ] {
            let new_zone = threshold.zone(value);
            let prev_zone = inner.zones.get(&metric).copied().unwrap_or(Zone::Normal);

            // Edge-trigger: fire only on upward zone transitions
            if new_zone > prev_zone {
                if let Some(severity) = new_zone.severity() {
                    let limit = match new_zone {
                        Zone::Critical => threshold.critical,
                        _ => threshold.warning,
                    };
                    events.push(AlertEvent::new(
                        severity,
                        "system",
                        &format!("{metric}-{new_zone}"),
                        format!("{metric} at {value:.1}% (threshold {limit:.1}%)"),
                        sample.timestamp,
                    ));
                }
            } else if new_zone < prev_zone {
                debug!("{} left the {} zone ({:.1}%)", metric, prev_zone, value);
            }
            inner.zones.insert(metric, new_zone);
        }

        if inner.history.len() >= self.history_size {
            inner.history.pop_front();
        }
        inner.history.push_back(sample);
        inner.latest = Some(sample);

        events
    }

    fn collect(&self) -> ResourceSample {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        inner.sys.refresh_cpu();
        inner.sys.refresh_memory();
        inner.disks.refresh();

        let cpu_percent = f64::from(inner.sys.global_cpu_info().cpu_usage());
        let memory_percent = if inner.sys.total_memory() > 0 {
            inner.sys.used_memory() as f64 / inner.sys.total_memory() as f64 * 100.0
        } else {
            0.0
        };
        // Worst disk governs the zone
        let disk_percent = inner
            .disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space() - d.available_space();
                used as f64 / d.total_space() as f64 * 100.0
            })
            .fold(0.0, f64::max);

        ResourceSample {
            cpu_percent,
            memory_percent,
            disk_percent,
            timestamp: self.clock.now(),
        }
    }

    /// Most recent sample, if one has been taken
    pub fn latest(&self) -> Option<ResourceSample> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).latest
    }

    /// Recent samples, oldest first
    pub fn history(&self) -> Vec<ResourceSample> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .history
            .iter()
            .copied()
            .collect()
    }

    /// Metrics currently sitting in a non-normal zone
    pub fn active_zones(&self) -> Vec<(Metric, Zone)> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .zones
            .iter()
            .filter(|(_, z)| **z != Zone::Normal)
            .map(|(m, z)| (*m, *z))
            .collect()
    }
}
