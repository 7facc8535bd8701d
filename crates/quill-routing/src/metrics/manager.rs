//! Thread-safe metrics accounting with threshold alerts and persistence.
//!
//! Cost-bearing events schedule a snapshot write on the blocking pool, so the
//! request path never waits on the store. Writes are serialized and each one
//! copies the counters after taking the store, so the stored ledger only
//! moves forward.

use chrono::{DateTime, Utc};
use quill_core::{Error, ExperimentConfig, IgnoreLock as _, MonitoringConfig, Result};
use serde_json::{from_str, to_string};
use sha2::{Digest as _, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::events::{AlertEvent, AlertKind, MetricEvent};
use super::reporter::MetricsReport;
use super::snapshot::{AlertThresholds, MetricsSnapshot, day_key, month_key};
use crate::store::KeyValueStore;

/// Store key holding the serialized snapshot.
pub const METRICS_KEY: &str = "quill.metrics";
/// Prefix of store keys holding A/B assignments.
pub const VARIANT_KEY_PREFIX: &str = "quill.ab.";

/// Collects metric events, raises alerts and persists counters.
pub struct MetricsManager {
    /// Current counters
    state: Arc<Mutex<MetricsSnapshot>>,
    /// Snapshot persistence
    writer: Arc<SnapshotWriter>,
    /// Alert subscribers
    alerts: Sender<AlertEvent>,
    /// Labels sessions are spread across
    variants: Vec<String>,
}

/// Writes snapshots one at a time.
struct SnapshotWriter {
    /// Counters shared with the manager
    state: Arc<Mutex<MetricsSnapshot>>,
    /// Backing store for the snapshot and A/B assignments
    store: Mutex<Arc<dyn KeyValueStore>>,
    /// Set while a scheduled write has not yet copied the counters
    queued: AtomicBool,
}

impl SnapshotWriter {
    /// Copies the current counters and stores them.
    ///
    /// The copy is taken while holding the store, so a later write never
    /// carries older counters than an earlier one.
    fn write(&self) -> Result<()> {
        let store = self.store.lock_ignore_poison();
        self.queued.store(false, Ordering::SeqCst);
        let snapshot = self.state.lock_ignore_poison().clone();
        let json = to_string(&snapshot)
            .map_err(|error| Error::MetricsPersist(format!("serialize failed: {error}")))?;
        store
            .set(METRICS_KEY, &json)
            .map_err(|error| Error::MetricsPersist(error.to_string()))
    }

    /// Writes, logging instead of returning failures.
    fn write_logged(&self) {
        if let Err(error) = self.write() {
            warn!("{error}");
        }
    }
}

impl MetricsManager {
    /// Creates a manager with empty counters.
    pub fn new(
        monitoring: &MonitoringConfig,
        experiments: &ExperimentConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_snapshot(MetricsSnapshot::default(), monitoring, experiments, store)
    }

    /// Creates a manager from the snapshot saved in `store`, if any.
    ///
    /// A missing or unreadable snapshot starts fresh; thresholds always come
    /// from `monitoring`.
    pub fn restore(
        monitoring: &MonitoringConfig,
        experiments: &ExperimentConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let snapshot = match store.get(METRICS_KEY) {
            Ok(Some(json)) => from_str::<MetricsSnapshot>(&json).unwrap_or_else(|error| {
                warn!("Discarding unreadable metrics snapshot: {error}");
                MetricsSnapshot::default()
            }),
            Ok(None) => MetricsSnapshot::default(),
            Err(error) => {
                warn!("Failed to load metrics snapshot: {error}");
                MetricsSnapshot::default()
            }
        };
        debug!(
            "Restored metrics: {} requests, ${:.4} total cost",
            snapshot.requests.total, snapshot.costs.total_usd
        );
        Self::with_snapshot(snapshot, monitoring, experiments, store)
    }

    /// Shared constructor.
    fn with_snapshot(
        mut snapshot: MetricsSnapshot,
        monitoring: &MonitoringConfig,
        experiments: &ExperimentConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        snapshot.thresholds = AlertThresholds::from(monitoring);
        let (alerts, _receiver) = broadcast::channel(monitoring.alert_channel_capacity.max(1));
        let state = Arc::new(Mutex::new(snapshot));
        Self {
            writer: Arc::new(SnapshotWriter {
                state: Arc::clone(&state),
                store: Mutex::new(store),
                queued: AtomicBool::new(false),
            }),
            state,
            alerts,
            variants: experiments.variants.clone(),
        }
    }

    /// Records an event and returns any alerts it triggered.
    pub fn record(&self, event: MetricEvent) -> Vec<AlertEvent> {
        self.record_at(event, Utc::now())
    }

    /// Records an event as if it happened at `now`.
    pub fn record_at(&self, event: MetricEvent, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let cost_bearing =
            matches!(&event, MetricEvent::ProviderSuccess { cost_usd, .. } if *cost_usd > 0.0);

        let fired = {
            let mut state = self.state.lock_ignore_poison();
            state.apply(&event, now);
            evaluate_thresholds(&mut state, &day_key(now))
        };

        self.publish(&fired);
        if cost_bearing {
            self.schedule_write();
        }
        fired
    }

    /// Queues a snapshot write.
    ///
    /// Inside a tokio runtime the write runs on the blocking pool; elsewhere
    /// it runs inline. While a write is queued, further requests fold into it.
    fn schedule_write(&self) {
        if self.writer.queued.swap(true, Ordering::SeqCst) {
            return;
        }
        let writer = Arc::clone(&self.writer);
        let Ok(runtime) = Handle::try_current() else {
            writer.write_logged();
            return;
        };
        drop(runtime.spawn_blocking(move || writer.write_logged()));
    }

    /// Re-evaluates every threshold against the current counters.
    pub fn check_alert_thresholds(&self) -> Vec<AlertEvent> {
        let fired = {
            let mut state = self.state.lock_ignore_poison();
            evaluate_thresholds(&mut state, &day_key(Utc::now()))
        };
        self.publish(&fired);
        fired
    }

    /// Broadcasts alerts; having no subscribers is fine.
    fn publish(&self, fired: &[AlertEvent]) {
        for alert in fired {
            warn!("ALERT [{}] {}", alert.kind, alert.message);
            if self.alerts.send(alert.clone()).is_err() {
                debug!("No alert subscribers");
            }
        }
    }

    /// Subscribes to alerts raised from now on.
    pub fn subscribe(&self) -> Receiver<AlertEvent> {
        self.alerts.subscribe()
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock_ignore_poison().clone()
    }

    /// Human-readable summary of the current counters.
    pub fn summary(&self) -> String {
        let now = Utc::now();
        MetricsReport::format_summary(&self.snapshot(), &day_key(now), &month_key(now))
            .unwrap_or_default()
    }

    /// Writes the current counters to the store on the calling thread.
    ///
    /// # Errors
    /// Returns `Error::MetricsPersist` if the snapshot cannot be written.
    pub fn persist(&self) -> Result<()> {
        self.writer.write()
    }

    /// Persists the counters every `period` until the handle is aborted.
    pub fn spawn_periodic_persist(&self, period: Duration) -> JoinHandle<()> {
        let writer = Arc::clone(&self.writer);
        tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing to save yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let pending = Arc::clone(&writer);
                match spawn_blocking(move || pending.write()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!("{error}"),
                    Err(error) => warn!("Metrics write task failed: {error}"),
                }
            }
        })
    }

    /// Returns the A/B variant for a session, assigning one on first sight.
    ///
    /// Assignment is a stable hash of the session id, stored so it survives
    /// restarts and configuration changes. Variants only affect metrics.
    pub fn assign_variant(&self, session_id: &str) -> String {
        let key = format!("{VARIANT_KEY_PREFIX}{session_id}");

        // Held across lookup and store so a session is assigned and counted once.
        let store = self.writer.store.lock_ignore_poison();
        match store.get(&key) {
            Ok(Some(existing)) => return existing,
            Ok(None) => {}
            Err(error) => warn!("Failed to read variant for {session_id}: {error}"),
        }
        let variant = self.pick_variant(session_id);
        if let Err(error) = store.set(&key, &variant) {
            warn!("Failed to store variant for {session_id}: {error}");
        }
        drop(store);

        *self
            .state
            .lock_ignore_poison()
            .variants
            .entry(variant.clone())
            .or_default() += 1;
        debug!("Assigned session {session_id} to variant {variant}");
        self.schedule_write();
        variant
    }

    /// Deterministic variant for a session id.
    fn pick_variant(&self, session_id: &str) -> String {
        if self.variants.is_empty() {
            return "control".to_owned();
        }
        let digest = Sha256::digest(session_id.as_bytes());
        let mut prefix = [0_u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let index = (u64::from_be_bytes(prefix) % self.variants.len() as u64) as usize;
        self.variants[index].clone()
    }
}

/// Fires each alert once per crossing and re-arms it when the metric recovers.
///
/// The cost alert fires at most once per day.
fn evaluate_thresholds(state: &mut MetricsSnapshot, today: &str) -> Vec<AlertEvent> {
    let thresholds = state.thresholds;
    let mut fired = Vec::new();

    if thresholds.error_rate > 0.0 && state.provider_samples() >= thresholds.min_samples.max(1) {
        let rate = state.error_rate();
        if rate > thresholds.error_rate {
            if !state.alerts.error_rate_raised {
                state.alerts.error_rate_raised = true;
                state.alerts.error_rate_fired += 1;
                fired.push(AlertEvent {
                    kind: AlertKind::ErrorRate,
                    value: rate,
                    threshold: thresholds.error_rate,
                    message: format!(
                        "Provider error rate {:.1}% exceeds {:.1}%",
                        rate * 100.0,
                        thresholds.error_rate * 100.0
                    ),
                });
            }
        } else {
            state.alerts.error_rate_raised = false;
        }
    }

    if thresholds.avg_latency_ms > 0 && state.latency.count > 0 {
        let average = state.avg_latency_ms();
        if average > thresholds.avg_latency_ms {
            if !state.alerts.latency_raised {
                state.alerts.latency_raised = true;
                state.alerts.latency_fired += 1;
                fired.push(AlertEvent {
                    kind: AlertKind::Latency,
                    value: average as f64,
                    threshold: thresholds.avg_latency_ms as f64,
                    message: format!(
                        "Average provider latency {average}ms exceeds {}ms",
                        thresholds.avg_latency_ms
                    ),
                });
            }
        } else {
            state.alerts.latency_raised = false;
        }
    }

    if thresholds.daily_cost_usd > 0.0 {
        let spent = state.costs.for_day(today);
        let already_alerted = state.alerts.cost_alerted_day.as_deref() == Some(today);
        if spent > thresholds.daily_cost_usd && !already_alerted {
            state.alerts.cost_alerted_day = Some(today.to_owned());
            state.alerts.cost_fired += 1;
            fired.push(AlertEvent {
                kind: AlertKind::Cost,
                value: spent,
                threshold: thresholds.daily_cost_usd,
                message: format!(
                    "Cost for {today} is ${spent:.4}, above ${:.4}",
                    thresholds.daily_cost_usd
                ),
            });
        }
    }

    fired
}
