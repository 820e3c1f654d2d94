//! Backend scheduler.
//!
//! # Responsibilities
//! - Keep the last discovered endpoint set of every service seen
//! - Hand out endpoints one at a time from a per-service selection queue
//! - Refresh all known services in the background
//!
//! # Concurrency
//! One mutex guards both maps. Selection (length check, optional refill,
//! pop) runs inside a single critical section. Discovery calls happen
//! outside the lock; only the final map insert takes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::discovery::{DiscoveryError, DiscoveryProvider};
use crate::observability::metrics;
use crate::scheduler::endpoint::Endpoint;
use crate::scheduler::queue::SelectionQueue;

/// Errors returned by endpoint selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Discovery has never produced an endpoint for the service.
    #[error("no backend available for service '{0}'")]
    NoBackend(String),
}

#[derive(Debug, Default)]
struct ServiceTable {
    /// Most recent complete discovery result per service.
    endpoints: HashMap<String, Arc<[Endpoint]>>,
    /// Drainable working copy per service.
    queues: HashMap<String, SelectionQueue>,
}

/// Schedules discovered backends per service.
pub struct Scheduler {
    discovery: Arc<dyn DiscoveryProvider>,
    lookup_timeout: Duration,
    table: Mutex<ServiceTable>,
}

impl Scheduler {
    /// Create a scheduler; every discovery call is bounded by `lookup_timeout`.
    pub fn new(discovery: Arc<dyn DiscoveryProvider>, lookup_timeout: Duration) -> Self {
        Self {
            discovery,
            lookup_timeout,
            table: Mutex::new(ServiceTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, ServiceTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next endpoint for `service`.
    ///
    /// Services never discovered successfully are looked up first. The
    /// selection queue is refilled from the full set only once drained.
    pub async fn next_backend(&self, service: &str) -> Result<Endpoint, SchedulerError> {
        let discovered = self.table().endpoints.contains_key(service);
        if !discovered {
            if let Err(e) = self.lookup(service).await {
                tracing::warn!(service = %service, error = %e, "On-demand discovery failed");
            }
        }

        self.select(service)
            .ok_or_else(|| SchedulerError::NoBackend(service.to_string()))
    }

    fn select(&self, service: &str) -> Option<Endpoint> {
        let mut table = self.table();
        let ServiceTable { endpoints, queues } = &mut *table;

        let full = endpoints.get(service)?;
        let queue = queues.entry(service.to_string()).or_default();
        if queue.is_empty() {
            queue.refill(full);
            tracing::trace!(service = %service, size = queue.len(), "Selection queue refilled");
        }
        queue.pop()
    }

    /// Query discovery for `service` and replace its full set.
    ///
    /// On failure the previous set is kept. Queues already filled keep
    /// draining their old contents.
    pub async fn lookup(&self, service: &str) -> Result<usize, DiscoveryError> {
        let result = match time::timeout(self.lookup_timeout, self.discovery.endpoints(service)).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout(self.lookup_timeout)),
        };
        metrics::record_discovery(service, result.is_ok());

        let endpoints = result?;
        let count = endpoints.len();
        self.table()
            .endpoints
            .insert(service.to_string(), endpoints.into());

        tracing::debug!(service = %service, endpoints = count, "Service endpoints updated");
        Ok(count)
    }

    /// Services with a discovered endpoint set, sorted.
    pub fn known_services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.table().endpoints.keys().cloned().collect();
        services.sort();
        services
    }

    /// Current full set of `service`, if discovered.
    pub fn endpoints(&self, service: &str) -> Option<Vec<Endpoint>> {
        self.table().endpoints.get(service).map(|e| e.to_vec())
    }

    /// Endpoints left in the selection queue of `service`.
    pub fn queued(&self, service: &str) -> usize {
        self.table().queues.get(service).map_or(0, SelectionQueue::len)
    }

    /// Spawn the refresh loop on the runtime.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run_refresh(interval, shutdown).await })
    }

    /// Re-discover every known service each `interval` until shutdown.
    ///
    /// Each service is refreshed in its own task so a slow or failing
    /// source for one service never delays the others. A service whose
    /// previous lookup is still running is skipped for that tick, so an
    /// older result can never overwrite a newer one.
    pub async fn run_refresh(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?interval, "Discovery refresh loop starting");

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: JoinSet<(String, Result<usize, DiscoveryError>)> = JoinSet::new();
        let mut running: HashMap<String, AbortHandle> = HashMap::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    running.retain(|_, handle| !handle.is_finished());
                    for service in self.known_services() {
                        if running.contains_key(&service) {
                            tracing::debug!(service = %service, "Previous refresh still running, skipping");
                            continue;
                        }
                        let scheduler = Arc::clone(&self);
                        let key = service.clone();
                        let handle = in_flight.spawn(async move {
                            let result = scheduler.lookup(&service).await;
                            (service, result)
                        });
                        running.insert(key, handle);
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Ok((service, Ok(count))) => {
                            tracing::trace!(service = %service, endpoints = count, "Discovery refreshed");
                        }
                        Ok((service, Err(e))) => {
                            tracing::warn!(
                                service = %service,
                                error = %e,
                                "Discovery refresh failed, keeping previous endpoints"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Discovery refresh task aborted");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Discovery refresh loop received shutdown signal, exiting");
                    break;
                }
            }
        }

        in_flight.shutdown().await;
    }
}
