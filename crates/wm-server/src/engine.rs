//! Monitor engine
//!
//! Listens on the event bus and turns host events into status cycles:
//! updates of a bound sensor variable, kernel start, manual update requests
//! and ticks of the automatic status update timer. Operator actions on the
//! critical set and the active switch arrive the same way.
//!
//! Timer ticks also drop critical variables whose sensor left the trigger list.

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use wm_core::events::{
    ManualUpdateData, RemoveCriticalVariableData, SetActiveData, TimerElapsedData,
    VariableUpdatedData,
};
use wm_core::{Event, EventKind};
use wm_event_bus::EventBus;
use wm_monitor::Warnmelder;

/// Name carried by TIMER_ELAPSED events of the status update timer
pub const STATUS_UPDATE_TIMER: &str = "StatusUpdate";

/// Drives a [`Warnmelder`] from host events
pub struct MonitorEngine {
    event_bus: Arc<EventBus>,
    monitor: Arc<Warnmelder>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
}

impl MonitorEngine {
    pub fn new(event_bus: Arc<EventBus>, monitor: Arc<Warnmelder>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            event_bus,
            monitor,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start processing events
    ///
    /// The timer follows the configuration: it is rebuilt whenever a cycle
    /// finds a different `AutomaticStatusUpdate` period.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Monitor engine already running");
            return;
        }

        info!("Starting monitor engine");

        let mut event_rx = self.event_bus.subscribe_all();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let event_bus = self.event_bus.clone();
        let monitor = self.monitor.clone();
        let running = self.running.clone();
        let mut period = monitor.config().await.timer.period();

        tokio::spawn(async move {
            let mut timer = period.map(status_timer);

            loop {
                tokio::select! {
                    event_result = event_rx.recv() => {
                        match event_result {
                            Ok(event) => {
                                if !Self::process_event(&event, &monitor).await {
                                    continue;
                                }
                                let configured = monitor.config().await.timer.period();
                                if configured != period {
                                    info!(?configured, "Status update timer changed");
                                    period = configured;
                                    timer = period.map(status_timer);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Monitor engine lagged by {} events", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Event bus closed, stopping monitor engine");
                                break;
                            }
                        }
                    }
                    _ = next_tick(&mut timer) => {
                        trace!("Status update timer elapsed");
                        event_bus.fire_typed(TimerElapsedData {
                            timer: STATUS_UPDATE_TIMER.to_string(),
                        });
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Monitor engine stopped");
        });
    }

    /// Stop the engine
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        info!("Stopping monitor engine");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask for a status cycle through the bus
    pub fn request_update(&self, requested_by: Option<String>) {
        self.event_bus
            .fire_typed(ManualUpdateData { requested_by });
    }

    /// Handle one event, returning whether a status cycle ran
    async fn process_event(event: &Event, monitor: &Warnmelder) -> bool {
        match event.kind {
            EventKind::VariableUpdated => {
                let Some(data) = decode::<VariableUpdatedData>(event) else {
                    return false;
                };
                if !monitor.subscriptions().await.contains(&data.variable_id) {
                    trace!(variable_id = %data.variable_id, "Variable is not monitored");
                    return false;
                }
                debug!(variable_id = %data.variable_id, changed = data.changed, "Monitored variable updated");
            }
            EventKind::KernelStarted | EventKind::ManualUpdate | EventKind::TimerElapsed => {
                debug!(kind = %event.kind, "Status update requested");
            }
            EventKind::ResetCriticalVariables => {
                if let Err(e) = monitor.reset_critical_variables().await {
                    error!(error = %e, "Resetting critical variables failed");
                    return false;
                }
            }
            EventKind::RemoveCriticalVariable => {
                if let Some(data) = decode::<RemoveCriticalVariableData>(event) {
                    if let Err(e) = monitor.remove_critical_variable(data.variable_id).await {
                        error!(variable_id = %data.variable_id, error = %e, "Removing critical variable failed");
                    }
                }
            }
            EventKind::SetActive => {
                if let Some(data) = decode::<SetActiveData>(event) {
                    monitor.set_active(data.active).await;
                }
            }
            EventKind::StatusPublished => {}
        }

        if !event.kind.starts_cycle() {
            return false;
        }

        match monitor.update_status().await {
            Ok(status) => trace!(status, "Status updated"),
            Err(e) => error!(error = %e, "Status update failed"),
        }

        if event.kind == EventKind::TimerElapsed {
            if let Err(e) = monitor.clean_up_critical_variables().await {
                error!(error = %e, "Critical variable cleanup failed");
            }
        }
        true
    }
}

/// Event payload of the expected type, `None` (logged) otherwise
fn decode<T: DeserializeOwned>(event: &Event) -> Option<T> {
    match serde_json::from_value(event.data.clone()) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(kind = %event.kind, error = %e, "Malformed event data");
            None
        }
    }
}

/// Interval whose first tick comes one period from now
fn status_timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
