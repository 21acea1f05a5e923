//! In-process simulation: concurrent callers, an echo worker and a relay
//! consumer wired through one relay router.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::config::Settings;
use crate::core::{relay_stream, MessageRouter, RouterQueues, StatsSnapshot};
use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::worker::{run_worker, EchoWorker};

/// Outcome of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub requests: usize,
    pub answered: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub relay_events: usize,
    pub worker_handled: usize,
    pub elapsed_ms: u128,
    pub stats: StatsSnapshot,
}

pub async fn run_simulation(settings: &Settings) -> Result<SimulationReport> {
    let sim = &settings.simulation;
    let timeout = settings.queues.default_timeout();
    let started = Instant::now();

    let queues = RouterQueues::<String>::bounded(&settings.queues);

    let worker = EchoWorker::new(sim.progress_events)
        .with_delay(Duration::from_millis(sim.worker_delay_ms));
    let worker_task = tokio::spawn(run_worker(queues.outbound_rx, queues.inbound_tx, worker));

    let relay_rx = queues.relay_rx;
    let relay_task = tokio::spawn(async move {
        let mut events = relay_stream(relay_rx);
        let mut count = 0usize;
        while let Some(event) = events.next().await {
            tracing::debug!(id = %event.id(), payload = %event.payload(), "Relay event");
            count += 1;
        }
        count
    });

    let router = Arc::new(MessageRouter::with_relay(
        queues.outbound_tx,
        queues.inbound_rx,
        queues.relay_tx,
    )?);

    tracing::info!(requests = sim.requests, progress = sim.progress_events, "Starting simulation");

    let mut callers = Vec::with_capacity(sim.requests);
    for i in 0..sim.requests {
        let router = Arc::clone(&router);
        let request = Message::request(format!("req-{}", i), format!("payload-{}", i));
        callers.push(tokio::spawn(async move {
            router.send_and_wait(request, timeout).await
        }));
    }

    let (mut answered, mut timed_out, mut failed) = (0, 0, 0);
    for caller in callers {
        match caller.await {
            Ok(Ok(_)) => answered += 1,
            Ok(Err(Error::Timeout { id, .. })) => {
                tracing::warn!(id = %id, "Request timed out");
                timed_out += 1;
            }
            Ok(Err(e)) => {
                tracing::warn!("Request failed: {}", e);
                failed += 1;
            }
            Err(e) => return Err(Error::Other(format!("caller task failed: {}", e))),
        }
    }

    router.shutdown().await;
    let stats = router.stats();
    // Last reference: dropping it closes the outbound queue and stops the worker.
    drop(router);

    let worker_handled = worker_task
        .await
        .map_err(|e| Error::Other(format!("worker task failed: {}", e)))?;
    let relay_events = relay_task
        .await
        .map_err(|e| Error::Other(format!("relay consumer failed: {}", e)))?;

    let report = SimulationReport {
        requests: sim.requests,
        answered,
        timed_out,
        failed,
        relay_events,
        worker_handled,
        elapsed_ms: started.elapsed().as_millis(),
        stats,
    };

    tracing::info!(
        answered = report.answered,
        timed_out = report.timed_out,
        relay_events = report.relay_events,
        "Simulation finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationSettings;

    #[tokio::test]
    async fn test_default_simulation() {
        crate::logging::init_test();

        let report = run_simulation(&Settings::default()).await.unwrap();

        assert_eq!(report.requests, 8);
        assert_eq!(report.answered, 8);
        assert_eq!(report.timed_out, 0);
        assert_eq!(report.relay_events, 16);
        assert_eq!(report.worker_handled, 8);
        assert_eq!(report.stats.relayed, 16);
        assert_eq!(report.stats.resolved, 8);
    }

    #[tokio::test]
    async fn test_slow_worker_times_out() {
        let mut settings = Settings::default();
        settings.queues.default_timeout_ms = 20;
        settings.simulation = SimulationSettings {
            requests: 2,
            progress_events: 0,
            worker_delay_ms: 200,
        };

        let report = run_simulation(&settings).await.unwrap();

        assert_eq!(report.answered, 0);
        assert_eq!(report.timed_out, 2);
        assert_eq!(report.stats.timed_out, 2);
    }
}
