use crate::analysis::{AnalysisError, AnalysisResult, AnalysisService};
use crate::capture::CapturedImage;
use crate::config::Config;
use crate::sensors::{ConnectTicket, SensorEngine, SensorStatus, SimulationScenario, Toggle};
use crate::workflow::{AppState, Workflow, WorkflowError};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the presentation layer reads.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub hr_status: SensorStatus,
    pub gsr_status: SensorStatus,
    pub heart_rate: Option<f64>,
    pub gsr: Option<f64>,
    pub scenario: SimulationScenario,
    pub connected_at: Option<DateTime<Utc>>,
    pub app: AppState,
    pub image_preview: Option<String>,
}

struct Inner {
    sensors: SensorEngine,
    workflow: Workflow,
    rng: StdRng,
    pending_connect: Option<CancellationToken>,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        let reading = self.sensors.reading();
        Snapshot {
            hr_status: self.sensors.hr_status(),
            gsr_status: self.sensors.gsr_status(),
            heart_rate: reading.map(|r| r.heart_rate),
            gsr: reading.map(|r| r.gsr),
            scenario: self.sensors.scenario(),
            connected_at: self.sensors.connected_at(),
            app: self.workflow.state().clone(),
            image_preview: self.workflow.image_preview().map(str::to_string),
        }
    }
}

/// Sole owner of the sensor and workflow state.
///
/// Cloning yields another handle to the same session. All mutation goes
/// through the methods below, each of which publishes a fresh [`Snapshot`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    analysis: Arc<dyn AnalysisService>,
    connect_latency: Duration,
    updates: Arc<watch::Sender<Snapshot>>,
}

/// An analysis running in the background. Dropping it does not cancel it.
pub struct PendingAnalysis {
    snapshot: Snapshot,
    handle: JoinHandle<()>,
}

impl PendingAnalysis {
    /// The state as of submission, before any outcome is applied.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub async fn wait(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

impl Session {
    pub fn new(analysis: Arc<dyn AnalysisService>, config: &Config) -> Self {
        let rng = match config.simulation_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(analysis, config.connect_latency, config.default_scenario, rng)
    }

    pub fn with_rng(
        analysis: Arc<dyn AnalysisService>,
        connect_latency: Duration,
        scenario: SimulationScenario,
        rng: StdRng,
    ) -> Self {
        let inner = Inner {
            sensors: SensorEngine::new(scenario),
            workflow: Workflow::default(),
            rng,
            pending_connect: None,
        };
        let (updates, _) = watch::channel(inner.snapshot());

        Self {
            inner: Arc::new(Mutex::new(inner)),
            analysis,
            connect_latency,
            updates: Arc::new(updates),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) -> Snapshot {
        let snapshot = inner.snapshot();
        self.updates.send_replace(snapshot.clone());
        snapshot
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    pub fn select_scenario(&self, scenario: SimulationScenario) -> Snapshot {
        let mut inner = self.lock();
        inner.sensors.select_scenario(scenario);
        debug!(%scenario, "simulation scenario selected");
        self.publish(&inner)
    }

    /// Disconnects connected sensors, otherwise (re)starts a connection that
    /// completes after the configured latency. A connection already pending
    /// is cancelled and replaced.
    pub fn toggle_connect(&self) -> Snapshot {
        let mut inner = self.lock();
        if let Some(token) = inner.pending_connect.take() {
            token.cancel();
        }

        match inner.sensors.toggle_connect() {
            Toggle::Disconnected => info!("sensors disconnected"),
            Toggle::Connecting(ticket) => {
                let token = CancellationToken::new();
                inner.pending_connect = Some(token.clone());
                debug!(
                    scenario = %ticket.scenario,
                    generation = ticket.generation,
                    latency_ms = self.connect_latency.as_millis() as u64,
                    "sensor connection scheduled"
                );
                self.spawn_connect(ticket, token);
            }
        }

        self.publish(&inner)
    }

    fn spawn_connect(&self, ticket: ConnectTicket, token: CancellationToken) {
        let session = self.clone();
        let latency = self.connect_latency;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(generation = ticket.generation, "pending sensor connection cancelled");
                }
                _ = sleep(latency) => session.complete_connect(ticket),
            }
        });
    }

    fn complete_connect(&self, ticket: ConnectTicket) {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.sensors.complete_connect(ticket, &mut inner.rng) {
            Some(reading) => {
                inner.pending_connect = None;
                info!(
                    scenario = %ticket.scenario,
                    heart_rate = reading.heart_rate,
                    gsr = reading.gsr,
                    "sensors connected"
                );
                self.publish(inner);
            }
            None => debug!(generation = ticket.generation, "stale sensor connection ignored"),
        }
    }

    /// Enters Loading and starts the analysis with the current readings.
    pub fn submit(&self, image: CapturedImage) -> Result<PendingAnalysis, WorkflowError> {
        let (request, snapshot) = {
            let mut inner = self.lock();
            let reading = inner.sensors.reading();
            let request = inner.workflow.submit(&image, reading).map_err(|e| {
                warn!(error = %e, "image submission rejected");
                e
            })?;
            (request, self.publish(&inner))
        };

        let session = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = session.analysis.analyze(&request).await;
            session.finish_analysis(outcome);
        });

        Ok(PendingAnalysis { snapshot, handle })
    }

    fn finish_analysis(&self, outcome: Result<AnalysisResult, AnalysisError>) {
        let mut inner = self.lock();
        let succeeded = outcome.is_ok();
        if inner.workflow.finish(outcome) {
            if succeeded {
                info!("image analysis completed");
            }
            self.publish(&inner);
        }
    }

    /// Returns to Idle from Result or Error. From Idle or Loading nothing
    /// changes and nothing is published.
    pub fn reset(&self) -> Snapshot {
        let mut inner = self.lock();
        if !inner.workflow.reset() {
            return inner.snapshot();
        }
        debug!("workflow reset");
        self.publish(&inner)
    }
}
