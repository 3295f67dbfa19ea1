//! Worker-side event loop
//!
//! A worker connects to the coordinator, handshakes with READY, then serves
//! the coordinator's messages until SHUTDOWN or hangup: INIT stores the
//! entity assignment, STEP advances every assigned entity through the
//! pluggable propagator, SYNC_REQUEST reports current states.

use std::path::Path;

use eyre::{Context, Result};
use simwire::{AssignPayload, Envelope, FrameStream, Kind, StateRecord, StatesPayload, StepPayload, WireError};
use tracing::{debug, info, warn};

/// Seam to the external physics
///
/// Each worker process advances its assigned entities by `dt` using whatever
/// propagator it was built with; the coordination layer only cares that the
/// state vector comes back serializable.
pub trait Propagator: Send {
    fn advance(&mut self, entity_id: u64, dt: f64, state: &mut StateRecord);
}

/// One simulation worker bound to a coordinator connection
pub struct Worker {
    stream: FrameStream,
    entity_ids: Vec<u64>,
    states: Vec<StateRecord>,
    propagator: Box<dyn Propagator>,
}

impl Worker {
    /// Connect to the coordinator at `path` and send the READY handshake
    pub async fn connect(path: impl AsRef<Path>, propagator: Box<dyn Propagator>) -> Result<Self> {
        let path = path.as_ref();
        let mut stream = FrameStream::connect(path)
            .await
            .with_context(|| format!("Failed to reach coordinator at {}", path.display()))?;
        stream
            .send_message(&Envelope::new(Kind::Ready, "{}", 0.0))
            .await
            .context("Failed to send handshake")?;
        info!(path = %path.display(), "Worker connected");
        Ok(Self {
            stream,
            entity_ids: Vec::new(),
            states: Vec::new(),
            propagator,
        })
    }

    /// Entity ids currently assigned to this worker
    pub fn entity_ids(&self) -> &[u64] {
        &self.entity_ids
    }

    /// Serve coordinator messages until SHUTDOWN or hangup
    pub async fn run(mut self) -> Result<()> {
        loop {
            let msg = match self.stream.recv_message().await {
                Ok(msg) => msg,
                Err(WireError::ConnectionClosed) => {
                    info!("Coordinator hung up, exiting");
                    break;
                }
                Err(e) => return Err(e).context("Worker event loop receive failed"),
            };

            match msg.kind {
                Kind::Init => self.handle_init(&msg).await?,
                Kind::Step => self.handle_step(&msg).await?,
                Kind::SyncRequest => self.handle_sync_request(&msg).await?,
                Kind::Shutdown => {
                    info!("Received shutdown");
                    break;
                }
                other => warn!(kind = ?other, "Ignoring unexpected message"),
            }
        }
        Ok(())
    }

    /// Store the assignment, create state records, acknowledge with READY
    async fn handle_init(&mut self, msg: &Envelope) -> Result<()> {
        let assignment: AssignPayload = msg.parse_payload();
        self.entity_ids = assignment.entity_ids;
        self.states = self
            .entity_ids
            .iter()
            .map(|&entity_id| StateRecord {
                entity_id,
                time: msg.timestamp,
                ..Default::default()
            })
            .collect();
        info!(worker = assignment.worker_id, entities = self.entity_ids.len(), "Initialized assignment");

        self.stream
            .send_message(&Envelope::new(Kind::Ready, "{}", msg.timestamp))
            .await
            .context("Failed to acknowledge assignment")?;
        Ok(())
    }

    /// Advance every assigned entity by dt, then report STEP_COMPLETE
    async fn handle_step(&mut self, msg: &Envelope) -> Result<()> {
        let step: StepPayload = msg.parse_payload();
        debug!(dt = step.dt, time = step.time, "Stepping entities");

        for state in &mut self.states {
            self.propagator.advance(state.entity_id, step.dt, state);
            state.time += step.dt;
        }

        self.stream
            .send_message(&Envelope::new(Kind::StepComplete, "{}", msg.timestamp + step.dt))
            .await
            .context("Failed to report step completion")?;
        Ok(())
    }

    /// Report current per-entity states
    async fn handle_sync_request(&mut self, msg: &Envelope) -> Result<()> {
        let payload = StatesPayload {
            states: self.states.clone(),
        };
        let envelope = Envelope::with_payload(Kind::SyncResponse, &payload, msg.timestamp)
            .context("Failed to encode state report")?;
        self.stream
            .send_message(&envelope)
            .await
            .context("Failed to send state report")?;
        Ok(())
    }
}
