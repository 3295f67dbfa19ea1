//! Main coordinator implementation

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use futures::future::join_all;
use simwire::{AssignPayload, Envelope, FrameListener, FrameStream, Kind, StateRecord, StatesPayload, StepPayload};
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::tracker::StepTracker;

/// One-time declaration of which entities a worker propagates
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAssignment {
    pub worker_id: usize,
    pub entity_ids: Vec<u64>,
}

impl WorkerAssignment {
    /// Partition `entities` entity ids round-robin across `workers` slots
    pub fn round_robin(entities: u64, workers: usize) -> Vec<Self> {
        let mut assignments: Vec<Self> = (0..workers)
            .map(|worker_id| Self {
                worker_id,
                entity_ids: Vec::new(),
            })
            .collect();
        if workers == 0 {
            return assignments;
        }
        for entity_id in 0..entities {
            assignments[(entity_id as usize) % workers].entity_ids.push(entity_id);
        }
        assignments
    }
}

/// A coordinator-held connection to one worker
///
/// Slots live in a dense array and are never removed or reused for the
/// lifetime of a run: a disconnected worker's slot is closed in place so
/// every other slot keeps its index. This lets the coordinator address
/// workers by plain integer without an id-to-slot map.
#[derive(Debug)]
struct WorkerSlot {
    stream: Option<FrameStream>,
}

impl WorkerSlot {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Drives the run lifecycle: accept, assign, step, gather, shutdown
///
/// Owns the listening endpoint and every worker slot. All state is touched
/// only by the task driving the coordinator, so no locking is involved.
/// Dropping the coordinator closes every connection and removes the socket
/// path; call [`Coordinator::shutdown`] first to also notify workers.
#[derive(Debug)]
pub struct Coordinator {
    listener: FrameListener,
    slots: Vec<WorkerSlot>,
    tracker: Option<StepTracker>,
    config: CoordinatorConfig,
    current_time: f64,
}

impl Coordinator {
    /// Bind the listening endpoint; fatal startup errors are returned
    pub fn bind(path: impl Into<PathBuf>, config: CoordinatorConfig) -> Result<Self> {
        let path = path.into();
        let listener = FrameListener::bind(&path)
            .with_context(|| format!("Failed to create coordinator listener at {}", path.display()))?;
        info!(path = %path.display(), "Coordinator listening");
        Ok(Self {
            listener,
            slots: Vec::new(),
            tracker: None,
            config,
            current_time: 0.0,
        })
    }

    /// The coordinator's simulation clock, advanced only inside [`step`]
    ///
    /// [`step`]: Coordinator::step
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Number of worker slots, including closed ones (indices stay stable)
    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots with a live connection
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_connected()).count()
    }

    /// Per-step tally, available once [`start`] has sized it
    ///
    /// [`start`]: Coordinator::start
    pub fn tracker(&self) -> Option<&StepTracker> {
        self.tracker.as_ref()
    }

    /// Block until `expected` workers have connected and handshaken
    ///
    /// A connection counts only if it sends READY within the handshake
    /// window; anything else is closed, discarded, and retried. The
    /// acceptance phase is inherently sequential.
    pub async fn start(&mut self, expected: usize) {
        info!(expected, "Waiting for workers");
        while self.worker_count() < expected {
            if !self.accept_new_worker(self.config.accept_timeout()).await {
                // Timeout or failed handshake; keep waiting
                continue;
            }
        }
        self.tracker = Some(StepTracker::new(expected));
        info!(expected, "All workers connected");
    }

    /// Accept one pending connection and wait for its READY handshake
    ///
    /// Both the accept and the handshake wait are genuinely bounded.
    /// Returns whether a new slot was appended.
    pub async fn accept_new_worker(&mut self, timeout: Duration) -> bool {
        let Some(mut stream) = self.listener.accept_timeout(timeout).await else {
            return false;
        };

        match stream.recv_message_timeout(self.config.handshake_timeout()).await {
            Some(msg) if msg.kind == Kind::Ready => {
                info!(worker = self.slots.len(), "Worker connected");
                self.slots.push(WorkerSlot { stream: Some(stream) });
                true
            }
            other => {
                warn!(kind = ?other.map(|msg| msg.kind), "Connection did not send READY, dropping");
                false
            }
        }
    }

    /// Push entity assignments to the addressed slots
    ///
    /// Out-of-range worker ids are skipped and logged. Afterwards each
    /// connected slot gets a bounded wait for a READY acknowledgment, in
    /// index order; a missing or wrong ack is logged but never aborts the
    /// call - partial acknowledgment is tolerated.
    pub async fn assign_entities(&mut self, assignments: &[WorkerAssignment]) {
        for assignment in assignments {
            let worker_id = assignment.worker_id;
            if worker_id >= self.slots.len() {
                warn!(worker = worker_id, "Assignment addresses an unknown worker slot, skipping");
                continue;
            }

            let payload = AssignPayload {
                worker_id,
                entity_ids: assignment.entity_ids.clone(),
            };
            let envelope = match Envelope::with_payload(Kind::Init, &payload, self.current_time) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(worker = worker_id, error = %e, "Failed to encode assignment");
                    continue;
                }
            };

            match self.slots[worker_id].stream.as_mut() {
                Some(stream) => {
                    if let Err(e) = stream.send_message(&envelope).await {
                        warn!(worker = worker_id, error = %e, "Failed to send assignment");
                    }
                }
                None => warn!(worker = worker_id, "Assignment addresses a closed slot, skipping"),
            }
        }

        // Acknowledgments, per connected slot in index order
        let timeout = self.config.handshake_timeout();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Some(stream) = slot.stream.as_mut() else {
                continue;
            };
            match stream.recv_message_timeout(timeout).await {
                Some(msg) if msg.kind == Kind::Ready => {
                    debug!(worker = idx, "Assignment acknowledged");
                }
                _ => warn!(worker = idx, "Worker did not acknowledge assignment"),
            }
        }

        info!(count = assignments.len(), "Entity assignments sent");
    }

    /// Drive one lockstep round: broadcast STEP, collect completions
    ///
    /// Returns `true` only if every slot replied STEP_COMPLETE. The clock
    /// advances by `dt` regardless of the outcome; callers inspect the
    /// returned bool and the tracker for per-worker detail.
    pub async fn step(&mut self, dt: f64) -> bool {
        if self.slots.is_empty() {
            warn!("step called with no workers");
            return false;
        }

        let payload = StepPayload {
            dt,
            time: self.current_time,
        };
        match Envelope::with_payload(Kind::Step, &payload, self.current_time) {
            Ok(envelope) => self.broadcast(&envelope).await,
            Err(e) => warn!(error = %e, "Failed to encode step broadcast"),
        }

        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }

        let responses = self.collect_responses(self.config.response_timeout()).await;

        let mut all_ok = true;
        for (idx, response) in responses.iter().enumerate() {
            let ok = response.kind == Kind::StepComplete;
            if !ok {
                warn!(worker = idx, kind = ?response.kind, reason = %response.payload,
                      "Worker did not complete step");
                all_ok = false;
            }
            if let Some(tracker) = self.tracker.as_mut() {
                tracker.record(idx, ok);
            }
        }

        // The clock keeps moving even on a failed round
        self.current_time += dt;
        all_ok
    }

    /// Step repeatedly until the clock reaches `end_time`
    ///
    /// Stops at the first failing step, leaving the clock wherever that
    /// step left it.
    pub async fn run_until(&mut self, end_time: f64, dt: f64) -> bool {
        let mut steps = 0u64;
        while self.current_time < end_time {
            if !self.step(dt).await {
                warn!(time = self.current_time, "Step failed, halting run");
                return false;
            }
            steps += 1;
        }
        info!(steps, time = self.current_time, "Run complete");
        true
    }

    /// Pull every worker's entity states into one aggregate list
    ///
    /// Non-SYNC_RESPONSE replies (errors, timeouts, closed slots) are
    /// skipped; partial results are always returned, never an error.
    pub async fn gather_states(&mut self) -> Vec<StateRecord> {
        let envelope = Envelope::new(Kind::SyncRequest, "{}", self.current_time);
        self.broadcast(&envelope).await;

        let responses = self.collect_responses(self.config.response_timeout()).await;

        let mut all_states = Vec::new();
        for response in &responses {
            if response.kind == Kind::SyncResponse {
                let payload: StatesPayload = response.parse_payload();
                all_states.extend(payload.states);
            }
        }
        debug!(states = all_states.len(), "Gathered entity states");
        all_states
    }

    /// Broadcast SHUTDOWN best-effort, then close every slot and the listener
    ///
    /// Idempotent; swallows per-connection errors during teardown.
    pub async fn shutdown(&mut self) {
        debug!("Coordinator shutting down");
        let envelope = Envelope::new(Kind::Shutdown, "{}", self.current_time);
        self.broadcast(&envelope).await;

        for slot in &mut self.slots {
            slot.stream = None;
        }
        self.listener.close();
        info!("Coordinator shut down");
    }

    /// Close the slot at `worker_id` in place
    ///
    /// The slot keeps its array position; indices are never compacted, so
    /// surviving workers stay addressable by their original index.
    pub fn handle_worker_disconnect(&mut self, worker_id: usize) {
        if worker_id >= self.slots.len() {
            return;
        }
        warn!(worker = worker_id, "Worker disconnected");
        self.slots[worker_id].stream = None;
    }

    /// Best-effort send to every connected slot
    ///
    /// A failed send to one slot is logged and must not block the others.
    async fn broadcast(&mut self, envelope: &Envelope) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(stream) = slot.stream.as_mut()
                && let Err(e) = stream.send_message(envelope).await
            {
                warn!(worker = idx, error = %e, "Broadcast send failed");
            }
        }
    }

    /// Collect one response per slot, multiplexed
    ///
    /// Every slot's bounded receive runs concurrently, so a round costs at
    /// most one `timeout` rather than the per-slot sum. Closed slots yield a
    /// "disconnected" placeholder without any I/O; expired waits yield a
    /// "timeout" placeholder, giving downstream code one uniform entry per
    /// slot to inspect.
    async fn collect_responses(&mut self, timeout: Duration) -> Vec<Envelope> {
        let now = self.current_time;
        let waits = self.slots.iter_mut().map(|slot| async move {
            match slot.stream.as_mut() {
                None => Envelope::error("disconnected", now),
                Some(stream) => stream
                    .recv_message_timeout(timeout)
                    .await
                    .unwrap_or_else(|| Envelope::error("timeout", now)),
            }
        });
        join_all(waits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            handshake_timeout_ms: 300,
            response_timeout_ms: 300,
            accept_timeout_ms: 300,
        }
    }

    /// Connect and handshake like a well-behaved worker
    async fn ready_worker(path: &Path) -> FrameStream {
        let mut stream = FrameStream::connect(path).await.unwrap();
        stream
            .send_message(&Envelope::new(Kind::Ready, "{}", 0.0))
            .await
            .unwrap();
        stream
    }

    #[test]
    fn test_round_robin_partition() {
        let assignments = WorkerAssignment::round_robin(5, 2);
        assert_eq!(assignments[0].entity_ids, vec![0, 2, 4]);
        assert_eq!(assignments[1].entity_ids, vec![1, 3]);
    }

    #[test]
    fn test_round_robin_zero_workers() {
        assert!(WorkerAssignment::round_robin(4, 0).is_empty());
    }

    #[tokio::test]
    async fn test_start_counts_only_ready_handshakes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        // One connection that never handshakes, two that do
        let silent_path = path.clone();
        let silent = tokio::spawn(async move {
            let _stream = FrameStream::connect(&silent_path).await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        let w0_path = path.clone();
        let w0 = tokio::spawn(async move {
            let _stream = ready_worker(&w0_path).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        let w1_path = path.clone();
        let w1 = tokio::spawn(async move {
            let _stream = ready_worker(&w1_path).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        coordinator.start(2).await;
        assert_eq!(coordinator.worker_count(), 2);
        assert_eq!(coordinator.live_count(), 2);
        assert_eq!(coordinator.tracker().unwrap().worker_count(), 2);

        silent.abort();
        w0.abort();
        w1.abort();
    }

    #[tokio::test]
    async fn test_step_with_no_workers_fails_fast() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        assert!(!coordinator.step(60.0).await);
        // No worker slots means no round happened at all
        assert_eq!(coordinator.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_clock_advances_even_on_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        let worker_path = path.clone();
        let worker = tokio::spawn(async move {
            // Handshakes, then never answers the step broadcast
            let _stream = ready_worker(&worker_path).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        coordinator.start(1).await;
        assert!(!coordinator.step(60.0).await);
        assert_eq!(coordinator.current_time(), 60.0);
        assert_eq!(coordinator.tracker().unwrap().done_count(), 1);
        assert_eq!(coordinator.tracker().unwrap().success_count(), 0);

        worker.abort();
    }

    #[tokio::test]
    async fn test_step_sends_expected_payload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        let worker_path = path.clone();
        let worker = tokio::spawn(async move {
            let mut stream = ready_worker(&worker_path).await;
            let msg = stream.recv_message().await.unwrap();
            assert_eq!(msg.kind, Kind::Step);
            let step: StepPayload = msg.parse_payload();
            assert_eq!(step.dt, 10.0);
            assert_eq!(step.time, 0.0);
            stream
                .send_message(&Envelope::new(Kind::StepComplete, "{}", step.time + step.dt))
                .await
                .unwrap();
        });

        coordinator.start(1).await;
        assert!(coordinator.step(10.0).await);
        assert_eq!(coordinator.current_time(), 10.0);
        assert!(coordinator.tracker().unwrap().all_succeeded());

        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_keeps_indices_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        let mut workers = Vec::new();
        for _ in 0..3 {
            let worker_path = path.clone();
            workers.push(tokio::spawn(async move {
                let mut stream = ready_worker(&worker_path).await;
                // Answer one step round if it arrives
                if let Some(msg) = stream.recv_message_timeout(Duration::from_secs(2)).await
                    && msg.kind == Kind::Step
                {
                    let _ = stream
                        .send_message(&Envelope::new(Kind::StepComplete, "{}", msg.timestamp))
                        .await;
                }
            }));
        }

        coordinator.start(3).await;
        coordinator.handle_worker_disconnect(1);

        // The slot count is unchanged; only liveness shrinks
        assert_eq!(coordinator.worker_count(), 3);
        assert_eq!(coordinator.live_count(), 2);

        // Slot 1 contributes a disconnected placeholder, not a reply
        assert!(!coordinator.step(5.0).await);
        assert_eq!(coordinator.current_time(), 5.0);
        let tracker = coordinator.tracker().unwrap();
        assert_eq!(tracker.done_count(), 3);
        assert_eq!(tracker.success_count(), 2);

        for worker in workers {
            let _ = worker.await;
        }
    }

    #[tokio::test]
    async fn test_gather_returns_partial_results() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        for id in 0..3u64 {
            let worker_path = path.clone();
            tokio::spawn(async move {
                let mut stream = ready_worker(&worker_path).await;
                let msg = stream.recv_message().await.unwrap();
                assert_eq!(msg.kind, Kind::SyncRequest);
                let reply = if id == 2 {
                    Envelope::error("propagator blew up", msg.timestamp)
                } else {
                    let payload = StatesPayload {
                        states: vec![StateRecord {
                            entity_id: id,
                            px: 1000.0 * id as f64,
                            ..Default::default()
                        }],
                    };
                    Envelope::with_payload(Kind::SyncResponse, &payload, msg.timestamp).unwrap()
                };
                stream.send_message(&reply).await.unwrap();
            });
        }

        coordinator.start(3).await;
        let states = coordinator.gather_states().await;
        assert_eq!(states.len(), 2);
        let mut ids: Vec<u64> = states.iter().map(|s| s.entity_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_shutdown_broadcasts_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sim.sock");
        let mut coordinator = Coordinator::bind(&path, fast_config()).unwrap();

        let worker_path = path.clone();
        let worker = tokio::spawn(async move {
            let mut stream = ready_worker(&worker_path).await;
            let msg = stream.recv_message().await.unwrap();
            assert_eq!(msg.kind, Kind::Shutdown);
        });

        coordinator.start(1).await;
        coordinator.shutdown().await;
        assert_eq!(coordinator.live_count(), 0);
        assert!(!path.exists());

        // Second shutdown is a no-op
        coordinator.shutdown().await;

        worker.await.unwrap();
    }
}
