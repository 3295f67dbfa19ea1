//! End-to-end lockstep session: coordinator plus real workers over a
//! Unix socket, exercising handshake, assignment, stepping, state
//! gathering, and shutdown.

use simlock::coordinator::{Coordinator, CoordinatorConfig, WorkerAssignment};
use simlock::worker::{Propagator, Worker};
use simwire::StateRecord;

/// Moves each entity 1 m/s along +x, enough to check lockstep math
struct UnitDrift;

impl Propagator for UnitDrift {
    fn advance(&mut self, _entity_id: u64, dt: f64, state: &mut StateRecord) {
        state.px += dt;
        state.vx = 1.0;
    }
}

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        handshake_timeout_ms: 1000,
        response_timeout_ms: 1000,
        accept_timeout_ms: 500,
    }
}

#[tokio::test]
async fn test_two_worker_session() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("lockstep.sock");

    let mut coordinator = Coordinator::bind(&socket, fast_config()).unwrap();

    let mut workers = Vec::new();
    for _ in 0..2 {
        let path = socket.clone();
        workers.push(tokio::spawn(async move {
            let worker = Worker::connect(&path, Box::new(UnitDrift)).await.unwrap();
            worker.run().await
        }));
    }

    coordinator.start(2).await;
    assert_eq!(coordinator.live_count(), 2);

    // Uneven split: worker 0 gets entities 0 and 1, worker 1 gets entity 2
    let assignments = WorkerAssignment::round_robin(3, 2);
    assert_eq!(assignments[0].entity_ids, vec![0, 2]);
    assert_eq!(assignments[1].entity_ids, vec![1]);
    coordinator.assign_entities(&assignments).await;

    assert!(coordinator.step(10.0).await);
    assert_eq!(coordinator.current_time(), 10.0);

    assert!(coordinator.step(10.0).await);
    assert!(coordinator.step(10.0).await);
    assert_eq!(coordinator.current_time(), 30.0);

    let mut states = coordinator.gather_states().await;
    states.sort_by_key(|s| s.entity_id);
    assert_eq!(states.len(), 3);
    for (i, state) in states.iter().enumerate() {
        assert_eq!(state.entity_id, i as u64);
        assert_eq!(state.px, 30.0);
        assert_eq!(state.time, 30.0);
    }

    coordinator.shutdown().await;

    for handle in workers {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_session_survives_worker_loss() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("loss.sock");

    let mut coordinator = Coordinator::bind(&socket, fast_config()).unwrap();

    let path = socket.clone();
    let survivor = tokio::spawn(async move {
        let worker = Worker::connect(&path, Box::new(UnitDrift)).await.unwrap();
        worker.run().await
    });

    // The second worker handshakes and then hangs up without serving
    let path = socket.clone();
    let quitter = tokio::spawn(async move {
        let worker = Worker::connect(&path, Box::new(UnitDrift)).await.unwrap();
        drop(worker);
    });

    coordinator.start(2).await;
    assert_eq!(coordinator.worker_count(), 2);
    quitter.await.unwrap();

    let assignments = WorkerAssignment::round_robin(2, 2);
    coordinator.assign_entities(&assignments).await;

    // The dead worker never replies, but the clock still advances
    let ok = coordinator.step(5.0).await;
    assert!(!ok);
    assert_eq!(coordinator.current_time(), 5.0);

    let states = coordinator.gather_states().await;
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].px, 5.0);

    coordinator.shutdown().await;
    survivor.await.unwrap().unwrap();
}
