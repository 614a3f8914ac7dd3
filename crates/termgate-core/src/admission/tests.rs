use super::*;
use std::thread;

const LIMITS: AdmissionLimits = AdmissionLimits {
    max_total: 3,
    max_per_identity: 2,
};

#[test]
fn test_per_identity_ceiling() {
    let controller = AdmissionController::new();

    assert!(controller.acquire("alice", LIMITS));
    assert!(controller.acquire("alice", LIMITS));
    assert!(!controller.acquire("alice", LIMITS));

    // other identities are counted independently
    assert!(controller.acquire("bob", LIMITS));
}

#[test]
fn test_global_ceiling() {
    let controller = AdmissionController::new();
    let limits = AdmissionLimits {
        max_total: 2,
        max_per_identity: 5,
    };

    assert!(controller.acquire("alice", limits));
    assert!(controller.acquire("bob", limits));
    assert!(!controller.acquire("carol", limits));
    assert_eq!(controller.snapshot().total, 2);
}

#[test]
fn test_release_frees_exactly_one_slot() {
    let controller = AdmissionController::new();

    assert!(controller.acquire("alice", LIMITS));
    assert!(controller.acquire("alice", LIMITS));
    controller.release("alice");

    assert!(controller.acquire("alice", LIMITS));
    assert!(!controller.acquire("alice", LIMITS));
}

#[test]
fn test_release_unknown_identity_never_underflows() {
    let controller = AdmissionController::new();
    controller.release("ghost");

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.total, 0);
    assert!(snapshot.per_identity.is_empty());

    assert!(controller.acquire("alice", LIMITS));
    controller.release("alice");
    controller.release("alice");
    assert_eq!(controller.snapshot(), AdmissionSnapshot::default());
}

#[test]
fn test_snapshot_total_matches_sum() {
    let controller = AdmissionController::new();
    controller.acquire("alice", LIMITS);
    controller.acquire("bob", LIMITS);
    controller.acquire("bob", LIMITS);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.per_identity.get("alice"), Some(&1));
    assert_eq!(snapshot.per_identity.get("bob"), Some(&2));
    assert_eq!(snapshot.per_identity.values().sum::<usize>(), snapshot.total);
}

#[test]
fn test_concurrent_acquires_admit_exactly_max_total() {
    let controller = Arc::new(AdmissionController::new());
    let limits = AdmissionLimits {
        max_total: 5,
        max_per_identity: 100,
    };

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || controller.acquire(&format!("user{}", i % 4), limits))
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 5);
    assert_eq!(controller.snapshot().total, 5);
}

#[test]
fn test_permit_releases_on_drop() {
    let service: Arc<dyn AdmissionService> = Arc::new(AdmissionController::new());

    {
        let permit = AdmissionPermit::try_acquire(&service, "alice", LIMITS).unwrap();
        assert_eq!(permit.identity(), "alice");
        assert_eq!(service.snapshot().total, 1);
    }

    assert_eq!(service.snapshot().total, 0);
}

#[test]
fn test_permit_explicit_release_happens_once() {
    let mut mock = MockAdmissionService::new();
    mock.expect_acquire().times(1).return_const(true);
    mock.expect_release()
        .withf(|identity| identity == "alice")
        .times(1)
        .return_const(());
    let service: Arc<dyn AdmissionService> = Arc::new(mock);

    let permit = AdmissionPermit::try_acquire(&service, "alice", LIMITS).unwrap();
    permit.release();
}

#[test]
fn test_rejected_permit_never_releases() {
    let mut mock = MockAdmissionService::new();
    mock.expect_acquire().times(1).return_const(false);
    mock.expect_release().never();
    let service: Arc<dyn AdmissionService> = Arc::new(mock);

    assert!(AdmissionPermit::try_acquire(&service, "alice", LIMITS).is_none());
}
