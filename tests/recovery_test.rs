mod common;

use atlas_orchestrator::models::{Case, MeasurementId, MeasurementStatus};
use atlas_orchestrator::orchestrator::{App, CaseState};
use atlas_orchestrator::services::{recover_tracker, ResultStore};
use atlas_orchestrator::workflow::{Bucket, LifecycleTracker};
use common::{records, test_config, FakeAtlas};
use serde_json::json;

/// 运行目录：case1 提交了 1..=4，1 和 3 已有快照，2 之前已请求停止
fn interrupted_run(dir: &std::path::Path) -> ResultStore {
    let store = ResultStore::create(dir, "20240101-000000").unwrap();
    store
        .write_response(Case::Case1, 0, &json!({"measurements": [1, 2]}))
        .unwrap();
    store
        .write_response(Case::Case1, 1, &json!({"measurements": [3, 4]}))
        .unwrap();
    store.write_snapshot(Case::Case1, MeasurementId(1), &records(3)).unwrap();
    store.write_snapshot(Case::Case1, MeasurementId(3), &records(2)).unwrap();

    let mut hint = LifecycleTracker::new();
    hint.register(Case::Case1, &[MeasurementId(1), MeasurementId(2)]);
    hint.move_to(Case::Case1, MeasurementId(2), Bucket::StopRequested);
    store.save_tracker(&hint).unwrap();
    store
}

#[tokio::test]
async fn test_recover_tracker_applies_status_rules() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());

    let api = FakeAtlas::new();
    api.set_status(1, MeasurementStatus::Stopped);
    api.set_status(2, MeasurementStatus::Ongoing);
    api.set_status(3, MeasurementStatus::Ongoing);
    api.set_status(4, MeasurementStatus::Failed);

    let tracker = tokio_test::assert_ok!(recover_tracker(&store, &api).await);

    assert_eq!(tracker.bucket_of(Case::Case1, MeasurementId(1)), Some(Bucket::Finished));
    assert_eq!(
        tracker.bucket_of(Case::Case1, MeasurementId(2)),
        Some(Bucket::StopRequested)
    );
    assert_eq!(tracker.bucket_of(Case::Case1, MeasurementId(3)), Some(Bucket::Active));
    // 终态但没有快照：再拉取一次
    assert_eq!(tracker.bucket_of(Case::Case1, MeasurementId(4)), Some(Bucket::Active));
    assert_eq!(store.load_tracker().unwrap(), Some(tracker));
}

#[tokio::test]
async fn test_snapshot_only_ids_are_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResultStore::create(dir.path(), "r").unwrap();
    store.write_snapshot(Case::Case3, MeasurementId(77), &records(1)).unwrap();

    let api = FakeAtlas::new();
    let tracker = recover_tracker(&store, &api).await.unwrap();
    assert_eq!(tracker.bucket_of(Case::Case3, MeasurementId(77)), Some(Bucket::Active));
}

#[tokio::test]
async fn test_resume_polls_recovered_run_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let store = interrupted_run(dir.path());

    let api = FakeAtlas::new();
    api.set_status(1, MeasurementStatus::Stopped);
    api.set_status(2, MeasurementStatus::Ongoing);
    api.set_status(3, MeasurementStatus::Ongoing);
    api.set_status(4, MeasurementStatus::Failed);
    api.with(|s| s.default_result = Some(records(2)));

    let app = App::with_api(test_config(), api, store);
    let report = app.resume().await.unwrap();

    assert!(report.is_complete(), "{:?}", report);
    assert_eq!(report.submitted, 4);
    assert_eq!(report.state(Case::Case1), CaseState::Done { complete: true });
    assert_eq!(report.state(Case::Case2), CaseState::Done { complete: true });
    assert_eq!(
        app.store()
            .snapshot_ids()
            .unwrap()
            .into_iter()
            .map(|(_, id)| id.0)
            .collect::<Vec<_>>(),
        vec![1, 3, 4]
    );
}
