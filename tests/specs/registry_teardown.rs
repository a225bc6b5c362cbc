use pipeworks_core::Status;
use pipeworks_engine::{Pipeline, Registry};

/// The original source tears down its registry from `__del__` by killing
/// and waiting every owned job. Rust has no async `Drop`, so teardown here
/// is an explicit `shutdown()` call instead of an implicit one triggered by
/// scope exit — the same guarantee (no child outlives teardown, and
/// teardown blocks until every wait completes), just invoked by the caller.
#[tokio::test]
async fn shutdown_kills_a_forever_looping_pipeline_before_returning() {
    crate::support::init_tracing();
    let root = tempfile::tempdir().expect("tempdir");
    let registry = Registry::new();
    let pipeline = Pipeline::construct(root.path(), Some(&registry)).await.expect("construct");

    pipeline
        .add_stage("loop", "python3", vec!["-c".into(), "while True: pass".into()], r".*", None)
        .await
        .expect("add loop");

    pipeline.start(None).await.expect("start");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    registry.shutdown().await;

    pipeline.update_status();
    assert_eq!(pipeline.status(), Status::Killed);
}
