use pipeworks_core::Status;
use pipeworks_engine::{Pipeline, Registry};

#[tokio::test]
async fn a_syntax_error_in_the_first_stage_kills_the_pipeline() {
    crate::support::init_tracing();
    let root = tempfile::tempdir().expect("tempdir");
    let registry = Registry::new();
    let pipeline = Pipeline::construct(root.path(), Some(&registry)).await.expect("construct");

    pipeline
        .add_stage("create", "python3", vec!["-c".into(), "cause error".into()], r".*", None)
        .await
        .expect("add create");
    pipeline
        .add_stage("consume", "python3", vec!["-c".into(), "print(\"ok\")".into()], r".*", None)
        .await
        .expect("add consume");

    pipeline.start(None).await.expect("start");
    pipeline.wait().await;
    pipeline.update_status();

    assert_eq!(pipeline.status(), Status::Killed);
    assert_eq!(pipeline.stage_status("create").await, Some(Status::Killed));
    assert_eq!(pipeline.stage_status("consume").await, Some(Status::Killed));
    assert!(
        !pipeline.root_dir().join("consume").exists(),
        "consume must never have prepared a working directory or spawned its child"
    );
}
