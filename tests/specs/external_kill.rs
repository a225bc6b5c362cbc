use pipeworks_core::Status;
use pipeworks_engine::{Pipeline, Registry};

#[tokio::test]
async fn killing_a_pipeline_stops_a_looping_first_stage_before_the_tail_runs() {
    crate::support::init_tracing();
    let root = tempfile::tempdir().expect("tempdir");
    let registry = Registry::new();
    let pipeline = Pipeline::construct(root.path(), Some(&registry)).await.expect("construct");

    pipeline
        .add_stage("loop", "python3", vec!["-c".into(), "while True: pass".into()], r".*", None)
        .await
        .expect("add loop");
    pipeline
        .add_stage("tail", "python3", vec!["-c".into(), "open(\"marker\",\"w\").close()".into()], r".*", None)
        .await
        .expect("add tail");

    pipeline.start(None).await.expect("start");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    pipeline.kill().await;
    pipeline.update_status();

    assert_eq!(pipeline.status(), Status::Killed);
    assert!(
        !pipeline.root_dir().join("tail").join("marker").exists(),
        "tail must never have written its output file"
    );
}
