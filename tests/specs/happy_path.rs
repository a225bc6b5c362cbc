use pipeworks_core::Status;
use pipeworks_engine::{Pipeline, Registry};

#[tokio::test]
async fn two_stage_pipeline_passes_a_file_downstream() {
    crate::support::init_tracing();
    let root = tempfile::tempdir().expect("tempdir");
    let registry = Registry::new();
    let pipeline = Pipeline::construct(root.path(), Some(&registry)).await.expect("construct");

    pipeline
        .add_stage(
            "create",
            "python3",
            vec!["-c".into(), "open(\"dummy.txt\",\"w\").write(\"testing\\n\")".into()],
            r".*txt",
            None,
        )
        .await
        .expect("add create");
    pipeline
        .add_stage(
            "consume",
            "python3",
            vec![
                "-c".into(),
                "import sys; print(open(sys.argv[1]).read())".into(),
            ],
            r".*txt",
            None,
        )
        .await
        .expect("add consume");

    pipeline.start(None).await.expect("start");
    pipeline.wait().await;
    pipeline.update_status();

    assert_eq!(pipeline.status(), Status::Terminated);

    let dummy = pipeline.root_dir().join("create").join("dummy.txt");
    assert_eq!(tokio::fs::read_to_string(&dummy).await.expect("read dummy.txt"), "testing\n");

    let stdout = pipeline.root_dir().join("consume").join("stdout");
    assert_eq!(tokio::fs::read_to_string(&stdout).await.expect("read stdout"), "testing\n\n");
}
