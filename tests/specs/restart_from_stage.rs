use pipeworks_core::Status;
use pipeworks_engine::{Pipeline, Registry};

#[tokio::test]
async fn restarting_from_consume_does_not_rerun_create() {
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
            vec!["-c".into(), "import sys; print(open(sys.argv[1]).read())".into()],
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
    let created_at = tokio::fs::metadata(&dummy).await.expect("stat dummy.txt").modified().expect("mtime");

    pipeline.start(Some("consume")).await.expect("restart from consume");
    pipeline.wait().await;
    pipeline.update_status();

    assert_eq!(pipeline.status(), Status::Terminated);
    let modified_at = tokio::fs::metadata(&dummy).await.expect("stat dummy.txt").modified().expect("mtime");
    assert_eq!(created_at, modified_at, "create must not have re-run");

    let stdout = pipeline.root_dir().join("consume").join("stdout");
    assert_eq!(
        tokio::fs::read_to_string(&stdout).await.expect("read stdout"),
        "testing\n\n",
        "consume should have consumed create's republished payload"
    );
}
