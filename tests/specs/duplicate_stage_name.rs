use pipeworks_core::PipelineError;
use pipeworks_engine::{Pipeline, Registry};

#[tokio::test]
async fn a_second_stage_with_the_same_name_is_rejected() {
    crate::support::init_tracing();
    let root = tempfile::tempdir().expect("tempdir");
    let registry = Registry::new();
    let pipeline = Pipeline::construct(root.path(), Some(&registry)).await.expect("construct");

    pipeline
        .add_stage("s", "python3", vec!["-c".into(), "pass".into()], r".*", None)
        .await
        .expect("first add_stage(\"s\", ...) should succeed");

    let err = pipeline
        .add_stage("s", "python3", vec!["-c".into(), "pass".into()], r".*", None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateStageName(name) if name == "s"));
    assert_eq!(pipeline.stage_count().await, 1);
}
