mod common;

use bridge_traits::time::LogLevel;
use common::*;
use core_pipeline::{
    MirrorStage, PipelineConfig, PipelineError, RunMode, Stage, StageSupervisor,
};
use core_runtime::{ActivityLog, MemoryLogSink, StaticSettings};
use std::sync::Arc;
use std::time::Duration;

fn mirror_stage(env: &TestEnv) -> MirrorStage {
    MirrorStage::new(env.connector(), PipelineConfig::default())
}

#[core_async::test]
async fn test_copies_new_files_and_preserves_mtime() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"0123456789", 100);
    write_file(&env.remote_root().join("src/sub/b.txt"), b"bee", 200);

    let stage = mirror_stage(&env);
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.copied, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.dirs_created, 1);
    assert_eq!(stats.bytes_copied, 13);
    assert_eq!(std::fs::read(env.mirror().join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(mtime_of(&env.mirror().join("a.txt")), 100);
    assert_eq!(mtime_of(&env.mirror().join("sub/b.txt")), 200);
    assert!(env.mirror().join("sub").is_dir());
}

#[core_async::test]
async fn test_identical_file_is_left_untouched() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"0123456789", 100);
    // Same size and mtime, different bytes: must not be rewritten.
    write_file(&env.mirror().join("a.txt"), b"abcdefghij", 100);

    let stage = mirror_stage(&env);
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.copied, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(std::fs::read(env.mirror().join("a.txt")).unwrap(), b"abcdefghij");
}

#[core_async::test]
async fn test_mtime_mismatch_triggers_copy() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"0123456789", 100);
    write_file(&env.mirror().join("a.txt"), b"abcdefghij", 99);

    let stage = mirror_stage(&env);
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.copied, 1);
    assert_eq!(std::fs::read(env.mirror().join("a.txt")).unwrap(), b"0123456789");
    assert_eq!(mtime_of(&env.mirror().join("a.txt")), 100);
}

#[core_async::test]
async fn test_second_pass_copies_nothing() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"alpha", 100);
    write_file(&env.remote_root().join("src/deep/er/c.txt"), b"gamma", 300);

    let stage = mirror_stage(&env);
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);

    let first = stage.run_cycle(&plan, &ctx).await.unwrap();
    let second = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(first.copied, 2);
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.dirs_created, 0);
}

#[core_async::test]
async fn test_local_extras_are_never_deleted() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"alpha", 100);
    write_file(&env.mirror().join("local-only.txt"), b"keep", 50);

    let stage = mirror_stage(&env);
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);
    stage.run_cycle(&plan, &ctx).await.unwrap();

    assert!(env.mirror().join("local-only.txt").exists());
}

#[core_async::test]
async fn test_item_failure_is_counted_and_logged() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"alpha", 100);
    write_file(&env.remote_root().join("src/bad.txt"), b"nope", 100);
    write_file(&env.remote_root().join("src/c.txt"), b"gamma", 100);

    let stage = MirrorStage::new(
        Arc::new(FlakyConnector::new(env.remote_root(), "bad.txt")),
        PipelineConfig::default(),
    );
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, sink) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.copied, 2);
    assert_eq!(stats.failed, 1);
    let errors: Vec<_> = sink
        .entries()
        .into_iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Failed to copy file");
    assert!(errors[0].detail.as_deref().unwrap().starts_with("bad.txt: "));
}

#[core_async::test]
async fn test_stop_mid_copy_aborts_and_halts_cycle() {
    let env = TestEnv::new();
    write_file(&env.remote_root().join("src/a.txt"), b"0123456789", 100);
    write_file(&env.remote_root().join("src/b.txt"), b"0123456789", 100);

    let (ctx, _) = context(RunMode::OneShot);
    let stage = MirrorStage::new(
        Arc::new(CancellingConnector::new(env.remote_root(), ctx.token.clone())),
        PipelineConfig::default().with_chunk_size(4),
    );
    let plan = stage.prepare(&env.settings()).unwrap();

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.copied, 0);
    let partial = env.mirror().join("a.txt");
    assert_eq!(std::fs::read(&partial).unwrap(), b"0123");
    assert_ne!(mtime_of(&partial), 100);
    assert!(!env.mirror().join("b.txt").exists());
}

#[core_async::test]
async fn test_unreachable_endpoint_keeps_polling() {
    let env = TestEnv::new();
    let sink = Arc::new(MemoryLogSink::default());
    let supervisor = StageSupervisor::new(
        MirrorStage::new(
            Arc::new(bridge_desktop::LocalDirConnector::new(env.dir.path().join("offline"))),
            PipelineConfig::default(),
        ),
        Arc::new(StaticSettings::new(env.settings())),
        ActivityLog::new(sink.clone()),
        PipelineConfig::default().with_tick(Duration::from_millis(5)),
    );

    let handle = supervisor.start(Duration::from_millis(20)).await.unwrap();
    core_async::time::sleep(Duration::from_millis(150)).await;
    supervisor.request_stop().await.unwrap();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.cycles, 0);
    assert!(report.stopped_by_request);
    let failures = sink
        .messages_at(LogLevel::Error)
        .into_iter()
        .filter(|m| m == "mirror cycle failed")
        .count();
    assert!(failures >= 2, "expected repeated cycle failures, got {failures}");
}

#[core_async::test]
async fn test_missing_remote_dir_setting_is_rejected() {
    let env = TestEnv::new();
    let supervisor = StageSupervisor::new(
        mirror_stage(&env),
        Arc::new(StaticSettings::new(env.settings().with_mirror("", env.mirror()))),
        ActivityLog::tracing_only(),
        PipelineConfig::default(),
    );

    let result = supervisor.run_once().await;

    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert!(!env.mirror().exists());
}

#[core_async::test]
async fn test_missing_credentials_are_rejected() {
    let env = TestEnv::new();
    let mut settings = env.settings();
    settings.password = None;
    let supervisor = StageSupervisor::new(
        mirror_stage(&env),
        Arc::new(StaticSettings::new(settings)),
        ActivityLog::tracing_only(),
        PipelineConfig::default(),
    );

    let result = supervisor.run_once().await;

    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert!(!supervisor.is_running());
}
