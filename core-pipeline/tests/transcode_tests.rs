mod common;

use bridge_traits::time::LogLevel;
use common::*;
use core_media::ImageRsCodec;
use core_pipeline::{PipelineConfig, RunMode, Stage, StageSupervisor, TranscodeStage};
use core_runtime::{ActivityLog, MemoryLogSink, Settings, StaticSettings};
use std::sync::Arc;

fn transcode_stage() -> TranscodeStage {
    TranscodeStage::new(Arc::new(ImageRsCodec), &PipelineConfig::default())
}

#[core_async::test]
async fn test_watch_mode_skips_fresh_output_one_shot_does_not() {
    let env = TestEnv::new();
    let input = env.mirror().join("photo.png");
    let output = env.out().join("photo.jpg");
    write_png(&input, 16, 8);
    set_mtime(&input, 1_000);
    write_file(&output, b"stale but newer", 2_000);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings()).unwrap();

    let (watch, _) = context(RunMode::Watch);
    let stats = stage.run_cycle(&plan, &watch).await.unwrap();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.skipped_files, 1);
    assert_eq!(stats.compressed_files, 0);
    assert_eq!(std::fs::read(&output).unwrap(), b"stale but newer");

    let (once, _) = context(RunMode::OneShot);
    let stats = stage.run_cycle(&plan, &once).await.unwrap();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.compressed_files, 1);
    assert_eq!(stats.skipped_files, 0);
    let decoded = image::open(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
}

#[core_async::test]
async fn test_watch_mode_reencodes_outdated_output() {
    let env = TestEnv::new();
    let input = env.mirror().join("photo.png");
    write_png(&input, 4, 4);
    set_mtime(&input, 2_000);
    write_file(&env.out().join("photo.jpg"), b"old", 1_000);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings()).unwrap();
    let (watch, _) = context(RunMode::Watch);

    let stats = stage.run_cycle(&plan, &watch).await.unwrap();
    assert_eq!(stats.compressed_files, 1);

    // The fresh output now satisfies the freshness check.
    let stats = stage.run_cycle(&plan, &watch).await.unwrap();
    assert_eq!(stats.compressed_files, 0);
    assert_eq!(stats.skipped_files, 1);
}

#[core_async::test]
async fn test_tree_is_mirrored_and_non_images_ignored() {
    let env = TestEnv::new();
    write_png(&env.mirror().join("2024/05/a.PNG"), 8, 8);
    write_png(&env.mirror().join("b.png"), 8, 8);
    write_file(&env.mirror().join("notes.txt"), b"not an image", 100);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings().with_resize_width(4)).unwrap();
    let (ctx, _) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.compressed_files, 2);
    assert!(env.out().join("2024/05/a.jpg").is_file());
    assert!(!env.out().join("notes.jpg").exists());
    let resized = image::open(env.out().join("b.jpg")).unwrap();
    assert_eq!((resized.width(), resized.height()), (4, 4));
}

#[core_async::test]
async fn test_compressed_entry_reports_dimensions() {
    let env = TestEnv::new();
    write_png(&env.mirror().join("wide.png"), 40, 20);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings().with_resize_width(20)).unwrap();
    let (ctx, sink) = context(RunMode::OneShot);

    stage.run_cycle(&plan, &ctx).await.unwrap();

    let entry = sink
        .entries()
        .into_iter()
        .find(|e| e.message == "Compressed image")
        .unwrap();
    let detail = entry.detail.unwrap();
    assert!(detail.starts_with("wide.png: 40x20 -> 20x10, "), "{detail}");
    assert!(detail.ends_with(" bytes"));
}

#[core_async::test]
async fn test_runs_without_remote_credentials() {
    let env = TestEnv::new();
    write_png(&env.mirror().join("photo.png"), 8, 8);
    let local_only = Settings::new("", "")
        .with_mirror("", env.mirror())
        .with_output_dir(env.out());
    let sink = Arc::new(MemoryLogSink::default());
    let supervisor = StageSupervisor::new(
        transcode_stage(),
        Arc::new(StaticSettings::new(local_only)),
        ActivityLog::new(sink.clone()),
        PipelineConfig::default(),
    );

    let report = supervisor.run_once().await.unwrap();

    assert_eq!(report.stats.compressed_files, 1);
    assert!(env.out().join("photo.jpg").is_file());
    assert!(sink.messages_at(LogLevel::Error).is_empty());
}

#[core_async::test]
async fn test_corrupt_image_is_counted_and_walk_continues() {
    let env = TestEnv::new();
    write_file(&env.mirror().join("a_broken.jpg"), b"garbage", 100);
    write_png(&env.mirror().join("b_good.png"), 8, 8);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, sink) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.error_files, 1);
    assert_eq!(stats.compressed_files, 1);
    assert_eq!(sink.messages_at(LogLevel::Error), vec!["Failed to transcode image"]);
}

#[core_async::test]
async fn test_missing_input_root_logs_error_and_does_nothing() {
    let env = TestEnv::new();

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, sink) = context(RunMode::OneShot);

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats, Default::default());
    assert_eq!(
        sink.messages_at(LogLevel::Error),
        vec!["Input directory does not exist"]
    );
    assert!(!env.out().exists());
}

#[core_async::test]
async fn test_stop_between_files() {
    let env = TestEnv::new();
    write_png(&env.mirror().join("a.png"), 4, 4);
    write_png(&env.mirror().join("b.png"), 4, 4);

    let stage = transcode_stage();
    let plan = stage.prepare(&env.settings()).unwrap();
    let (ctx, _) = context(RunMode::OneShot);
    ctx.token.cancel();

    let stats = stage.run_cycle(&plan, &ctx).await.unwrap();

    assert_eq!(stats.compressed_files, 0);
    assert!(!env.out().join("a.jpg").exists());
}
