//! End-to-end pipeline tests over real dump files on disk.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use channel_digest::brand::{MediaBrander, NoopTranscoder};
use channel_digest::config::{AppConfig, RunMode};
use channel_digest::cursor::CursorStore;
use channel_digest::pipeline::Pipeline;
use channel_digest::pipeline::types::{CountingProgress, Message};
use channel_digest::source::JsonDumpSource;
use channel_digest::store::MemorySink;

fn message(id: i64, timestamp: DateTime<Utc>, text: &str, media: Vec<PathBuf>) -> Message {
    Message {
        id,
        timestamp,
        text: text.into(),
        media,
        group_id: None,
        views: 0,
        likes: 0,
        comments: 0,
    }
}

fn write_dump(dir: &TempDir, channel: &str, messages: &[Message]) {
    let dumps = dir.path().join("dumps");
    fs::create_dir_all(&dumps).unwrap();
    let body = serde_json::to_string_pretty(messages).unwrap();
    fs::write(dumps.join(format!("{channel}.json")), body).unwrap();
}

fn media_file(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, b"payload").unwrap();
    path
}

fn build(
    dir: &TempDir,
    mode: RunMode,
    limit: usize,
) -> (Pipeline, Arc<MemorySink>, Arc<CountingProgress>) {
    let config = AppConfig {
        channels: vec!["news".into()],
        limit,
        mode,
        dump_dir: dir.path().join("dumps"),
        scratch_dir: dir.path().join("scratch"),
        cursor_path: dir.path().join("cursors.json"),
        ..AppConfig::default()
    };
    config.validate().unwrap();

    let source = Arc::new(JsonDumpSource::new(config.dump_dir.clone()));
    let sink = Arc::new(MemorySink::new());
    let progress = Arc::new(CountingProgress::default());
    let brander = MediaBrander::new(
        config.branding.clone(),
        config.scratch_dir.clone(),
        Box::new(NoopTranscoder),
    )
    .unwrap();
    let cursors = CursorStore::load(config.cursor_path.clone()).unwrap();
    let pipeline = Pipeline::new(
        config,
        source,
        sink.clone(),
        progress.clone(),
        brander,
        cursors,
    );
    (pipeline, sink, progress)
}

#[tokio::test]
async fn sequential_mode_reconstructs_split_posts_from_a_dump() {
    let dir = TempDir::new().unwrap();
    let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let photo = media_file(&dir, "photo.jpg");
    write_dump(
        &dir,
        "news",
        &[
            message(11, t0, "morning update", vec![]),
            message(12, t0 + Duration::seconds(45), "", vec![photo]),
            message(13, t0 + Duration::seconds(900), "afternoon note", vec![]),
        ],
    );

    let (mut pipeline, sink, progress) = build(&dir, RunMode::Sequential, 100);
    pipeline.run(&CancellationToken::new()).await.unwrap();

    let posts = sink.posts();
    assert_eq!(posts.len(), 2);

    assert_eq!(posts[0].original_ids, vec![11, 12]);
    assert!(posts[0].is_merged);
    assert_eq!(posts[0].text, "morning update");
    assert_eq!(posts[0].media_count(), 1);

    assert_eq!(posts[1].original_ids, vec![13]);
    assert!(!posts[1].is_merged);

    assert_eq!(progress.totals(), (2, 3));
}

#[tokio::test]
async fn sequential_rerun_skips_previously_absorbed_messages() {
    let dir = TempDir::new().unwrap();
    let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let photo = media_file(&dir, "photo.jpg");
    write_dump(
        &dir,
        "news",
        &[
            message(11, t0, "morning update", vec![]),
            message(12, t0 + Duration::seconds(45), "", vec![photo.clone()]),
        ],
    );

    let (mut pipeline, _sink, _progress) = build(&dir, RunMode::Sequential, 100);
    pipeline.run(&CancellationToken::new()).await.unwrap();

    // The cursor file now carries the last-absorbed id.
    let raw = fs::read_to_string(dir.path().join("cursors.json")).unwrap();
    let cursors: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(cursors["news"], 12);

    // The channel gains one message; a second run only processes that one.
    write_dump(
        &dir,
        "news",
        &[
            message(11, t0, "morning update", vec![]),
            message(12, t0 + Duration::seconds(45), "", vec![photo]),
            message(13, t0 + Duration::seconds(3_000), "evening note", vec![]),
        ],
    );
    let (mut pipeline, sink, _progress) = build(&dir, RunMode::Sequential, 100);
    pipeline.run(&CancellationToken::new()).await.unwrap();

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].original_ids, vec![13]);
    assert!(!posts[0].is_merged);
}

#[tokio::test]
async fn sequential_rerun_emits_nothing_for_an_unchanged_dump() {
    let dir = TempDir::new().unwrap();
    let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    // Two standalone posts: no absorption ever happens, yet a second run
    // over the same dump must not re-append them.
    write_dump(
        &dir,
        "news",
        &[
            message(11, t0, "first note", vec![]),
            message(12, t0 + Duration::seconds(1_200), "second note", vec![]),
        ],
    );

    let (mut pipeline, sink, _progress) = build(&dir, RunMode::Sequential, 100);
    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(sink.posts().len(), 2);

    let raw = fs::read_to_string(dir.path().join("cursors.json")).unwrap();
    let cursors: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(cursors["news"], 12);

    let (mut pipeline, sink, _progress) = build(&dir, RunMode::Sequential, 100);
    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert!(sink.posts().is_empty());
}

#[tokio::test]
async fn top_posts_mode_selects_by_engagement_and_records_metrics() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let mut messages: Vec<Message> = (1..=10)
        .map(|i| {
            let mut m = message(i, now - Duration::hours(i), &format!("story {i}"), vec![]);
            m.likes = 10 * i as u64;
            m.comments = i as u64;
            m.views = 100 * i as u64;
            m
        })
        .collect();
    // A message outside the window must never be selected.
    messages.push(message(99, now - Duration::days(30), "ancient", vec![]));
    write_dump(&dir, "news", &messages);

    let (mut pipeline, sink, _progress) = build(&dir, RunMode::TopPosts, 5);
    pipeline.run(&CancellationToken::new()).await.unwrap();

    let posts = sink.posts();
    assert_eq!(posts.len(), 5);
    for post in &posts {
        assert!(post.is_top_post);
        assert_ne!(post.original_ids, vec![99]);
        let metrics = post.metrics.expect("top posts carry metrics");
        assert!(metrics.likes > 0);
    }
}
