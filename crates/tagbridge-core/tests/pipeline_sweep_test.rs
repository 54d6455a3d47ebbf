#![allow(clippy::unwrap_used)]
// Change pipeline lanes and sweep behavior against recording fakes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use common::{MockLink, RecordingSink, settle, triple};
use tagbridge_core::{
    ChangePipeline, LinkEvent, SweepReport, SweepScheduler, Tag, TagCatalog, TagValue,
};

fn catalog() -> Arc<TagCatalog> {
    Arc::new(
        TagCatalog::new(vec![
            Tag::new("Data[0]", Some("North Head Bearing")),
            Tag::new("Data[1]", None::<String>),
        ])
        .unwrap(),
    )
}

fn changed(tag: &str, previous: i64, value: i64) -> LinkEvent {
    LinkEvent::Changed {
        tag: tag.into(),
        previous: TagValue::Int(previous),
        value: TagValue::Int(value),
    }
}

// ── ChangePipeline ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_changed_event_produces_one_reading() {
    let sink = RecordingSink::default();
    let pipeline = ChangePipeline::new(catalog(), Arc::new(sink.clone()));

    assert!(pipeline.dispatch(&changed("Data[0]", 10, 11)));
    settle().await;

    let readings = sink.readings();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].tag_name(), "Data[0]");
    assert_eq!(readings[0].display_name(), "North Head Bearing");
    assert_eq!(readings[0].value(), TagValue::Int(11));
}

#[tokio::test(start_paused = true)]
async fn test_unlabelled_tag_uses_name_as_display_name() {
    let sink = RecordingSink::default();
    let pipeline = ChangePipeline::new(catalog(), Arc::new(sink.clone()));

    pipeline.dispatch(&LinkEvent::Initialized {
        tag: "Data[1]".into(),
        value: TagValue::Int(0),
    });
    settle().await;

    assert_eq!(sink.readings()[0].display_name(), "Data[1]");
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_does_not_block_next_reading() {
    let sink = RecordingSink::default();
    let pipeline = ChangePipeline::new(catalog(), Arc::new(sink.clone()));

    sink.fail_tag("Data[0]");
    pipeline.dispatch(&changed("Data[0]", 1, 2));
    settle().await;
    sink.heal_tag("Data[0]");
    pipeline.dispatch(&changed("Data[0]", 2, 3));
    settle().await;

    assert_eq!(sink.attempts(), 2);
    assert_eq!(sink.summary(), vec![triple("Data[0]", 3, "changed")]);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_does_not_block_other_tag() {
    let sink = RecordingSink::default();
    let pipeline = ChangePipeline::new(catalog(), Arc::new(sink.clone()));

    sink.fail_tag("Data[0]");
    pipeline.dispatch(&changed("Data[0]", 1, 2));
    pipeline.dispatch(&changed("Data[1]", 7, 8));
    settle().await;

    assert_eq!(sink.attempts(), 2);
    assert_eq!(sink.summary(), vec![triple("Data[1]", 8, "changed")]);
}

#[tokio::test(start_paused = true)]
async fn test_tag_order_is_preserved_and_slow_tag_does_not_block_others() {
    let sink = RecordingSink::default();
    sink.slow_tag("Data[0]", Duration::from_secs(1));
    let pipeline = ChangePipeline::new(catalog(), Arc::new(sink.clone()));

    pipeline.dispatch(&changed("Data[0]", 1, 2));
    pipeline.dispatch(&changed("Data[0]", 2, 3));
    pipeline.dispatch(&changed("Data[1]", 7, 8));
    settle().await;

    // Data[0] is still stuck in its first push; Data[1] went through.
    assert_eq!(sink.summary(), vec![triple("Data[1]", 8, "changed")]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        sink.summary(),
        vec![
            triple("Data[1]", 8, "changed"),
            triple("Data[0]", 2, "changed"),
            triple("Data[0]", 3, "changed"),
        ]
    );
}

// ── SweepScheduler ──────────────────────────────────────────────────

fn sweeper(link: &Arc<MockLink>, sink: &RecordingSink) -> SweepScheduler<MockLink, RecordingSink> {
    SweepScheduler::new(
        Arc::clone(link),
        catalog(),
        Arc::new(sink.clone()),
        Duration::from_secs(60),
    )
}

#[tokio::test(start_paused = true)]
async fn test_sweep_reflects_value_at_sweep_time() {
    let link = Arc::new(MockLink::new(0));
    let sink = RecordingSink::default();
    let sweep = sweeper(&link, &sink);

    link.set_value("Data[0]", 5);
    link.set_value("Data[1]", 0);
    sweep.sweep().await;
    link.set_value("Data[0]", 9);
    let report = sweep.sweep().await;

    assert_eq!(
        report,
        SweepReport {
            pushed: 2,
            failed: 0,
            skipped: 0
        }
    );
    assert_eq!(
        sink.summary(),
        vec![
            triple("Data[0]", 5, "sweep"),
            triple("Data[1]", 0, "sweep"),
            triple("Data[0]", 9, "sweep"),
            triple("Data[1]", 0, "sweep"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sweep_continues_past_failed_tag() {
    let link = Arc::new(MockLink::new(0));
    let sink = RecordingSink::default();
    let sweep = sweeper(&link, &sink);
    link.set_value("Data[0]", 1);
    link.set_value("Data[1]", 2);
    sink.fail_tag("Data[0]");

    let report = sweep.sweep().await;

    assert_eq!(report.pushed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(sink.summary(), vec![triple("Data[1]", 2, "sweep")]);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_skips_tags_without_value() {
    let link = Arc::new(MockLink::new(0));
    let sink = RecordingSink::default();
    let sweep = sweeper(&link, &sink);
    link.set_value("Data[1]", 4);

    let report = sweep.sweep().await;

    assert_eq!(report.skipped, 1);
    assert_eq!(sink.summary(), vec![triple("Data[1]", 4, "sweep")]);
}

#[tokio::test(start_paused = true)]
async fn test_initial_sweep_waits_for_first_scan() {
    let link = Arc::new(MockLink::new(0));
    let sink = RecordingSink::default();
    let sweep = sweeper(&link, &sink);
    link.set_value("Data[0]", 1);
    link.set_value("Data[1]", 2);

    let (scanning, first_scan) = watch::channel(false);
    let handle = sweep.spawn_after_first_scan(
        first_scan,
        Duration::from_millis(200),
        CancellationToken::new(),
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(sink.readings().is_empty());

    scanning.send_replace(true);
    tokio::time::sleep(Duration::from_millis(199)).await;
    assert!(sink.readings().is_empty());

    handle.await.unwrap();
    assert_eq!(sink.readings().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_sweep_runs_every_period_until_cancelled() {
    let link = Arc::new(MockLink::new(0));
    let sink = RecordingSink::default();
    let sweep = sweeper(&link, &sink);
    link.set_value("Data[0]", 1);
    link.set_value("Data[1]", 2);

    let cancel = CancellationToken::new();
    let handle = sweep.spawn_periodic(cancel.clone());

    settle().await;
    assert!(sink.readings().is_empty());

    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(sink.readings().len(), 4);

    cancel.cancel();
    handle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sink.readings().len(), 4);
}
