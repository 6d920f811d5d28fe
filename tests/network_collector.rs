#![cfg(unix)]

use std::time::{Duration, Instant};

use psrecord::network::{NetworkCollector, NetworkSample};
use psrecord::sampler::RunContext;
use psrecord::shutdown::{self, Shutdown};
use psrecord::sink::TimeSeriesSink;

fn shell(script: &str, filter: &str) -> NetworkCollector {
    let command = ["sh".to_string(), "-c".to_string(), script.to_string()];
    NetworkCollector::new(&command, filter).unwrap()
}

fn pairs(series: &[NetworkSample]) -> Vec<(u64, u64)> {
    series.iter().map(|s| (s.upload_bytes, s.download_bytes)).collect()
}

#[tokio::test]
async fn matching_lines_become_samples() {
    let collector = shell(
        "printf 'Refreshing:\\npython 10/20\\nnode 1/2\\npython 30/40\\n'",
        "python",
    );
    let ctx = RunContext::start(None, None, false);

    let sink = collector
        .spawn(ctx, TimeSeriesSink::in_memory(), Shutdown::never())
        .await
        .unwrap();

    assert!(sink.is_finalized());
    assert_eq!(pairs(sink.series()), vec![(10, 20), (30, 40)]);
    assert!(sink.series().iter().all(|s| s.elapsed_seconds >= 0.0));
}

#[tokio::test]
async fn missing_tool_yields_empty_series() {
    let command = ["psrecord-no-such-bandwidth-tool".to_string()];
    let collector = NetworkCollector::new(&command, "python").unwrap();
    let ctx = RunContext::start(None, None, false);

    let sink = collector
        .spawn(ctx, TimeSeriesSink::in_memory(), Shutdown::never())
        .await
        .unwrap();

    assert!(sink.is_finalized());
    assert_eq!(sink.emitted(), 0);
}

#[tokio::test]
async fn stop_request_ends_a_silent_tool() {
    let collector = shell("exec sleep 30", "python");
    let ctx = RunContext::start(None, None, false);
    let (trigger, stop) = shutdown::channel();
    let started = Instant::now();

    let task = collector.spawn(ctx, TimeSeriesSink::in_memory(), stop);
    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.trigger();
    let sink = task.await.unwrap();

    assert!(sink.is_finalized());
    assert!(sink.series().is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn duration_limit_ends_collection() {
    let collector = shell("exec sleep 30", "python");
    let ctx = RunContext::start(Some(Duration::from_millis(200)), None, false);
    let started = Instant::now();

    let sink = collector
        .spawn(ctx, TimeSeriesSink::in_memory(), Shutdown::never())
        .await
        .unwrap();

    assert!(sink.is_finalized());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn tool_exiting_without_output_ends_the_series() {
    let collector = shell("exit 3", "python");
    let ctx = RunContext::start(Some(Duration::from_secs(30)), None, false);
    let started = Instant::now();

    let sink = collector
        .spawn(ctx, TimeSeriesSink::in_memory(), Shutdown::never())
        .await
        .unwrap();

    assert!(sink.is_finalized());
    assert_eq!(sink.emitted(), 0);
    assert!(started.elapsed() < Duration::from_secs(10));
}
