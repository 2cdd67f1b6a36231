use cira_runtime::observability::MetricsCollector;

#[test]
fn test_execution_record_accumulates() {
    let collector = MetricsCollector::new();

    collector.record_execution("adxl345-sensor", 2.0);
    collector.record_execution("adxl345-sensor", 4.0);
    collector.record_execution("adxl345-sensor", 6.0);

    let record = collector
        .block_metrics("adxl345-sensor")
        .expect("record exists");
    assert_eq!(record.execution_count, 3);
    assert_eq!(record.total_latency_ms, 12.0);
    assert_eq!(record.avg_latency_ms, 4.0);
    assert!(record.last_execution_time > 0);
}

#[test]
fn test_execution_count_is_monotonic() {
    let collector = MetricsCollector::new();

    let mut previous = 0;
    for i in 1..=50u64 {
        collector.record_execution("block", 1.0);
        let record = collector.block_metrics("block").expect("record exists");
        assert!(record.execution_count > previous);
        previous = record.execution_count;
        assert_eq!(record.avg_latency_ms, record.total_latency_ms / i as f64);
    }
}

#[test]
fn test_output_record_overwrites_last_value() {
    let collector = MetricsCollector::new();

    collector.record_output("bme280-sensor", "temperature", "21.5".into(), "float".into());
    collector.record_output("bme280-sensor", "temperature", "22".into(), "float".into());

    let record = collector
        .block_metrics("bme280-sensor")
        .expect("record exists");
    assert_eq!(record.last_output_value, "22");
    assert_eq!(record.last_output_type, "float");
    // Output records alone do not count as executions.
    assert_eq!(record.execution_count, 0);
}

#[test]
fn test_snapshot_is_sorted_and_stamped() {
    let collector = MetricsCollector::new();
    collector.record_execution("zeta-block", 1.0);
    collector.record_execution("alpha-block", 1.0);

    let snapshot = collector.snapshot();
    let ids: Vec<_> = snapshot.blocks.iter().map(|b| b.block_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha-block", "zeta-block"]);
    assert!(snapshot.timestamp > 0);
}

#[test]
fn test_snapshot_serializes() {
    let collector = MetricsCollector::new();
    collector.record_execution("block", 1.5);
    collector.record_output("block", "out", "1.5".into(), "float".into());

    let json = serde_json::to_value(collector.snapshot()).expect("serializes");
    assert!(json["blocks"][0]["execution_count"].is_u64());
    assert_eq!(json["blocks"][0]["last_output_value"], "1.5");
    assert!(json["system"]["uptime_seconds"].is_u64());
    assert!(json["timestamp"].is_u64());
}

#[test]
fn test_reset_block_and_reset_all() {
    let collector = MetricsCollector::new();
    collector.record_execution("a", 1.0);
    collector.record_execution("b", 1.0);

    collector.reset_block("a");
    assert!(collector.block_metrics("a").is_none());
    assert!(collector.block_metrics("b").is_some());

    collector.reset();
    assert!(collector.block_metrics("b").is_none());

    // Reset also restarts the uptime clock.
    let snapshot = collector.snapshot();
    assert!(snapshot.blocks.is_empty());
    assert_eq!(snapshot.system.uptime_seconds, 0);
}
