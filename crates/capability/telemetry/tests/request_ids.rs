use gw_telemetry::{metrics, new_request_ids, record_acknowledge, record_scheduler_tick};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_are_monotonic() {
    let before = metrics().snapshot();
    record_acknowledge(true);
    record_acknowledge(false);
    record_scheduler_tick(true);
    let after = metrics().snapshot();
    assert!(after.alarms_acknowledged > before.alarms_acknowledged);
    assert!(after.alarms_not_acknowledged > before.alarms_not_acknowledged);
    assert!(after.scheduler_ticks > before.scheduler_ticks);
    assert!(after.scheduler_tick_failures > before.scheduler_tick_failures);
}
