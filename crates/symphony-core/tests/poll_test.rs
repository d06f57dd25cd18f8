// Polling cycle against a scripted transport.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{
    MockTransport, RecordingSurface, Reply, Script, SurfaceHandle, answering, gateway, read_reply,
    service,
};
use symphony_api::Gateway;
use symphony_api::protocol::READ_REGISTERS_VERSION;
use symphony_core::setpoint::{self, SetpointHandle, SetpointQueues};
use symphony_core::{
    CoreError, Cycle, CycleReport, PlatformProtocol, TransactionCounter, UnitId, UnitRegistry,
    diff,
};

// ── Helpers ─────────────────────────────────────────────────────────

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

fn roster() -> Vec<Value> {
    vec![gateway("A1", "Living Room"), gateway("B2", "Basement")]
}

fn setup(surface: &Arc<RecordingSurface>) -> (UnitRegistry, SetpointHandle, SetpointQueues) {
    let (handle, queues) = setpoint::channel();
    let registry = UnitRegistry::new(
        Arc::new(SurfaceHandle(Arc::clone(surface))),
        Arc::new(handle.clone()),
    );
    let gateways: Vec<Gateway> = roster()
        .into_iter()
        .map(|g| serde_json::from_value(g).unwrap())
        .collect();
    registry.apply_diff(&diff(&[], &gateways));
    (registry, handle, queues)
}

async fn run_cycle(
    script: Script,
    registry: &UnitRegistry,
    queues: &mut SetpointQueues,
) -> (Result<CycleReport, CoreError>, Vec<Value>) {
    let (mut transport, sent) = MockTransport::new(script);
    let counter = TransactionCounter::new();
    let result = Cycle {
        transport: &mut transport,
        session_id: "s3cr3t",
        counter: &counter,
        registry,
        receive_timeout: RECEIVE_TIMEOUT,
        verbose: true,
    }
    .run(queues)
    .await;
    let sent = sent.lock().unwrap().clone();
    (result, sent)
}

fn unit(id: &str) -> UnitId {
    UnitId::from_gateway_id(id)
}

// ── Cycle ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_cycle_reads_every_unit_in_order() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let (result, sent) = run_cycle(service(roster()), &registry, &mut queues).await;

    assert_eq!(
        result.unwrap(),
        CycleReport {
            units: 2,
            reads: 2,
            ..CycleReport::default()
        }
    );
    let asked: Vec<(&str, &str)> = sent
        .iter()
        .map(|v| (v["cmd"].as_str().unwrap(), v["awlid"].as_str().unwrap()))
        .collect();
    assert_eq!(asked, [("read", "A1"), ("read", "B2")]);
    assert_eq!(sent[0]["tid"], json!(2));
    assert_eq!(sent[1]["tid"], json!(3));
    assert_eq!(sent[0]["sessionid"], json!("s3cr3t"));

    let record = registry.get(&unit("A1")).unwrap();
    assert_eq!(record.last_read.as_ref().unwrap().room_temp, 69.5);
    assert_eq!(record.read_version, Some(READ_REGISTERS_VERSION));
    assert!(record.refreshed_at.is_some());
    assert_eq!(surface.count("refresh "), 2);
}

#[tokio::test(start_paused = true)]
async fn test_latest_setpoint_wins_and_is_written_before_read() {
    let surface = RecordingSurface::new();
    let (registry, handle, mut queues) = setup(&surface);

    handle.set_heating_setpoint(&unit("A1"), 68.0);
    handle.set_heating_setpoint(&unit("A1"), 70.0);

    let (result, sent) = run_cycle(service(roster()), &registry, &mut queues).await;
    let report = result.unwrap();
    assert_eq!(report.writes, 1);
    assert_eq!(report.reads, 2);

    let writes: Vec<&Value> = sent.iter().filter(|v| v["cmd"] == "write").collect();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0]["awlid"], json!("A1"));
    assert_eq!(writes[0]["heatingsp_write"], json!(70.0));
    assert!(writes[0].get("coolingsp_write").is_none());

    let first_two: Vec<&str> = sent[..2].iter().map(|v| v["cmd"].as_str().unwrap()).collect();
    assert_eq!(first_two, ["write", "read"]);
    assert_eq!(sent[1]["awlid"], json!("A1"));

    // Queues were drained by the cycle.
    let (_, sent) = run_cycle(service(roster()), &registry, &mut queues).await;
    assert!(sent.iter().all(|v| v["cmd"] == "read"));
}

#[tokio::test(start_paused = true)]
async fn test_heating_and_cooling_share_one_write() {
    let surface = RecordingSurface::new();
    let (registry, handle, mut queues) = setup(&surface);

    handle.set_cooling_setpoint(&unit("B2"), 76.0);
    handle.set_heating_setpoint(&unit("B2"), 66.0);

    let (result, sent) = run_cycle(service(roster()), &registry, &mut queues).await;
    assert_eq!(result.unwrap().writes, 1);

    let write = sent.iter().find(|v| v["cmd"] == "write").unwrap();
    assert_eq!(write["awlid"], json!("B2"));
    assert_eq!(write["heatingsp_write"], json!(66.0));
    assert_eq!(write["coolingsp_write"], json!(76.0));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_on_one_unit_does_not_stop_the_cycle() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let healthy = service(roster());
    let script: Script = Arc::new(move |cmd: &Value| {
        if cmd["awlid"] == "A1" {
            Reply::Hang
        } else {
            healthy(cmd)
        }
    });

    let (result, sent) = run_cycle(script, &registry, &mut queues).await;
    let report = result.unwrap();
    assert_eq!(report.failures, 1);
    assert_eq!(report.reads, 1);
    assert_eq!(sent.len(), 2);

    assert!(registry.get(&unit("A1")).unwrap().last_read.is_none());
    assert!(registry.get(&unit("B2")).unwrap().last_read.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_is_not_taken_for_the_next_unit() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let healthy = service(roster());
    let script: Script = Arc::new(move |cmd: &Value| {
        if cmd["awlid"] == "A1" {
            let mut reply = answering(cmd, read_reply("A1"));
            reply["tstatroomtemp"] = json!(55.0);
            Reply::Late(reply)
        } else {
            healthy(cmd)
        }
    });

    let (result, _) = run_cycle(script, &registry, &mut queues).await;
    assert_eq!(
        result.unwrap(),
        CycleReport {
            units: 2,
            reads: 1,
            failures: 1,
            ..CycleReport::default()
        }
    );

    assert!(registry.get(&unit("A1")).unwrap().last_read.is_none());
    let b2 = registry.get(&unit("B2")).unwrap();
    assert_eq!(b2.last_read.as_ref().unwrap().room_temp, 69.5);
    assert_eq!(surface.count("refresh awl-a1"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_does_not_shift_later_exchanges() {
    let surface = RecordingSurface::new();
    let (registry, handle, mut queues) = setup(&surface);

    let healthy = service(roster());
    let first = AtomicBool::new(true);
    let script: Script = Arc::new(move |cmd: &Value| {
        if cmd["cmd"] == "read" && cmd["awlid"] == "A1" && first.swap(false, Ordering::SeqCst) {
            Reply::Late(answering(cmd, read_reply("A1")))
        } else {
            healthy(cmd)
        }
    });
    let (mut transport, _) = MockTransport::new(script);
    let counter = TransactionCounter::new();

    let report = Cycle {
        transport: &mut transport,
        session_id: "s3cr3t",
        counter: &counter,
        registry: &registry,
        receive_timeout: RECEIVE_TIMEOUT,
        verbose: false,
    }
    .run(&mut queues)
    .await
    .unwrap();
    assert_eq!(report.failures, 1);

    handle.set_heating_setpoint(&unit("A1"), 70.0);
    let report = Cycle {
        transport: &mut transport,
        session_id: "s3cr3t",
        counter: &counter,
        registry: &registry,
        receive_timeout: RECEIVE_TIMEOUT,
        verbose: false,
    }
    .run(&mut queues)
    .await
    .unwrap();
    assert_eq!(
        report,
        CycleReport {
            units: 2,
            writes: 1,
            reads: 2,
            ..CycleReport::default()
        }
    );

    // Every refresh came from a read answering that unit's own request.
    let refreshes: Vec<String> = surface
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("refresh "))
        .collect();
    assert_eq!(
        refreshes,
        ["refresh awl-b2 69.5", "refresh awl-a1 69.5", "refresh awl-b2 69.5"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_reply_is_dropped_before_next_command() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let healthy = service(roster());
    let script: Script = Arc::new(move |cmd: &Value| match healthy(cmd) {
        Reply::Json(reply) if cmd["awlid"] == "A1" => Reply::Twice(reply),
        other => other,
    });

    let (result, _) = run_cycle(script, &registry, &mut queues).await;
    assert_eq!(result.unwrap().reads, 2);
    assert_eq!(surface.count("refresh awl-a1"), 1);
    assert_eq!(surface.count("refresh awl-b2"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_stream_fails_the_cycle() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let script: Script = Arc::new(|_: &Value| Reply::Close);
    let (result, sent) = run_cycle(script, &registry, &mut queues).await;

    assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
    // B2 is never asked once the stream is gone.
    assert_eq!(sent.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_reply_counts_as_failure() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    let healthy = service(roster());
    let script: Script = Arc::new(move |cmd: &Value| {
        if cmd["awlid"] == "B2" {
            Reply::Json(json!({ "rsp": "read", "awlid": "B2", "err": "unit offline" }))
        } else {
            healthy(cmd)
        }
    });

    let (result, _) = run_cycle(script, &registry, &mut queues).await;
    let report = result.unwrap();
    assert_eq!(report.reads, 1);
    assert_eq!(report.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_setpoint_for_unknown_unit_is_dropped() {
    let surface = RecordingSurface::new();
    let (registry, handle, mut queues) = setup(&surface);

    handle.set_heating_setpoint(&unit("ZZ9"), 71.0);

    let (result, sent) = run_cycle(service(roster()), &registry, &mut queues).await;
    let report = result.unwrap();
    assert_eq!(report.dropped_setpoints, 1);
    assert_eq!(report.writes, 0);
    assert!(sent.iter().all(|v| v["cmd"] == "read"));
}

#[tokio::test(start_paused = true)]
async fn test_reply_for_another_unit_is_not_applied() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);

    // The service answers every read with B2's data.
    let script: Script = Arc::new(|cmd: &Value| Reply::Json(answering(cmd, read_reply("B2"))));
    let (result, _) = run_cycle(script, &registry, &mut queues).await;
    let report = result.unwrap();
    assert_eq!(report.reads, 1);
    assert_eq!(report.failures, 1);

    assert!(registry.get(&unit("A1")).unwrap().last_read.is_none());
    assert!(registry.get(&unit("B2")).unwrap().last_read.is_some());
    assert_eq!(surface.count("refresh awl-b2"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_read_marks_offline_unit_online() {
    let surface = RecordingSurface::new();
    let (registry, _handle, mut queues) = setup(&surface);
    registry.set_all_offline();
    assert!(!registry.get(&unit("A1")).unwrap().online);

    let (result, _) = run_cycle(service(roster()), &registry, &mut queues).await;
    result.unwrap();

    assert!(registry.get(&unit("A1")).unwrap().online);
    let last = surface
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("online awl-a1"))
        .last()
        .unwrap();
    assert_eq!(last, "online awl-a1 true");
}
