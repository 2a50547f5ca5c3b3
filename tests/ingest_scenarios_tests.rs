// Integration tests for the ingestion pipeline: reader + classifier + aggregator
// driven end-to-end through JSON-lines trace files.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use trace_ingest::config::ReaderConfig;
use trace_ingest::error::TraceError;
use trace_ingest::event::{is_valid_id, EventFlags, TraceEvent, INVALID_ID};
use trace_ingest::reader::{read_trace_file, TraceReader};
use trace_ingest::string_pool::StringPool;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn write_trace(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("trace.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Read a whole file, collecting every delivered event
fn collect(path: &PathBuf, pool: &mut StringPool) -> Vec<TraceEvent> {
    let mut events = Vec::new();
    let outcome = read_trace_file(path, pool, |_, _, event| {
        events.push(event.clone());
        0
    })
    .unwrap();
    assert_eq!(outcome.status, 0);
    events
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_start_and_fence_signal_are_linked() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"event","pid":10,"cpu":0,"ts":100,"system":"amdgpu_cs_ioctl","name":"job","fields":[["ctx","5"],["seqno","1"]]}"#,
            r#"{"type":"event","pid":10,"cpu":0,"ts":150,"system":"fence","name":"fence_signaled","fields":[["ctx","5"],["seqno","1"]]}"#,
        ],
    );

    let mut pool = StringPool::new();
    let events = collect(&path, &mut pool);
    assert_eq!(events.len(), 2);

    let done = &events[1];
    assert!(done.flags.contains(EventFlags::FENCE_SIGNALED));
    assert_eq!(done.id_start, events[0].id);
    assert_eq!(done.duration, 50);
    assert_eq!(done.context, 5);
}

#[test]
fn test_ctx_groups_jobs_by_context() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"event","pid":10,"cpu":0,"ts":100,"system":"amdgpu_cs_ioctl","name":"job","fields":[["ctx","5"],["seqno","1"]]}"#,
            r#"{"type":"event","pid":11,"cpu":1,"ts":110,"system":"amdgpu_cs_ioctl","name":"job","fields":[["ctx","6"],["seqno","1"]]}"#,
            r#"{"type":"event","pid":10,"cpu":0,"ts":130,"system":"fence","name":"fence_signaled","fields":[["ctx","5"],["seqno","1"]]}"#,
        ],
    );

    let mut pool = StringPool::new();
    let events = collect(&path, &mut pool);
    assert_eq!(events[2].id_start, events[0].id);
    assert_eq!(events[2].duration, 30);
    assert_eq!(
        events.iter().map(|e| e.context).collect::<Vec<_>>(),
        vec![5, 6, 5]
    );
}

#[test]
fn test_unknown_event_is_unflagged() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[r#"{"type":"event","pid":1,"cpu":0,"ts":5,"system":"mystery","name":"whatever","fields":[["a","b"]]}"#],
    );

    let mut pool = StringPool::new();
    let events = collect(&path, &mut pool);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].flags, EventFlags::empty());
    assert_eq!(events[0].id_start, INVALID_ID);
}

#[test]
fn test_vblank_without_crtc() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[r#"{"type":"event","pid":0,"cpu":3,"ts":5,"system":"drm","name":"drm_vblank_event","fields":[["seq","12"]]}"#],
    );

    let mut pool = StringPool::new();
    let events = collect(&path, &mut pool);
    assert!(events[0].is_vblank());
    assert_eq!(events[0].crtc, -1);
}

#[test]
fn test_early_stop_on_third_event() {
    let mut pool = StringPool::new();
    let mut delivered = 0;
    let outcome = read_trace_file(fixture("gpu_capture.jsonl"), &mut pool, |_, _, _| {
        delivered += 1;
        if delivered == 3 {
            1
        } else {
            0
        }
    })
    .unwrap();

    assert_eq!(delivered, 3);
    assert_eq!(outcome.status, 1);
    assert_eq!(outcome.events_delivered, 3);
}

#[test]
fn test_custom_stop_code_propagates() {
    let mut pool = StringPool::new();
    let outcome = read_trace_file(fixture("gpu_capture.jsonl"), &mut pool, |_, _, _| -7).unwrap();
    assert_eq!(outcome.status, -7);
    assert_eq!(outcome.events_delivered, 1);
}

// ============================================================================
// Full capture
// ============================================================================

#[test]
fn test_gpu_capture_end_to_end() {
    let mut pool = StringPool::new();
    let mut events = Vec::new();
    let outcome = read_trace_file(fixture("gpu_capture.jsonl"), &mut pool, |_, _, event| {
        events.push(event.clone());
        0
    })
    .unwrap();

    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.events_delivered, 9);
    assert_eq!(outcome.records_skipped, 0);
    assert_eq!(outcome.link_stats.linked, 3);

    let info = &outcome.info;
    assert_eq!(info.cpus, 2);
    assert_eq!(info.uname, "Linux 6.8.0-amdgpu x86_64");
    assert!(!info.timestamp_in_us);
    assert_eq!(info.cpustats.len(), 2);
    assert_eq!(info.tgid_children(2001), Some(&[2001, 2004][..]));
    assert!(info.file.ends_with("gpu_capture.jsonl"));

    // SW queue -> HW queue -> Execution
    let (sw, hw, exec) = (&events[0], &events[1], &events[2]);
    assert!(sw.flags.contains(EventFlags::IS_SW_QUEUE));
    assert!(hw.flags.contains(EventFlags::IS_HW_QUEUE));
    assert!(exec.is_fence_signaled());
    assert_eq!(hw.id_start, sw.id);
    assert_eq!(hw.duration, 300);
    assert_eq!(exec.id_start, hw.id);
    assert_eq!(exec.duration, 600);
    assert_eq!(pool.resolve(sw.timeline), Some("gfx"));

    // Worker thread of glxgears resolves the leader's name
    assert_eq!(pool.resolve(sw.comm), Some("glxgears:cs0"));
    assert_eq!(pool.resolve(sw.user_comm), Some("glxgears"));

    let vblank = &events[3];
    assert!(vblank.is_vblank());
    assert_eq!(vblank.crtc, 0);

    let print = &events[4];
    assert!(print.is_ftrace_print());
    assert_eq!(print.field(&pool, "buf"), Some("frame 1 submitted"));
    assert_eq!(print.user_comm, None);

    // Second job goes straight from SW queue to fence
    assert_eq!(events[7].id_start, events[5].id);
    assert_eq!(events[7].duration, 400);

    assert!(events[6].flags.is_empty());
    assert_eq!(events[8].crtc, -1);

    // Fence events have no comm of their own; pid 0 picked one up from run_job
    assert_eq!(pool.resolve(exec.comm), Some("gfx"));
}

#[test]
fn test_ids_unique_and_increasing() {
    let mut pool = StringPool::new();
    let events = collect(&fixture("gpu_capture.jsonl"), &mut pool);
    for pair in events.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
    assert!(events.iter().all(|e| is_valid_id(e.id)));
}

#[test]
fn test_linkage_points_backwards() {
    let mut pool = StringPool::new();
    let events = collect(&fixture("gpu_capture.jsonl"), &mut pool);
    for event in events.iter().filter(|e| e.has_start()) {
        let start = events.iter().find(|s| s.id == event.id_start).unwrap();
        assert!(start.id < event.id);
        assert!(start.ts <= event.ts);
        assert_eq!(event.duration, (event.ts - start.ts) as u64);
        assert_eq!(start.timeline, event.timeline);
        assert_eq!(start.context, event.context);
    }
}

#[test]
fn test_handles_stay_valid_after_read() {
    let mut pool = StringPool::new();
    let events = collect(&fixture("gpu_capture.jsonl"), &mut pool);
    for event in &events {
        assert!(pool.resolve(event.name).is_some());
        assert!(pool.resolve(event.system).is_some());
        for field in &event.fields {
            assert!(pool.get(field.key).is_some());
            assert!(pool.get(field.value).is_some());
        }
    }
    // "gfx" appears many times in the capture but is stored once
    let stats = pool.stats();
    assert!(stats.hits > 0);
}

#[test]
fn test_rename_updates_comm_for_later_events() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"saved_cmdline","pid":50,"comm":"wine"}"#,
            r#"{"type":"event","pid":50,"cpu":0,"ts":1,"system":"sched","name":"sched_switch"}"#,
            r#"{"type":"event","pid":50,"cpu":0,"ts":2,"system":"task","name":"task_rename","fields":[["pid","50"],["oldcomm","wine"],["newcomm","game.exe"]]}"#,
            r#"{"type":"event","pid":50,"cpu":0,"ts":3,"system":"sched","name":"sched_switch"}"#,
        ],
    );

    let mut pool = StringPool::new();
    let events = collect(&path, &mut pool);
    assert_eq!(pool.resolve(events[0].comm), Some("wine"));
    assert_eq!(pool.resolve(events[2].comm), Some("game.exe"));
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let mut pool = StringPool::new();
    let mut calls = 0;
    let result = read_trace_file(dir.path().join("nope.jsonl"), &mut pool, |_, _, _| {
        calls += 1;
        0
    });
    assert!(matches!(result, Err(TraceError::Open { .. })));
    assert_eq!(calls, 0);
}

#[test]
fn test_malformed_lines_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"event","pid":1,"cpu":0,"ts":1,"system":"a","name":"b"}"#,
            r#"{"type":"event","pid":1,"cpu":0,"ts":"#,
            r#"{"type":"event","pid":1,"cpu":0,"ts":3,"system":"a","name":"b"}"#,
        ],
    );

    let mut pool = StringPool::new();
    let outcome = read_trace_file(&path, &mut pool, |_, _, _| 0).unwrap();
    assert_eq!(outcome.events_delivered, 2);
    assert_eq!(outcome.records_skipped, 1);
}

#[test]
fn test_invalid_utf8_line_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.jsonl");
    let mut bytes = br#"{"type":"event","pid":1,"cpu":0,"ts":1,"system":"a","name":"b"}"#.to_vec();
    bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
    bytes.extend_from_slice(br#"{"type":"event","pid":1,"cpu":0,"ts":3,"system":"a","name":"b"}"#);
    bytes.push(b'\n');
    fs::write(&path, bytes).unwrap();

    let mut pool = StringPool::new();
    let outcome = read_trace_file(&path, &mut pool, |_, _, _| 0).unwrap();
    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.events_delivered, 2);
    assert_eq!(outcome.records_skipped, 1);

    let reader = TraceReader::new(ReaderConfig::strict()).unwrap();
    let result = reader.read_file(&path, &mut StringPool::new(), |_, _, _| 0);
    assert!(matches!(result, Err(TraceError::Corrupt { line: 2, .. })));
}

#[test]
fn test_malformed_lines_fatal_when_strict() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"event","pid":1,"cpu":0,"ts":1,"system":"a","name":"b"}"#,
            "garbage",
            r#"{"type":"event","pid":1,"cpu":0,"ts":3,"system":"a","name":"b"}"#,
        ],
    );

    let reader = TraceReader::new(ReaderConfig::strict()).unwrap();
    let mut pool = StringPool::new();
    let mut calls = 0;
    let result = reader.read_file(&path, &mut pool, |_, _, _| {
        calls += 1;
        0
    });
    assert!(matches!(result, Err(TraceError::Corrupt { line: 2, .. })));
    assert_eq!(calls, 1);
}

#[test]
fn test_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write_trace(&dir, &[]);
    let mut pool = StringPool::new();
    let outcome = read_trace_file(&path, &mut pool, |_, _, _| 0).unwrap();
    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.events_delivered, 0);
    assert_eq!(outcome.info.cpus, 0);
}

#[test]
fn test_config_file_markers() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("ingest.toml");
    fs::write(
        &config_path,
        "[classifier]\nsw_queue_event = \"i915_request_queue\"\nhw_queue_event = \"i915_request_in\"\n",
    )
    .unwrap();
    let path = write_trace(
        &dir,
        &[
            r#"{"type":"event","pid":1,"cpu":0,"ts":10,"system":"i915","name":"i915_request_queue","fields":[["context","3"],["seqno","8"]]}"#,
            r#"{"type":"event","pid":1,"cpu":0,"ts":25,"system":"i915","name":"i915_request_in","fields":[["context","3"],["seqno","8"]]}"#,
        ],
    );

    let config = ReaderConfig::from_toml_file(&config_path).unwrap();
    let reader = TraceReader::new(config).unwrap();
    let mut pool = StringPool::new();
    let mut events = Vec::new();
    reader
        .read_file(&path, &mut pool, |_, _, event| {
            events.push(event.clone());
            0
        })
        .unwrap();

    assert!(events[0].flags.contains(EventFlags::IS_SW_QUEUE));
    assert!(events[1].flags.contains(EventFlags::IS_HW_QUEUE));
    assert_eq!(events[1].id_start, events[0].id);
    assert_eq!(events[1].duration, 15);
}
