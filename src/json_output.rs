//! JSON output format for classified events
//!
//! `--format json` implementation. Interned handles are resolved to text so
//! the output is self-contained.

use crate::classifier::LinkStats;
use crate::event::{is_valid_id, TraceEvent};
use crate::string_pool::StringPool;
use crate::trace_info::TraceInfo;
use serde::{Deserialize, Serialize};

/// A single classified event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEvent {
    pub id: u32,
    pub pid: i32,
    pub cpu: u32,
    pub ts: i64,
    pub system: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_comm: Option<String>,
    /// Raw flag bits
    pub flags: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    /// Timeline row name (SW queue / HW queue / Execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<String>,
    /// Id of the event this one completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crtc: Option<i32>,
    pub fields: Vec<(String, String)>,
}

impl JsonEvent {
    /// Resolve a classified event against its pool
    pub fn from_event(pool: &StringPool, event: &TraceEvent) -> Self {
        let text = |id| pool.resolve(id).map(str::to_string);
        let linked = is_valid_id(event.id_start);

        Self {
            id: event.id,
            pid: event.pid,
            cpu: event.cpu,
            ts: event.ts,
            system: text(event.system).unwrap_or_default(),
            name: text(event.name).unwrap_or_default(),
            comm: text(event.comm),
            user_comm: text(event.user_comm),
            flags: event.flags.bits(),
            timeline: text(event.timeline),
            row: event.timeline_name(None).map(str::to_string),
            id_start: linked.then_some(event.id_start),
            duration: linked.then_some(event.duration),
            crtc: (event.crtc >= 0).then_some(event.crtc),
            fields: event
                .fields
                .iter()
                .map(|f| {
                    (
                        pool.get(f.key).unwrap_or_default().to_string(),
                        pool.get(f.value).unwrap_or_default().to_string(),
                    )
                })
                .collect(),
        }
    }
}

/// Capture-wide metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTraceInfo {
    pub file: String,
    pub cpus: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uname: String,
    pub timestamp_in_us: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpustats: Vec<String>,
}

impl From<&TraceInfo> for JsonTraceInfo {
    fn from(info: &TraceInfo) -> Self {
        Self {
            file: info.file.clone(),
            cpus: info.cpus,
            uname: info.uname.clone(),
            timestamp_in_us: info.timestamp_in_us,
            cpustats: info.cpustats.clone(),
        }
    }
}

/// Summary statistics for the read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total_events: u64,
    /// Events hidden by the event filter
    pub filtered_out: u64,
    pub records_skipped: u64,
    pub linked: u64,
    pub orphaned_starts: u64,
    pub unmatched_completions: u64,
    /// HW queue events that had no SW queue start to close
    pub relays_without_start: u64,
    /// Non-zero when the read was stopped early
    pub status: i32,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<JsonTraceInfo>,
    pub events: Vec<JsonEvent>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output structure
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "trace-ingest-json-v1".to_string(),
            info: None,
            events: Vec::new(),
            summary: JsonSummary::default(),
        }
    }

    /// Add an event; filtered events are only counted
    pub fn add_event(&mut self, pool: &StringPool, event: &TraceEvent) {
        self.summary.total_events += 1;
        if event.is_filtered_out {
            self.summary.filtered_out += 1;
            return;
        }
        self.events.push(JsonEvent::from_event(pool, event));
    }

    /// Fill in session metadata once the read has finished
    pub fn finish(&mut self, info: &TraceInfo, link: &LinkStats, skipped: u64, status: i32) {
        self.info = Some(JsonTraceInfo::from(info));
        self.summary.records_skipped = skipped;
        self.summary.linked = link.linked;
        self.summary.orphaned_starts = link.orphaned_starts;
        self.summary.unmatched_completions = link.unmatched_completions;
        self.summary.relays_without_start = link.relays_without_start;
        self.summary.status = status;
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}
