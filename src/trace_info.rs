//! Capture-wide metadata accumulated during a read
//!
//! [`TraceInfo`] is built incrementally as records stream through the reader:
//! CPU count, host identification, timestamp scale and the process tables
//! (tgid → child pids, pid → tgid, pid → comm) needed to resolve user-space
//! names for kernel threads and worker threads.

use crate::decoder::RawEvent;
use crate::keyed_map::KeyedMap;
use crate::string_pool::{StrId, StringPool};

/// Metadata for one trace read session
#[derive(Debug, Clone, Default)]
pub struct TraceInfo {
    /// Highest CPU index seen plus one
    pub cpus: u32,
    /// Source path (informational)
    pub file: String,
    pub uname: String,
    pub timestamp_in_us: bool,
    pub cpustats: Vec<String>,

    tgid_pids: KeyedMap<i32, Vec<i32>>,
    pid_tgid_map: KeyedMap<i32, i32>,
    pid_comm_map: KeyedMap<i32, StrId>,
    pid_event_counts: KeyedMap<i32, u64>,
}

impl TraceInfo {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    /// Record that `cpu` was referenced by an event
    pub fn observe_cpu(&mut self, cpu: u32) {
        self.cpus = self.cpus.max(cpu.saturating_add(1));
    }

    /// Count an event for `pid`, registering the pid on first sight
    ///
    /// Returns true when the pid was not known before.
    pub fn register_pid(&mut self, pid: i32) -> bool {
        let count = self.pid_event_counts.get_or_insert(pid, 0);
        *count += 1;
        *count == 1
    }

    /// Record that `pid` belongs to thread group `tgid`
    ///
    /// The child list of a tgid is append-only and holds each pid at most
    /// once; pid → tgid is last write wins.
    pub fn add_tgid_pid(&mut self, tgid: i32, pid: i32) {
        let children = self.tgid_pids.get_or_insert(tgid, Vec::new());
        if !children.contains(&pid) {
            children.push(pid);
        }
        self.pid_tgid_map.set(pid, tgid);
    }

    /// Record the command name of `pid` (last write wins)
    pub fn set_comm(&mut self, pid: i32, comm: StrId) {
        self.pid_comm_map.set(pid, comm);
    }

    pub fn tgid_children(&self, tgid: i32) -> Option<&[i32]> {
        self.tgid_pids.get(&tgid).map(Vec::as_slice)
    }

    pub fn tgid_of(&self, pid: i32) -> Option<i32> {
        self.pid_tgid_map.get(&pid).copied()
    }

    pub fn comm_of(&self, pid: i32) -> Option<StrId> {
        self.pid_comm_map.get(&pid).copied()
    }

    /// Number of events seen for `pid`
    pub fn pid_event_count(&self, pid: i32) -> u64 {
        self.pid_event_counts.get(&pid).copied().unwrap_or(0)
    }

    /// Number of distinct pids that produced events
    pub fn pid_count(&self) -> usize {
        self.pid_event_counts.len()
    }

    /// Comm of the thread-group leader of `pid`, when `pid` is not the leader
    pub fn leader_comm(&self, pid: i32) -> Option<StrId> {
        match self.tgid_of(pid) {
            Some(tgid) if tgid != pid => self.comm_of(tgid),
            _ => None,
        }
    }

    /// Fold one raw event into the session metadata
    ///
    /// Learns the CPU count, registers the pid and picks up any process
    /// relationship the record carries: an explicit tgid (or `tgid` /
    /// `common_tgid` field), the record's comm, and the fork/rename
    /// tracepoints that announce a new name for some other pid.
    pub fn observe_event(&mut self, raw: &RawEvent, pool: &mut StringPool) {
        self.observe_cpu(raw.cpu);
        if self.register_pid(raw.pid) {
            tracing::trace!(pid = raw.pid, "new pid");
        }

        let tgid = raw.tgid.or_else(|| {
            raw.field("tgid")
                .or_else(|| raw.field("common_tgid"))
                .and_then(|v| parse_int::<i32>(v))
        });
        if let Some(tgid) = tgid {
            self.add_tgid_pid(tgid, raw.pid);
        }

        if let Some(comm) = raw.comm.as_deref() {
            let id = pool.intern(comm);
            self.set_comm(raw.pid, id);
        }

        match raw.name.as_str() {
            "sched_process_fork" => {
                let child = raw.field("child_pid").and_then(parse_int::<i32>);
                if let (Some(child), Some(comm)) = (child, raw.field("child_comm")) {
                    let id = pool.intern(comm);
                    self.set_comm(child, id);
                }
            }
            "task_rename" => {
                let pid = raw.field("pid").and_then(parse_int::<i32>);
                if let (Some(pid), Some(comm)) = (pid, raw.field("newcomm")) {
                    let id = pool.intern(comm);
                    self.set_comm(pid, id);
                }
            }
            _ => {}
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer field value
pub(crate) fn parse_int<T>(value: &str) -> Option<T>
where
    T: TryFrom<i64>,
{
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    let signed = if negative { -magnitude } else { magnitude };
    T::try_from(signed).ok()
}
