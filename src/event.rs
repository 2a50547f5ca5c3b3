//! Classified trace event record
//!
//! A [`TraceEvent`] is built once per decoded event by the classifier and
//! handed to the consumer callback by reference. Textual attributes are
//! [`StrId`] handles into the session's [`StringPool`].

use crate::string_pool::{StrId, StringPool};
use bitflags::bitflags;

/// Sentinel id that is never assigned to a real event
pub const INVALID_ID: u32 = u32::MAX;

/// Whether `id` refers to an event (i.e. is not [`INVALID_ID`])
#[inline]
pub fn is_valid_id(id: u32) -> bool {
    id != INVALID_ID
}

bitflags! {
    /// Semantic classification of an event
    ///
    /// Bit values are stable. Bits 0x01..=0x80 mirror the kernel irq/resched
    /// record flags and 0x800 is unassigned; both ranges stay zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const FTRACE_PRINT = 0x100;
        const IS_VBLANK = 0x200;
        const IS_TIMELINE = 0x400;
        /// amdgpu_cs_ioctl
        const IS_SW_QUEUE = 0x1000;
        /// amdgpu_sched_run_job
        const IS_HW_QUEUE = 0x2000;
        /// *fence_signaled
        const FENCE_SIGNALED = 0x4000;
    }
}

/// One raw key/value pair retained on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventField {
    pub key: StrId,
    pub value: StrId,
}

/// A classified trace event
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    /// Session-unique sequence number
    pub id: u32,
    pub pid: i32,
    pub cpu: u32,
    /// Timestamp, in us or ns depending on `TraceInfo::timestamp_in_us`
    pub ts: i64,

    pub flags: EventFlags,

    /// Event that opened the sequence this event completes, or [`INVALID_ID`]
    pub id_start: u32,
    /// `ts - start.ts`; only meaningful when `id_start` is valid
    pub duration: u64,
    pub graph_row_id: u32,
    pub color: u32,

    pub comm: Option<StrId>,
    pub system: Option<StrId>,
    pub name: Option<StrId>,
    /// Timeline lane (gfx, sdma0, ...)
    pub timeline: Option<StrId>,
    /// Thread-group leader's comm when this event came from a non-leader thread
    pub user_comm: Option<StrId>,

    /// drm_vblank_event crtc, or -1
    pub crtc: i32,
    pub context: u32,
    pub seqno: u32,

    pub fields: Vec<EventField>,

    /// Set by downstream filtering; the classifier always leaves it false
    pub is_filtered_out: bool,
}

impl Default for TraceEvent {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            pid: 0,
            cpu: 0,
            ts: 0,
            flags: EventFlags::empty(),
            id_start: INVALID_ID,
            duration: 0,
            graph_row_id: 0,
            color: 0,
            comm: None,
            system: None,
            name: None,
            timeline: None,
            user_comm: None,
            crtc: -1,
            context: 0,
            seqno: 0,
            fields: Vec::new(),
            is_filtered_out: false,
        }
    }
}

impl TraceEvent {
    pub fn is_fence_signaled(&self) -> bool {
        self.flags.contains(EventFlags::FENCE_SIGNALED)
    }

    pub fn is_ftrace_print(&self) -> bool {
        self.flags.contains(EventFlags::FTRACE_PRINT)
    }

    pub fn is_vblank(&self) -> bool {
        self.flags.contains(EventFlags::IS_VBLANK)
    }

    pub fn is_timeline(&self) -> bool {
        self.flags.contains(EventFlags::IS_TIMELINE)
    }

    /// Whether this event completes an earlier one
    pub fn has_start(&self) -> bool {
        is_valid_id(self.id_start)
    }

    /// Display name of the timeline row this event is drawn on
    pub fn timeline_name<'a>(&self, default: Option<&'a str>) -> Option<&'a str> {
        if self.flags.contains(EventFlags::IS_SW_QUEUE) {
            Some("SW queue")
        } else if self.flags.contains(EventFlags::IS_HW_QUEUE) {
            Some("HW queue")
        } else if self.is_fence_signaled() {
            Some("Execution")
        } else {
            default
        }
    }

    /// Value of the first field named `name`
    pub fn field<'p>(&self, pool: &'p StringPool, name: &str) -> Option<&'p str> {
        get_event_field_val(pool, self, name)
    }
}

/// Linear scan over `event.fields` for the first field whose key is `name`
///
/// Returns `None` when no such field exists. Field keys are interned, so a
/// name the pool has never seen cannot match.
pub fn get_event_field_val<'p>(
    pool: &'p StringPool,
    event: &TraceEvent,
    name: &str,
) -> Option<&'p str> {
    let key = pool.lookup(name)?;
    event
        .fields
        .iter()
        .find(|field| field.key == key)
        .and_then(|field| pool.get(field.value))
}
