//! Event classification and timeline linkage
//!
//! Turns a [`RawEvent`] into a [`TraceEvent`]:
//! 1. assigns the next session id
//! 2. interns all text through the [`StringPool`]
//! 3. derives [`EventFlags`] from the system/name markers
//! 4. links queue/fence events to the event that opened their sequence
//! 5. resolves `user_comm` from the thread-group leader
//!
//! ## Linkage
//!
//! GPU jobs show up as a chain of events sharing `(timeline, context, seqno)`:
//!
//! ```text
//! amdgpu_cs_ioctl  ──▶  amdgpu_sched_run_job  ──▶  *fence_signaled
//!   (SW queue)            (HW queue)                (execution done)
//! ```
//!
//! The SW queue event opens the sequence, the HW queue event closes the SW
//! step and opens the HW step, and the fence signal closes it. Each key has a
//! single pending slot: a new start for a key that is still pending replaces
//! the older one, which is then counted in [`LinkStats::orphaned_starts`].

use crate::config::ClassifierConfig;
use crate::decoder::RawEvent;
use crate::error::{Result, TraceError};
use crate::event::{EventField, EventFlags, TraceEvent, INVALID_ID};
use crate::keyed_map::KeyedMap;
use crate::string_pool::{StrId, StringPool};
use crate::trace_info::{parse_int, TraceInfo};

/// Short spelling of the context key used by some tracepoints
const CONTEXT_FIELD_ALIAS: &str = "ctx";

/// Grouping key of a linked sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LinkKey {
    timeline: Option<StrId>,
    context: u32,
    seqno: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingStart {
    id: u32,
    ts: i64,
}

/// Part an event plays in a linked sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkRole {
    None,
    /// Opens a sequence (SW queue)
    Start,
    /// Closes the previous step and opens the next (HW queue)
    Relay,
    /// Closes the sequence (fence signaled)
    Complete,
}

/// Linkage bookkeeping for a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Events that received a valid `id_start`
    pub linked: u64,
    /// Pending starts replaced by a newer start before being completed
    pub orphaned_starts: u64,
    /// Completion events with no pending start
    pub unmatched_completions: u64,
    /// HW queue events with no pending SW queue start
    pub relays_without_start: u64,
    /// Completions whose pending start had a later timestamp
    pub out_of_order: u64,
}

/// Stateful classifier for one read session
#[derive(Debug)]
pub struct EventClassifier {
    config: ClassifierConfig,
    next_id: u32,
    pending: KeyedMap<LinkKey, PendingStart>,
    stats: LinkStats,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            next_id: 0,
            pending: KeyedMap::new(),
            stats: LinkStats::default(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Number of events classified so far
    pub fn events_classified(&self) -> u64 {
        u64::from(self.next_id)
    }

    /// Sequences opened but not yet completed
    pub fn pending_starts(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Classify one raw event
    ///
    /// `info` must already reflect `raw` (see [`TraceInfo::observe_event`])
    /// so that a tgid or comm introduced by this very record is used.
    /// Missing or unparsable fields fall back to defaults; the only error is
    /// running out of event ids.
    pub fn classify(
        &mut self,
        raw: &RawEvent,
        info: &TraceInfo,
        pool: &mut StringPool,
    ) -> Result<TraceEvent> {
        let id = self.next_id()?;

        let mut event = TraceEvent {
            id,
            pid: raw.pid,
            cpu: raw.cpu,
            ts: raw.ts,
            comm: match raw.comm.as_deref() {
                Some(comm) => Some(pool.intern(comm)),
                None => info.comm_of(raw.pid),
            },
            system: Some(pool.intern(&raw.system)),
            name: Some(pool.intern(&raw.name)),
            user_comm: info.leader_comm(raw.pid),
            fields: Vec::with_capacity(raw.fields.len()),
            ..TraceEvent::default()
        };

        // First matching field wins, as in `get_event_field_val`
        let cfg = &self.config;
        event.timeline = raw.field(&cfg.timeline_field).map(|v| pool.intern(v));
        event.context = raw
            .field(&cfg.context_field)
            .or_else(|| raw.field(CONTEXT_FIELD_ALIAS))
            .and_then(parse_int)
            .unwrap_or(0);
        event.seqno = raw.field(&cfg.seqno_field).and_then(parse_int).unwrap_or(0);
        let crtc = raw.field(&cfg.crtc_field).and_then(parse_int::<i32>);

        for (key, value) in &raw.fields {
            event.fields.push(EventField {
                key: pool.intern(key),
                value: pool.intern(value),
            });
        }

        let role = self.classify_flags(raw, &mut event);
        if event.is_vblank() {
            event.crtc = crtc.unwrap_or(-1);
        }

        self.link(role, &mut event);
        Ok(event)
    }

    fn next_id(&mut self) -> Result<u32> {
        if self.next_id == INVALID_ID {
            return Err(TraceError::IdSpaceExhausted(u64::from(self.next_id)));
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    /// Set flags from the system/name markers and return the linkage role
    fn classify_flags(&self, raw: &RawEvent, event: &mut TraceEvent) -> LinkRole {
        let cfg = &self.config;
        let system = raw.system.as_str();
        let name = raw.name.as_str();

        if system == cfg.ftrace_print_system || (system == "ftrace" && name == "print") {
            event.flags |= EventFlags::FTRACE_PRINT;
        }

        if name == cfg.vblank_event {
            event.flags |= EventFlags::IS_VBLANK;
        }

        let mut role = LinkRole::None;
        if name == cfg.sw_queue_event || system == cfg.sw_queue_event {
            event.flags |= EventFlags::IS_TIMELINE | EventFlags::IS_SW_QUEUE;
            role = LinkRole::Start;
        } else if name == cfg.hw_queue_event || system == cfg.hw_queue_event {
            event.flags |= EventFlags::IS_TIMELINE | EventFlags::IS_HW_QUEUE;
            role = LinkRole::Relay;
        }

        if name.ends_with(cfg.fence_signaled_suffix.as_str()) {
            event.flags |= EventFlags::IS_TIMELINE | EventFlags::FENCE_SIGNALED;
            if role == LinkRole::None {
                role = LinkRole::Complete;
            }
        }

        role
    }

    fn link(&mut self, role: LinkRole, event: &mut TraceEvent) {
        let key = LinkKey {
            timeline: event.timeline,
            context: event.context,
            seqno: event.seqno,
        };

        match role {
            LinkRole::None => {}
            LinkRole::Start => self.open(key, event),
            LinkRole::Relay => {
                if self.pending.contains_key(&key) {
                    self.close(key, event);
                } else {
                    self.stats.relays_without_start += 1;
                }
                self.open(key, event);
            }
            LinkRole::Complete => self.close(key, event),
        }
    }

    /// Make `event` the pending start for `key`
    fn open(&mut self, key: LinkKey, event: &TraceEvent) {
        let start = PendingStart {
            id: event.id,
            ts: event.ts,
        };
        if let Some(prev) = self.pending.get(&key) {
            self.stats.orphaned_starts += 1;
            tracing::debug!(
                orphan = prev.id,
                replacement = event.id,
                context = key.context,
                seqno = key.seqno,
                "pending start replaced before completion"
            );
        }
        self.pending.set(key, start);
    }

    /// Link `event` to the pending start for `key`, consuming it
    fn close(&mut self, key: LinkKey, event: &mut TraceEvent) {
        let Some(start) = self.pending.get(&key).copied() else {
            self.stats.unmatched_completions += 1;
            return;
        };

        let duration = event
            .ts
            .checked_sub(start.ts)
            .and_then(|d| u64::try_from(d).ok());
        match duration {
            Some(duration) => {
                event.id_start = start.id;
                event.duration = duration;
                self.stats.linked += 1;
                self.pending.remove(&key);
            }
            None => {
                // Start stays pending; a later in-order completion may still claim it
                self.stats.out_of_order += 1;
                tracing::warn!(
                    id = event.id,
                    start = start.id,
                    ts = event.ts,
                    start_ts = start.ts,
                    "completion precedes its start, not linking"
                );
            }
        }
    }
}
