//! Event filtering for -e event= expressions
//!
//! Supports:
//! - Individual events: -e event=sched_switch,drm_vblank_event
//! - Event classes: -e event=gpu, -e event=vblank, -e event=sched, -e event=print
//! - Regex patterns: -e event=/^amdgpu_.*/
//! - Negation: -e event=!sched_switch,!/^irq_/
//!
//! Filtering runs downstream of the reader and only marks events via
//! `TraceEvent::is_filtered_out`.

use crate::event::TraceEvent;
use crate::string_pool::StringPool;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// Decides which events a consumer keeps
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Event names to include (None = no positive name entries)
    include: Option<HashSet<String>>,
    include_patterns: Vec<Regex>,
    exclude: HashSet<String>,
    exclude_patterns: Vec<Regex>,
}

fn event_class(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "gpu" => Some(&[
            "amdgpu_cs_ioctl",
            "amdgpu_sched_run_job",
            "dma_fence_signaled",
            "fence_signaled",
            "amdgpu_vm_flush",
        ]),
        "vblank" => Some(&[
            "drm_vblank_event",
            "drm_vblank_event_queued",
            "drm_vblank_event_delivered",
        ]),
        "sched" => Some(&[
            "sched_switch",
            "sched_wakeup",
            "sched_wakeup_new",
            "sched_process_fork",
            "sched_process_exec",
            "sched_process_exit",
            "task_rename",
        ]),
        "print" => Some(&["print"]),
        _ => None,
    }
}

impl EventFilter {
    /// Create a filter that keeps all events
    pub fn all() -> Self {
        Self {
            include: None,
            include_patterns: Vec::new(),
            exclude: HashSet::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Parse a filter expression like "event=sched_switch,/^amdgpu_/" or "event=gpu"
    pub fn from_expr(expr: &str) -> Result<Self> {
        if let Some(spec) = expr.strip_prefix("event=") {
            Self::from_event_spec(spec)
        } else {
            bail!(
                "Invalid filter expression: {}. Expected format: event=SPEC",
                expr
            );
        }
    }

    /// Parse an event specification (the part after "event=")
    fn from_event_spec(spec: &str) -> Result<Self> {
        let mut filter = Self::all();
        let mut include = HashSet::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (negated, part) = match part.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, part),
            };

            if let Some(pattern) = part.strip_prefix('/').and_then(|p| p.strip_suffix('/')) {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid regex pattern: /{}/", pattern))?;
                if negated {
                    filter.exclude_patterns.push(regex);
                } else {
                    filter.include_patterns.push(regex);
                }
                continue;
            }

            let names: Vec<&str> = match event_class(part) {
                Some(class) => class.to_vec(),
                None => vec![part],
            };
            let target = if negated {
                &mut filter.exclude
            } else {
                &mut include
            };
            target.extend(names.into_iter().map(str::to_string));
        }

        if !include.is_empty() {
            filter.include = Some(include);
        }
        Ok(filter)
    }

    /// Check if an event with this name should be kept
    pub fn should_keep(&self, name: &str) -> bool {
        if self.exclude.contains(name) || self.exclude_patterns.iter().any(|re| re.is_match(name)) {
            return false;
        }

        if self.include.is_none() && self.include_patterns.is_empty() {
            return true;
        }

        self.include.as_ref().is_some_and(|set| set.contains(name))
            || self.include_patterns.iter().any(|re| re.is_match(name))
    }

    /// Mark `event` as filtered out when its name is not kept
    pub fn apply(&self, pool: &StringPool, event: &mut TraceEvent) {
        let name = pool.resolve(event.name).unwrap_or("");
        event.is_filtered_out = !self.should_keep(name);
    }
}
