//! Event statistics for --summary mode
//!
//! Counts events per `system:name` and per CPU, and totals linked durations
//! per timeline row (SW queue / HW queue / Execution).

use crate::event::TraceEvent;
use crate::string_pool::StringPool;
use crate::trace_info::TraceInfo;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

/// Counts for a single event type
#[derive(Debug, Clone, Default)]
pub struct EventTypeStats {
    pub count: u64,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
}

/// Linked duration totals for one timeline row
#[derive(Debug, Clone, Default)]
pub struct TimelineStats {
    /// Events with a valid `id_start`
    pub linked: u64,
    pub unlinked: u64,
    pub total_duration: u64,
    pub max_duration: u64,
}

impl TimelineStats {
    pub fn avg_duration(&self) -> f64 {
        if self.linked == 0 {
            return 0.0;
        }
        self.total_duration as f64 / self.linked as f64
    }
}

/// Statistics accumulated over delivered events
#[derive(Debug, Default)]
pub struct EventStats {
    /// Keyed by "system:name"
    by_type: HashMap<String, EventTypeStats>,
    by_timeline: BTreeMap<&'static str, TimelineStats>,
    per_cpu: BTreeMap<u32, u64>,
    total: u64,
    filtered_out: u64,
}

impl EventStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered event
    pub fn record(&mut self, pool: &StringPool, event: &TraceEvent) {
        self.total += 1;
        if event.is_filtered_out {
            self.filtered_out += 1;
            return;
        }

        let key = format!(
            "{}:{}",
            pool.resolve(event.system).unwrap_or("?"),
            pool.resolve(event.name).unwrap_or("?")
        );
        let entry = self.by_type.entry(key).or_default();
        entry.count += 1;
        entry.first_ts.get_or_insert(event.ts);
        entry.last_ts = Some(event.ts);

        *self.per_cpu.entry(event.cpu).or_insert(0) += 1;

        if let Some(row) = event.timeline_name(None) {
            let timeline = self.by_timeline.entry(row).or_default();
            if event.has_start() {
                timeline.linked += 1;
                timeline.total_duration = timeline.total_duration.saturating_add(event.duration);
                timeline.max_duration = timeline.max_duration.max(event.duration);
            } else {
                timeline.unlinked += 1;
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn filtered_out(&self) -> u64 {
        self.filtered_out
    }

    pub fn event_type(&self, system: &str, name: &str) -> Option<&EventTypeStats> {
        self.by_type.get(&format!("{}:{}", system, name))
    }

    pub fn timeline(&self, row: &str) -> Option<&TimelineStats> {
        self.by_timeline.get(row)
    }

    pub fn cpu_count(&self, cpu: u32) -> u64 {
        self.per_cpu.get(&cpu).copied().unwrap_or(0)
    }

    /// Write the summary table
    pub fn print_summary<W: Write>(&self, out: &mut W, info: &TraceInfo) -> io::Result<()> {
        let unit = if info.timestamp_in_us { "us" } else { "ns" };

        if !info.uname.is_empty() {
            writeln!(out, "uname: {}", info.uname)?;
        }
        writeln!(out, "cpus: {}  pids: {}", info.cpus, info.pid_count())?;
        writeln!(out)?;

        writeln!(out, "{:>10} {:<48}", "events", "system:name")?;
        writeln!(out, "{:-<10} {:-<48}", "", "")?;

        // Sort by count descending, then name
        let mut types: Vec<_> = self.by_type.iter().collect();
        types.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        for (name, stats) in types {
            writeln!(out, "{:>10} {:<48}", stats.count, name)?;
        }
        writeln!(out, "{:-<10} {:-<48}", "", "")?;
        writeln!(out, "{:>10} total", self.total)?;
        if self.filtered_out > 0 {
            writeln!(out, "{:>10} filtered out", self.filtered_out)?;
        }

        if !self.by_timeline.is_empty() {
            writeln!(out)?;
            writeln!(
                out,
                "{:<10} {:>8} {:>8} {:>14} {:>14}",
                "timeline", "linked", "unlinked",
                format!("avg ({})", unit),
                format!("max ({})", unit)
            )?;
            for (row, stats) in &self.by_timeline {
                writeln!(
                    out,
                    "{:<10} {:>8} {:>8} {:>14.1} {:>14}",
                    row,
                    stats.linked,
                    stats.unlinked,
                    stats.avg_duration(),
                    stats.max_duration
                )?;
            }
        }

        Ok(())
    }
}
