//! CSV output format for classified events
//!
//! One row per event for spreadsheet analysis. Raw fields are folded into a
//! single `key=value` column.

use crate::event::{is_valid_id, TraceEvent};
use crate::string_pool::StringPool;

/// CSV record for a single event
#[derive(Debug, Clone)]
pub struct CsvEvent {
    pub id: u32,
    pub ts: i64,
    pub cpu: u32,
    pub pid: i32,
    pub comm: String,
    pub system: String,
    pub name: String,
    pub timeline: String,
    pub id_start: Option<u32>,
    pub duration: Option<u64>,
    pub fields: String,
}

impl CsvEvent {
    pub fn from_event(pool: &StringPool, event: &TraceEvent) -> Self {
        let text = |id| pool.resolve(id).unwrap_or("").to_string();
        let linked = is_valid_id(event.id_start);
        let fields = event
            .fields
            .iter()
            .map(|f| {
                format!(
                    "{}={}",
                    pool.get(f.key).unwrap_or(""),
                    pool.get(f.value).unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            id: event.id,
            ts: event.ts,
            cpu: event.cpu,
            pid: event.pid,
            comm: text(event.comm),
            system: text(event.system),
            name: text(event.name),
            timeline: text(event.timeline),
            id_start: linked.then_some(event.id_start),
            duration: linked.then_some(event.duration),
            fields,
        }
    }
}

/// CSV output formatter
#[derive(Debug)]
pub struct CsvOutput {
    events: Vec<CsvEvent>,
    include_fields: bool,
}

impl CsvOutput {
    /// Create a new CSV output formatter
    pub fn new(include_fields: bool) -> Self {
        Self {
            events: Vec::new(),
            include_fields,
        }
    }

    /// Add an event to the output
    pub fn add_event(&mut self, event: CsvEvent) {
        self.events.push(event);
    }

    /// Generate CSV header row
    fn header(&self) -> String {
        let mut headers = vec![
            "id", "ts", "cpu", "pid", "comm", "system", "name", "timeline", "id_start", "duration",
        ];

        if self.include_fields {
            headers.push("fields");
        }

        headers.join(",")
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    /// Format an event as CSV row
    fn format_event(&self, event: &CsvEvent) -> String {
        let mut fields = vec![
            event.id.to_string(),
            event.ts.to_string(),
            event.cpu.to_string(),
            event.pid.to_string(),
            Self::escape_field(&event.comm),
            Self::escape_field(&event.system),
            Self::escape_field(&event.name),
            Self::escape_field(&event.timeline),
            event.id_start.map(|id| id.to_string()).unwrap_or_default(),
            event.duration.map(|d| d.to_string()).unwrap_or_default(),
        ];

        if self.include_fields {
            fields.push(Self::escape_field(&event.fields));
        }

        fields.join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(&self.header());
        output.push('\n');

        for event in &self.events {
            output.push_str(&self.format_event(event));
            output.push('\n');
        }

        output
    }
}
