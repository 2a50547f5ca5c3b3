use anyhow::{Context, Result};
use clap::Parser;
use std::fmt::Write as _;
use std::io::{self, Write};
use trace_ingest::cli::{Cli, OutputFormat};
use trace_ingest::config::ReaderConfig;
use trace_ingest::csv_output::{CsvEvent, CsvOutput};
use trace_ingest::event::TraceEvent;
use trace_ingest::filter::EventFilter;
use trace_ingest::json_output::JsonOutput;
use trace_ingest::reader::TraceReader;
use trace_ingest::stats::EventStats;
use trace_ingest::string_pool::StringPool;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Where classified events go
enum Sink {
    Text,
    Json(JsonOutput),
    Csv(CsvOutput),
    Summary(EventStats),
}

/// Format one event as a text line
fn format_text_line(pool: &StringPool, event: &TraceEvent, with_fields: bool) -> String {
    let mut line = format!(
        "{:>14} [{:03}] {}-{} {}:{}",
        event.ts,
        event.cpu,
        pool.resolve(event.comm).unwrap_or("<...>"),
        event.pid,
        pool.resolve(event.system).unwrap_or("?"),
        pool.resolve(event.name).unwrap_or("?"),
    );

    if let Some(row) = event.timeline_name(None) {
        let _ = write!(line, " row=\"{}\"", row);
    }
    if let Some(timeline) = pool.resolve(event.timeline) {
        let _ = write!(line, " timeline={}", timeline);
    }
    if event.has_start() {
        let _ = write!(line, " start={} dur={}", event.id_start, event.duration);
    }
    if event.is_vblank() {
        let _ = write!(line, " crtc={}", event.crtc);
    }
    if let Some(user_comm) = pool.resolve(event.user_comm) {
        let _ = write!(line, " user={}", user_comm);
    }
    if with_fields {
        for field in &event.fields {
            let _ = write!(
                line,
                " {}={}",
                pool.get(field.key).unwrap_or(""),
                pool.get(field.value).unwrap_or("")
            );
        }
    }

    line
}

fn build_config(args: &Cli) -> Result<ReaderConfig> {
    let mut config = match &args.config {
        Some(path) => ReaderConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    if args.strict {
        config.skip_malformed = false;
    }
    if let Some(limit) = args.limit {
        if limit == 0 {
            anyhow::bail!("Invalid value for --limit: 0 (must be >= 1)");
        }
        config.max_events = Some(limit);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = build_config(&args)?;
    let reader = TraceReader::new(config)?;

    // Parse filter expression if provided
    let filter = match &args.filter {
        Some(expr) => EventFilter::from_expr(expr)?,
        None => EventFilter::all(),
    };

    let mut sink = if args.summary {
        Sink::Summary(EventStats::new())
    } else {
        match args.format {
            OutputFormat::Text => Sink::Text,
            OutputFormat::Json => Sink::Json(JsonOutput::new()),
            OutputFormat::Csv => Sink::Csv(CsvOutput::new(args.fields)),
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error: Option<io::Error> = None;
    let mut pool = StringPool::new();

    let outcome = reader.read_file(&args.file, &mut pool, |_info, pool, event| {
        let mut event = event.clone();
        filter.apply(pool, &mut event);

        match &mut sink {
            Sink::Text => {
                if !event.is_filtered_out {
                    let line = format_text_line(pool, &event, args.fields);
                    if let Err(e) = writeln!(out, "{}", line) {
                        write_error = Some(e);
                        return 1;
                    }
                }
            }
            Sink::Json(json) => json.add_event(pool, &event),
            Sink::Csv(csv) => {
                if !event.is_filtered_out {
                    csv.add_event(CsvEvent::from_event(pool, &event));
                }
            }
            Sink::Summary(stats) => stats.record(pool, &event),
        }
        0
    })?;

    if let Some(err) = write_error {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err).context("Failed to write output");
    }

    match sink {
        Sink::Text => {}
        Sink::Json(mut json) => {
            json.finish(
                &outcome.info,
                &outcome.link_stats,
                outcome.records_skipped,
                outcome.status,
            );
            writeln!(out, "{}", json.to_json()?)?;
        }
        Sink::Csv(csv) => write!(out, "{}", csv.to_csv())?,
        Sink::Summary(stats) => {
            stats.print_summary(&mut out, &outcome.info)?;
            writeln!(out)?;
            writeln!(
                out,
                "linked: {}  orphaned starts: {}  unmatched completions: {}  HW queue without start: {}  skipped records: {}",
                outcome.link_stats.linked,
                outcome.link_stats.orphaned_starts,
                outcome.link_stats.unmatched_completions,
                outcome.link_stats.relays_without_start,
                outcome.records_skipped
            )?;
        }
    }

    out.flush()?;
    Ok(())
}
