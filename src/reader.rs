//! Streaming trace reader
//!
//! Drives a raw record decoder in a single forward pass. Each event record is
//! folded into [`TraceInfo`], classified, and handed to the consumer
//! callback before the next record is decoded; nothing is buffered or
//! reordered.
//!
//! The callback's return value is the only cancellation mechanism: 0 keeps
//! reading, anything else stops the read and becomes the outcome status.
//!
//! # Example
//!
//! ```no_run
//! use trace_ingest::reader::read_trace_file;
//! use trace_ingest::string_pool::StringPool;
//!
//! let mut pool = StringPool::new();
//! let outcome = read_trace_file("capture.jsonl", &mut pool, |_info, pool, event| {
//!     if event.is_vblank() {
//!         println!("vblank crtc={} at {}", event.crtc, event.ts);
//!     }
//!     let _ = pool.resolve(event.name);
//!     0
//! })?;
//! println!("{} events on {} cpus", outcome.events_delivered, outcome.info.cpus);
//! # Ok::<(), trace_ingest::error::TraceError>(())
//! ```

use crate::classifier::{EventClassifier, LinkStats};
use crate::config::ReaderConfig;
use crate::decoder::{JsonLinesDecoder, RawRecord};
use crate::error::{DecodeError, Result, TraceError};
use crate::event::TraceEvent;
use crate::string_pool::StringPool;
use crate::trace_info::TraceInfo;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Result of a completed or stopped read
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// 0 when the whole trace was read, otherwise the callback's stop code
    pub status: i32,
    pub info: TraceInfo,
    pub events_delivered: u64,
    /// Malformed records skipped by the decoder
    pub records_skipped: u64,
    pub link_stats: LinkStats,
}

impl ReadOutcome {
    /// Whether the consumer asked to stop early
    pub fn stopped_early(&self) -> bool {
        self.status != 0
    }
}

/// Reader for one or more independent read sessions
#[derive(Debug, Clone, Default)]
pub struct TraceReader {
    config: ReaderConfig,
}

impl TraceReader {
    /// Create a reader, validating `config`
    pub fn new(config: ReaderConfig) -> Result<Self> {
        config.validate().map_err(TraceError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read a JSON-lines trace file
    pub fn read_file<F>(&self, path: &Path, pool: &mut StringPool, callback: F) -> Result<ReadOutcome>
    where
        F: FnMut(&TraceInfo, &StringPool, &TraceEvent) -> i32,
    {
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "reading trace");

        let decoder = JsonLinesDecoder::new(BufReader::new(file));
        let info = TraceInfo::new(path.display().to_string());
        self.read_source(decoder, info, pool, callback)
    }

    /// Read records from any decoder
    ///
    /// `info` seeds the session metadata (usually just the source path).
    pub fn read_source<I, F>(
        &self,
        source: I,
        mut info: TraceInfo,
        pool: &mut StringPool,
        mut callback: F,
    ) -> Result<ReadOutcome>
    where
        I: IntoIterator<Item = std::result::Result<RawRecord, DecodeError>>,
        F: FnMut(&TraceInfo, &StringPool, &TraceEvent) -> i32,
    {
        let mut classifier = EventClassifier::new(self.config.classifier.clone());
        let mut delivered = 0u64;
        let mut skipped = 0u64;
        let mut status = 0;

        for record in source {
            let record = match record {
                Ok(record) => record,
                Err(err) if err.is_recoverable() && self.config.skip_malformed => {
                    skipped += 1;
                    tracing::warn!("skipping {}", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match record {
                RawRecord::Event(raw) => {
                    info.observe_event(&raw, pool);
                    let event = classifier.classify(&raw, &info, pool)?;
                    delivered += 1;

                    let code = callback(&info, &*pool, &event);
                    if code != 0 {
                        tracing::debug!(code, id = event.id, "consumer stopped the read");
                        status = code;
                        break;
                    }
                    if self.config.max_events == Some(delivered) {
                        tracing::debug!(delivered, "event limit reached");
                        break;
                    }
                }
                RawRecord::Uname { value } => info.uname = value,
                RawRecord::CpuStat { value } => info.cpustats.push(value),
                RawRecord::TimestampUnit { in_us } => info.timestamp_in_us = in_us,
                RawRecord::SavedTgid { pid, tgid } => info.add_tgid_pid(tgid, pid),
                RawRecord::SavedCmdline { pid, comm } => {
                    let id = pool.intern(&comm);
                    info.set_comm(pid, id);
                }
            }
        }

        let link_stats = classifier.stats().clone();
        tracing::debug!(
            delivered,
            skipped,
            linked = link_stats.linked,
            orphaned = link_stats.orphaned_starts,
            pending = classifier.pending_starts(),
            "read finished"
        );

        Ok(ReadOutcome {
            status,
            info,
            events_delivered: delivered,
            records_skipped: skipped,
            link_stats,
        })
    }
}

/// Read a JSON-lines trace file with the default configuration
pub fn read_trace_file<P, F>(path: P, pool: &mut StringPool, callback: F) -> Result<ReadOutcome>
where
    P: AsRef<Path>,
    F: FnMut(&TraceInfo, &StringPool, &TraceEvent) -> i32,
{
    TraceReader::default().read_file(path.as_ref(), pool, callback)
}
