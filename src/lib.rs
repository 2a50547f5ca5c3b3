//! trace-ingest - single-pass kernel/GPU trace ingestion
//!
//! This library turns a stream of raw trace records into classified
//! [`event::TraceEvent`]s for timeline viewers: text is interned in a
//! [`string_pool::StringPool`], capture metadata accumulates in
//! [`trace_info::TraceInfo`], and queue/fence events are linked into
//! start → completion pairs with durations.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod decoder;
pub mod error;
pub mod event;
pub mod filter;
pub mod json_output;
pub mod keyed_map;
pub mod reader;
pub mod stats;
pub mod string_pool;
pub mod trace_info;
