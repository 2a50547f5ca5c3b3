//! Raw trace records and the JSON-lines decoder
//!
//! The reader consumes any `Iterator<Item = Result<RawRecord, DecodeError>>`,
//! so binary decoders can be plugged in from outside. The bundled decoder
//! reads one JSON object per line:
//!
//! ```text
//! {"type":"uname","value":"Linux 6.8.0 x86_64"}
//! {"type":"saved_tgid","pid":1201,"tgid":1200}
//! {"type":"event","pid":1200,"cpu":2,"ts":1000,"system":"amdgpu","name":"amdgpu_cs_ioctl",
//!  "comm":"glxgears","fields":[["timeline","gfx"],["context","5"],["seqno","1"]]}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// One event as produced by a decoder, before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub pid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgid: Option<i32>,
    pub cpu: u32,
    pub ts: i64,
    pub system: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm: Option<String>,
    /// Ordered key/value pairs
    #[serde(default)]
    pub fields: Vec<(String, String)>,
}

impl RawEvent {
    /// Value of the first field named `key`
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded record: either an event or out-of-band capture metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawRecord {
    Event(RawEvent),
    /// Kernel/system identifier of the capture host
    Uname { value: String },
    /// Free-form per-CPU statistics line
    CpuStat { value: String },
    /// Timestamp scale of the capture
    TimestampUnit { in_us: bool },
    /// pid → tgid entry from the kernel's saved_tgids table
    SavedTgid { pid: i32, tgid: i32 },
    /// pid → comm entry from the kernel's saved_cmdlines table
    SavedCmdline { pid: i32, comm: String },
}

/// Decoder for newline-delimited JSON records
pub struct JsonLinesDecoder<R> {
    reader: R,
    line: u64,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> JsonLinesDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::new(),
            done: false,
        }
    }

    /// 1-based number of the last line read
    pub fn line(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for JsonLinesDecoder<R> {
    type Item = Result<RawRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(DecodeError::Io(e)));
                }
            }
            self.line += 1;

            // Invalid UTF-8 spoils one record, not the stream
            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim(),
                Err(e) => {
                    return Some(Err(DecodeError::Malformed {
                        line: self.line,
                        reason: e.to_string(),
                    }))
                }
            };
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            return Some(
                serde_json::from_str::<RawRecord>(text).map_err(|e| DecodeError::Malformed {
                    line: self.line,
                    reason: e.to_string(),
                }),
            );
        }
    }
}
