//! Reader and classifier configuration
//!
//! Defaults match the amdgpu/drm tracepoints emitted by current kernels.
//! A configuration can also be loaded from a TOML file:
//!
//! ```toml
//! skip_malformed = false
//! max_events = 100000
//!
//! [classifier]
//! sw_queue_event = "amdgpu_cs_ioctl"
//! hw_queue_event = "amdgpu_sched_run_job"
//! ```

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Marker names and field keys used to classify events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// System name of ftrace print events (system "ftrace" + name "print" also matches)
    pub ftrace_print_system: String,
    pub vblank_event: String,
    /// Submission of a job to the software scheduler queue
    pub sw_queue_event: String,
    /// Job picked up by the hardware ring
    pub hw_queue_event: String,
    /// Any event whose name ends with this suffix signals a fence
    pub fence_signaled_suffix: String,

    pub timeline_field: String,
    pub context_field: String,
    pub seqno_field: String,
    pub crtc_field: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ftrace_print_system: "ftrace-print".to_string(),
            vblank_event: "drm_vblank_event".to_string(),
            sw_queue_event: "amdgpu_cs_ioctl".to_string(),
            hw_queue_event: "amdgpu_sched_run_job".to_string(),
            fence_signaled_suffix: "fence_signaled".to_string(),
            timeline_field: "timeline".to_string(),
            context_field: "context".to_string(),
            seqno_field: "seqno".to_string(),
            crtc_field: "crtc".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        let markers = [
            ("ftrace_print_system", &self.ftrace_print_system),
            ("vblank_event", &self.vblank_event),
            ("sw_queue_event", &self.sw_queue_event),
            ("hw_queue_event", &self.hw_queue_event),
            ("fence_signaled_suffix", &self.fence_signaled_suffix),
            ("timeline_field", &self.timeline_field),
            ("context_field", &self.context_field),
            ("seqno_field", &self.seqno_field),
            ("crtc_field", &self.crtc_field),
        ];
        for (name, value) in markers {
            if value.is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }

        if self.sw_queue_event == self.hw_queue_event {
            return Err(format!(
                "sw_queue_event and hw_queue_event must differ, both are {:?}",
                self.sw_queue_event
            ));
        }

        Ok(())
    }
}

/// Configuration for a trace read session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Skip malformed records instead of aborting the read
    ///
    /// Default: true
    pub skip_malformed: bool,

    /// Stop cleanly (status 0) after this many delivered events
    pub max_events: Option<u64>,

    pub classifier: ClassifierConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            skip_malformed: true,
            max_events: None,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Any malformed record aborts the read
    pub fn strict() -> Self {
        Self {
            skip_malformed: false,
            ..Self::default()
        }
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_events == Some(0) {
            return Err("max_events must be at least 1 when set".to_string());
        }
        self.classifier.validate()
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ReaderConfig =
            toml::from_str(text).map_err(|e| TraceError::Config(e.to_string()))?;
        config.validate().map_err(TraceError::Config)?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
