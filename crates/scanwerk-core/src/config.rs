// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanwerkError};
use crate::types::IoMode;

/// Settings applied to device enumeration and every opened session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Only enumerate locally attached devices (skip network backends).
    pub local_only: bool,
    /// I/O mode re-applied after every `start`.
    pub io_mode: IoMode,
    /// Buffer size used by the frame-reading helpers.
    pub read_chunk_size: usize,
    /// Fetch every option descriptor right after open.
    pub prewarm_options: bool,
    /// Upper bound on frames in one multi-frame scan.
    pub max_frames: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            local_only: false,
            io_mode: IoMode::Blocking,
            read_chunk_size: 32 * 1024,
            prewarm_options: false,
            max_frames: 16,
        }
    }
}

impl ScanConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.as_ref().display(), "scan config loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(ScanwerkError::Config("read_chunk_size must be non-zero".into()));
        }
        if self.max_frames == 0 {
            return Err(ScanwerkError::Config("max_frames must be non-zero".into()));
        }
        Ok(())
    }
}
