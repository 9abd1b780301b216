//! Client configuration, loaded from an optional JSON file and overridden by
//! command line flags.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Lower bound of the per-frame delta, in seconds
    pub min_delta: f32,
    /// Upper bound of the per-frame delta, in seconds
    pub max_delta: f32,
    pub time_scale: f32,
    /// Skip the accelerated renderer even when the device supports it
    pub force_canvas: bool,
    pub width: u32,
    pub height: u32,
    pub server: String,
    /// Send input state after every tick, not only when the server asks
    pub input_sync_every_tick: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_delta: 0.000001,
            max_delta: 1.0 / 20.0,
            time_scale: 1.0,
            force_canvas: false,
            width: 960,
            height: 640,
            server: "127.0.0.1:8080".to_string(),
            input_sync_every_tick: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, ClientError> {
        let config: ClientConfig =
            serde_json::from_str(text).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The `[min_delta, max_delta]` clamp range, if it is a usable one.
    pub fn delta_bounds(&self) -> Result<(f32, f32), ClientError> {
        if self.min_delta.is_nan() || self.min_delta <= 0.0 {
            return Err(ClientError::Config(format!("min_delta must be positive, got {}", self.min_delta)));
        }
        if self.max_delta.is_nan() || self.max_delta < self.min_delta {
            return Err(ClientError::Config(format!(
                "max_delta ({}) is below min_delta ({})",
                self.max_delta, self.min_delta
            )));
        }
        Ok((self.min_delta, self.max_delta))
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        self.delta_bounds()?;
        if self.time_scale.is_nan() || self.time_scale < 0.0 {
            return Err(ClientError::Config("time_scale can't be negative".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ClientError::Config("surface size can't be zero".to_string()));
        }
        Ok(())
    }
}
