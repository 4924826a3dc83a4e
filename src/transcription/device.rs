//! Compute device detection for local inference.

use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Environment variable that forces the device (`gpu` or `cpu`).
pub const DEVICE_ENV: &str = "REFERAT_DEVICE";

/// Where local inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Accelerator,
    Processor,
}

/// Numeric precision used for model weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F16,
    F32,
}

impl ComputeDevice {
    /// Pick the accelerator when one is present, the processor otherwise.
    pub async fn detect() -> Self {
        if let Some(forced) = std::env::var(DEVICE_ENV).ok().and_then(|v| Self::parse(&v)) {
            debug!("Device forced via {}: {}", DEVICE_ENV, forced);
            return forced;
        }

        let probe = Command::new("nvidia-smi")
            .arg("-L")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match probe {
            Ok(out) if out.status.success() && !out.stdout.trim_ascii().is_empty() => {
                ComputeDevice::Accelerator
            }
            _ => ComputeDevice::Processor,
        }
    }

    /// Parse a device override value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gpu" | "cuda" | "accelerator" => Some(ComputeDevice::Accelerator),
            "cpu" | "processor" => Some(ComputeDevice::Processor),
            _ => None,
        }
    }

    /// Lower precision on the accelerator, full precision on the processor.
    pub fn precision(&self) -> Precision {
        match self {
            ComputeDevice::Accelerator => Precision::F16,
            ComputeDevice::Processor => Precision::F32,
        }
    }

    pub fn is_accelerator(&self) -> bool {
        matches!(self, ComputeDevice::Accelerator)
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Accelerator => f.write_str("gpu"),
            ComputeDevice::Processor => f.write_str("cpu"),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::F16 => f.write_str("float16"),
            Precision::F32 => f.write_str("float32"),
        }
    }
}
