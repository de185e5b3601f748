use anyhow::{Context, Result};
use rvtx_core::MemoryLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    UnsupportedSchema(String),
    #[error("Limit '{0}' must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("Invalid memsize '{0}'")]
    InvalidSize(String),
    #[error("memsize {size} cannot host the transmit register: {reason}")]
    Layout { size: u64, reason: String },
}

/// A memory size given either as a plain number or as text such as
/// `"0x2000"` or `"8KiB"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(n) => Ok(*n),
            SizeValue::Text(s) => parse_size(s),
        }
    }
}

impl Default for SizeValue {
    fn default() -> Self {
        SizeValue::Bytes(rvtx_core::layout::MEMSIZE as u64)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Zero-status polls before each acknowledgement. `null` models a device
    /// that never answers.
    #[serde(default)]
    pub ack_latency: Option<u32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ack_latency: Some(0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunLimits {
    /// Sequence terms to emit.
    pub steps: u64,
    /// Polls allowed per byte before the run is declared stalled.
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u32,
}

fn default_poll_limit() -> u32 {
    10_000
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            steps: 12,
            poll_limit: default_poll_limit(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Steps,
    PollTimeout,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputPrefixAssertion {
    pub output_starts_with: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MaxValueAssertion {
    pub max_value: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RunAssertion {
    OutputStartsWith(OutputPrefixAssertion),
    MaxValue(MaxValueAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    pub schema_version: String,
    #[serde(default)]
    pub memsize: SizeValue,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub limits: RunLimits,
    #[serde(default)]
    pub assertions: Vec<RunAssertion>,
}

impl Default for RunManifest {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            memsize: SizeValue::default(),
            device: DeviceConfig::default(),
            limits: RunLimits::default(),
            assertions: Vec::new(),
        }
    }
}

impl RunManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open run manifest at {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse run manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version.clone()).into());
        }
        if self.limits.steps == 0 {
            return Err(ConfigError::ZeroLimit("steps").into());
        }
        if self.limits.poll_limit == 0 {
            return Err(ConfigError::ZeroLimit("poll_limit").into());
        }
        self.layout()?;
        Ok(())
    }

    /// Memory layout the run uses.
    pub fn layout(&self) -> Result<MemoryLayout> {
        layout_for(self.memsize.bytes()?)
    }
}

pub fn layout_for(size: u64) -> Result<MemoryLayout> {
    let memsize = u32::try_from(size).map_err(|_| ConfigError::Layout {
        size,
        reason: "exceeds the 32-bit address space".to_string(),
    })?;
    MemoryLayout::new(memsize).map_err(|e| {
        ConfigError::Layout {
            size,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Parse a size as decimal, `0x` hex, or a human-readable quantity
/// (`"8KiB"`, `"2 kB"`).
pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};

    let trimmed = size_str.trim();
    if let Some(n) = rvtx_core::layout::parse_memsize(trimmed) {
        return Ok(n as u64);
    }
    let s: Size = trimmed
        .parse()
        .map_err(|_| ConfigError::InvalidSize(size_str.to_string()))?;
    let bytes: SpecificSize<Byte> = s.into();
    let value = bytes.value();
    // A byte count has to be a whole, representable number.
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(ConfigError::InvalidSize(size_str.to_string()).into());
    }
    Ok(value as u64)
}
