//! Run description loading. A run is described in a YAML or JSON file with
//! one block per transmitter and receiver plus a general section; the two
//! formats are interchangeable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, SweepError};
use crate::sweep::{NumericSweep, TextSweep};

/// Where a device's sample rate comes from: the sweep value in the run
/// description, or the waveform description attached to the transmitter(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    UserDefined,
    WaveformDerived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransmitterSpec {
    /// Hardware model identifier, e.g. "X310". Also selects the clock
    /// candidates in the resolver.
    pub model: String,
    pub address: String,
    pub freq: NumericSweep,
    pub gain: NumericSweep,
    pub antenna: TextSweep,
    pub bandwidth: NumericSweep,
    pub rate: NumericSweep,
    pub rate_source: RateSource,
    /// Waveform identifier; resolved against the waveform directory.
    pub waveform: TextSweep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverSpec {
    pub model: String,
    pub address: String,
    pub freq: NumericSweep,
    pub gain: NumericSweep,
    pub antenna: TextSweep,
    pub bandwidth: NumericSweep,
    pub rate: NumericSweep,
    pub rate_source: RateSource,
    /// Capture length per record, in seconds.
    pub duration: NumericSweep,
}

impl TransmitterSpec {
    /// Device connection arguments, `type=<model>,addr=<ip>`.
    pub fn args(&self) -> String {
        format!("type={},addr={}", self.model.to_lowercase(), self.address)
    }
}

impl ReceiverSpec {
    pub fn args(&self) -> String {
        format!("type={},addr={}", self.model.to_lowercase(), self.address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// "parallel" or "sequential"; validated when the run starts.
    pub execution_order: String,
    /// Capture output format; only "sigmf" is supported.
    pub saving_format: String,
    /// Number of records each receiver captures per variation.
    pub records_per_capture: u32,
    /// Pause after each task-set join, covers hardware release latency.
    pub settle_delay_ms: u64,
    pub output_dir: PathBuf,
    pub waveform_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            execution_order: "parallel".to_owned(),
            saving_format: "sigmf".to_owned(),
            records_per_capture: 1,
            settle_delay_ms: 50,
            output_dir: PathBuf::from("captures"),
            waveform_dir: PathBuf::from("waveforms"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDescription {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transmitters: Vec<TransmitterSpec>,
    #[serde(default)]
    pub receivers: Vec<ReceiverSpec>,
}

impl RunDescription {
    /// Load a run description, dispatching on the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| {
                SweepError::Configuration(format!("{}: {e}", path.display()))
            }),
            "json" => serde_json::from_str(&text).map_err(|e| {
                SweepError::Configuration(format!("{}: {e}", path.display()))
            }),
            other => Err(SweepError::Configuration(format!(
                "unsupported run description format '{other}' (expected yaml or json)"
            ))),
        }
    }
}
