//! Typed per-device configuration for one variation. Built fresh from the
//! variation row before the task set starts and discarded after it joins.

use std::fmt;
use std::path::PathBuf;

use crate::config::{GeneralConfig, RateSource, ReceiverSpec, TransmitterSpec};
use crate::hardware::Coerced;
use crate::sweep::{ReceiverParams, TransmitterParams};
use crate::waveform::WaveformDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Transmitter,
    Receiver,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Transmitter => write!(f, "Tx"),
            DeviceRole::Receiver => write!(f, "Rx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    /// 1-based instance number within the run.
    pub index: usize,
    pub args: String,
    pub hardware_model: String,
    pub freq: f64,
    pub gain: f64,
    pub antenna: String,
    pub bandwidth: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    pub waveform_name: String,
    /// Attached by the orchestrator before rate resolution.
    pub waveform: Option<WaveformDescription>,
}

impl TransmitterConfig {
    pub fn new(spec: &TransmitterSpec, params: &TransmitterParams, index: usize) -> Self {
        Self {
            index,
            args: spec.args(),
            hardware_model: spec.model.clone(),
            freq: params.freq,
            gain: params.gain,
            antenna: params.antenna.clone(),
            bandwidth: params.bandwidth,
            rate: params.rate,
            rate_source: params.rate_source,
            waveform_name: params.waveform.clone(),
            waveform: None,
        }
    }

    pub fn label(&self) -> String {
        format!("{}{}", DeviceRole::Transmitter, self.index)
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub index: usize,
    pub args: String,
    pub hardware_model: String,
    pub freq: f64,
    pub gain: f64,
    pub antenna: String,
    pub bandwidth: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    /// Capture length per record, seconds.
    pub duration: f64,
    pub records: u32,
    pub output_dir: PathBuf,
    /// Read back from the hardware after configuration.
    pub coerced: Option<Coerced>,
}

impl ReceiverConfig {
    pub fn new(
        spec: &ReceiverSpec,
        params: &ReceiverParams,
        general: &GeneralConfig,
        index: usize,
    ) -> Self {
        Self {
            index,
            args: spec.args(),
            hardware_model: spec.model.clone(),
            freq: params.freq,
            gain: params.gain,
            antenna: params.antenna.clone(),
            bandwidth: params.bandwidth,
            rate: params.rate,
            rate_source: params.rate_source,
            duration: params.duration,
            records: general.records_per_capture,
            output_dir: general.output_dir.clone(),
            coerced: None,
        }
    }

    pub fn label(&self) -> String {
        format!("{}{}", DeviceRole::Receiver, self.index)
    }

    /// Samples per record at the resolved rate.
    pub fn num_samps(&self) -> usize {
        (self.duration * self.rate).ceil() as usize
    }
}
