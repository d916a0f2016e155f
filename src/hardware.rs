//! The hardware control facade. Tasks only ever see these traits; handles
//! are injected by the caller and scoped to the run. `SimRadio` stands in
//! for real devices so a whole sweep can run and be tested without hardware.

use num_complex::Complex;
use rand::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::device::{ReceiverConfig, TransmitterConfig};
use crate::errors::{Result, SweepError};

/// Values the hardware actually applied after configuration, read back for
/// the capture metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coerced {
    pub freq: f64,
    pub rate: f64,
    pub gain: f64,
    pub bandwidth: f64,
}

pub trait EmitterControl: Send + Sync {
    fn configure(&self, cfg: &TransmitterConfig) -> Result<Coerced>;
    fn start_playback(&self, cfg: &TransmitterConfig) -> Result<()>;
    fn stop_playback(&self, cfg: &TransmitterConfig) -> Result<()>;
}

pub trait CaptureControl: Send + Sync {
    fn configure(&self, cfg: &ReceiverConfig) -> Result<Coerced>;
    fn capture_record(&self, cfg: &ReceiverConfig, num_samps: usize) -> Result<Vec<Complex<f32>>>;
}

/// Software radio: configuration coerces every request to itself and capture
/// synthesizes noise records. An optional fault makes the n-th configure
/// call of a chosen device fail, which is how tests exercise the
/// per-variation error policy.
#[derive(Debug, Default)]
pub struct SimRadio {
    fault: Option<Fault>,
}

#[derive(Debug)]
struct Fault {
    device: String,
    at_call: usize,
    calls: AtomicUsize,
}

impl SimRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the device's `call`-th configure (0-based, counted per device).
    pub fn failing(device: impl Into<String>, call: usize) -> Self {
        Self {
            fault: Some(Fault {
                device: device.into(),
                at_call: call,
                calls: AtomicUsize::new(0),
            }),
        }
    }

    fn check(&self, label: &str) -> Result<()> {
        if let Some(fault) = &self.fault {
            if fault.device == label
                && fault.calls.fetch_add(1, Ordering::SeqCst) == fault.at_call
            {
                return Err(SweepError::hardware(label, "simulated device fault"));
            }
        }
        Ok(())
    }
}

impl EmitterControl for SimRadio {
    fn configure(&self, cfg: &TransmitterConfig) -> Result<Coerced> {
        self.check(&cfg.label())?;
        Ok(Coerced {
            freq: cfg.freq,
            rate: cfg.rate,
            gain: cfg.gain,
            bandwidth: cfg.bandwidth,
        })
    }

    fn start_playback(&self, _cfg: &TransmitterConfig) -> Result<()> {
        Ok(())
    }

    fn stop_playback(&self, _cfg: &TransmitterConfig) -> Result<()> {
        Ok(())
    }
}

impl CaptureControl for SimRadio {
    fn configure(&self, cfg: &ReceiverConfig) -> Result<Coerced> {
        self.check(&cfg.label())?;
        Ok(Coerced {
            freq: cfg.freq,
            rate: cfg.rate,
            gain: cfg.gain,
            bandwidth: cfg.bandwidth,
        })
    }

    fn capture_record(&self, _cfg: &ReceiverConfig, num_samps: usize) -> Result<Vec<Complex<f32>>> {
        let mut rng = rand::thread_rng();
        Ok((0..num_samps)
            .map(|_| Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{receiver_spec, transmitter_spec};
    use crate::config::RunDescription;
    use crate::device::{ReceiverConfig, TransmitterConfig};
    use crate::sweep::build_variations;

    fn sample_configs() -> (TransmitterConfig, ReceiverConfig) {
        let mut desc = RunDescription::default();
        desc.transmitters.push(transmitter_spec());
        desc.receivers.push(receiver_spec());
        let table = build_variations(&desc).unwrap();
        let v = &table.variations[0];
        (
            TransmitterConfig::new(&desc.transmitters[0], &v.transmitters[0], 1),
            ReceiverConfig::new(&desc.receivers[0], &v.receivers[0], &desc.general, 1),
        )
    }

    #[test]
    fn sim_configure_coerces_to_request() {
        let (tx, rx) = sample_configs();
        let radio = SimRadio::new();
        let coerced = EmitterControl::configure(&radio, &tx).unwrap();
        assert_eq!(coerced.freq, tx.freq);
        assert_eq!(coerced.rate, tx.rate);
        let coerced = CaptureControl::configure(&radio, &rx).unwrap();
        assert_eq!(coerced.gain, rx.gain);
    }

    #[test]
    fn sim_capture_yields_requested_length() {
        let (_, rx) = sample_configs();
        let radio = SimRadio::new();
        let samples = radio.capture_record(&rx, 1024).unwrap();
        assert_eq!(samples.len(), 1024);
    }

    #[test]
    fn fault_hits_the_chosen_call_only() {
        let (tx, rx) = sample_configs();
        let radio = SimRadio::failing("Rx1", 1);
        assert!(EmitterControl::configure(&radio, &tx).is_ok());
        assert!(CaptureControl::configure(&radio, &rx).is_ok());
        assert!(CaptureControl::configure(&radio, &rx).is_err());
        assert!(CaptureControl::configure(&radio, &rx).is_ok());
    }
}
