//! Expansion of a run description into the full table of configuration
//! variations (the Cartesian product of every swept parameter).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{RateSource, ReceiverSpec, RunDescription, TransmitterSpec};
use crate::errors::{Result, SweepError};

/// Safety bound on range expansion. A range that would produce more values
/// than this is rejected outright instead of being truncated.
pub const MAX_RANGE_STEPS: usize = 10;

/// A swept numeric parameter as it appears in the run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericSweep {
    Single(f64),
    List(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

/// A swept text parameter (antenna name, waveform identifier). Ranges make
/// no sense here, so only single values and lists are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSweep {
    Single(String),
    List(Vec<String>),
}

impl NumericSweep {
    /// Expand to the explicit ordered list of values. Never empty.
    pub fn expand(&self) -> Result<Vec<f64>> {
        match self {
            NumericSweep::Single(v) => Ok(vec![*v]),
            NumericSweep::List(vs) => {
                if vs.is_empty() {
                    return Err(SweepError::Configuration(
                        "parameter list is empty".to_owned(),
                    ));
                }
                Ok(vs.clone())
            }
            NumericSweep::Range { start, stop, step } => expand_range(*start, *stop, *step),
        }
    }
}

impl TextSweep {
    pub fn expand(&self) -> Result<Vec<String>> {
        match self {
            TextSweep::Single(v) => Ok(vec![v.clone()]),
            TextSweep::List(vs) => {
                if vs.is_empty() {
                    return Err(SweepError::Configuration(
                        "parameter list is empty".to_owned(),
                    ));
                }
                Ok(vs.clone())
            }
        }
    }
}

fn expand_range(start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    if step <= 0.0 {
        return Err(SweepError::InvalidRange(format!(
            "step must be positive, got {step}"
        )));
    }
    if start > stop {
        return Err(SweepError::InvalidRange(format!(
            "range from {start} to {stop} expands to nothing"
        )));
    }
    let mut values = Vec::new();
    let mut v = start;
    while v <= stop {
        values.push(v);
        if values.len() > MAX_RANGE_STEPS {
            return Err(SweepError::InvalidRange(format!(
                "range from {start} to {stop} by {step} exceeds {MAX_RANGE_STEPS} steps"
            )));
        }
        v += step;
    }
    Ok(values)
}

/// Whether the run emits, captures, or both. Derived from the device counts,
/// never stated in the run description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    TransmitOnly,
    ReceiveOnly,
    TransmitAndReceive,
}

impl OperationMode {
    pub fn derive(num_transmitters: usize, num_receivers: usize) -> Result<Self> {
        match (num_transmitters, num_receivers) {
            (0, 0) => Err(SweepError::Configuration(
                "run description declares no transmitters and no receivers".to_owned(),
            )),
            (_, 0) => Ok(OperationMode::TransmitOnly),
            (0, _) => Ok(OperationMode::ReceiveOnly),
            _ => Ok(OperationMode::TransmitAndReceive),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::TransmitOnly => write!(f, "Tx-only"),
            OperationMode::ReceiveOnly => write!(f, "Rx-only"),
            OperationMode::TransmitAndReceive => write!(f, "Tx-Rx"),
        }
    }
}

/// One transmitter's concrete parameter values for one variation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitterParams {
    pub freq: f64,
    pub gain: f64,
    pub antenna: String,
    pub bandwidth: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    pub waveform: String,
}

/// One receiver's concrete parameter values for one variation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverParams {
    pub freq: f64,
    pub gain: f64,
    pub antenna: String,
    pub bandwidth: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    pub duration: f64,
}

/// One row of the variation table: a fully resolved parameter set for every
/// device in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub transmitters: Vec<TransmitterParams>,
    pub receivers: Vec<ReceiverParams>,
}

#[derive(Debug, Clone)]
pub struct VariationTable {
    pub variations: Vec<Variation>,
    pub mode: OperationMode,
    pub num_transmitters: usize,
    pub num_receivers: usize,
}

/// All index tuples over the given dimensions, first dimension varying
/// slowest. The nested-loop order makes the table deterministic.
fn index_product(dims: &[usize]) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = vec![Vec::new()];
    for &n in dims {
        let mut next = Vec::with_capacity(rows.len() * n);
        for row in &rows {
            for i in 0..n {
                let mut r = row.clone();
                r.push(i);
                next.push(r);
            }
        }
        rows = next;
    }
    rows
}

fn expand_transmitter(spec: &TransmitterSpec) -> Result<Vec<TransmitterParams>> {
    let freqs = spec.freq.expand()?;
    let gains = spec.gain.expand()?;
    let antennas = spec.antenna.expand()?;
    let bandwidths = spec.bandwidth.expand()?;
    let rates = spec.rate.expand()?;
    let waveforms = spec.waveform.expand()?;
    let dims = [
        freqs.len(),
        gains.len(),
        antennas.len(),
        bandwidths.len(),
        rates.len(),
        waveforms.len(),
    ];
    let mut out = Vec::with_capacity(dims.iter().product());
    for ix in index_product(&dims) {
        out.push(TransmitterParams {
            freq: freqs[ix[0]],
            gain: gains[ix[1]],
            antenna: antennas[ix[2]].clone(),
            bandwidth: bandwidths[ix[3]],
            rate: rates[ix[4]],
            rate_source: spec.rate_source,
            waveform: waveforms[ix[5]].clone(),
        });
    }
    Ok(out)
}

fn expand_receiver(spec: &ReceiverSpec) -> Result<Vec<ReceiverParams>> {
    let freqs = spec.freq.expand()?;
    let gains = spec.gain.expand()?;
    let antennas = spec.antenna.expand()?;
    let bandwidths = spec.bandwidth.expand()?;
    let rates = spec.rate.expand()?;
    let durations = spec.duration.expand()?;
    let dims = [
        freqs.len(),
        gains.len(),
        antennas.len(),
        bandwidths.len(),
        rates.len(),
        durations.len(),
    ];
    let mut out = Vec::with_capacity(dims.iter().product());
    for ix in index_product(&dims) {
        out.push(ReceiverParams {
            freq: freqs[ix[0]],
            gain: gains[ix[1]],
            antenna: antennas[ix[2]].clone(),
            bandwidth: bandwidths[ix[3]],
            rate: rates[ix[4]],
            rate_source: spec.rate_source,
            duration: durations[ix[5]],
        });
    }
    Ok(out)
}

/// Build the full variation table: the Cartesian product across every
/// parameter axis of every device. Parameters are expanded per device, so
/// two transmitters sweeping the same parameter name never collide.
pub fn build_variations(desc: &RunDescription) -> Result<VariationTable> {
    let num_transmitters = desc.transmitters.len();
    let num_receivers = desc.receivers.len();
    let mode = OperationMode::derive(num_transmitters, num_receivers)?;

    let tx_sets: Vec<Vec<TransmitterParams>> = desc
        .transmitters
        .iter()
        .map(expand_transmitter)
        .collect::<Result<_>>()?;
    let rx_sets: Vec<Vec<ReceiverParams>> = desc
        .receivers
        .iter()
        .map(expand_receiver)
        .collect::<Result<_>>()?;

    let dims: Vec<usize> = tx_sets
        .iter()
        .map(Vec::len)
        .chain(rx_sets.iter().map(Vec::len))
        .collect();

    let mut variations = Vec::new();
    for ix in index_product(&dims) {
        let transmitters = tx_sets
            .iter()
            .enumerate()
            .map(|(k, set)| set[ix[k]].clone())
            .collect();
        let receivers = rx_sets
            .iter()
            .enumerate()
            .map(|(k, set)| set[ix[num_transmitters + k]].clone())
            .collect();
        variations.push(Variation {
            transmitters,
            receivers,
        });
    }

    Ok(VariationTable {
        variations,
        mode,
        num_transmitters,
        num_receivers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{receiver_spec, transmitter_spec};

    #[test]
    fn range_expands_inclusive_and_increasing() {
        let vals = expand_range(10.0, 30.0, 10.0).unwrap();
        assert_eq!(vals, vec![10.0, 20.0, 30.0]);
        assert!(vals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn range_rejects_bad_step() {
        assert!(matches!(
            expand_range(0.0, 1.0, 0.0),
            Err(SweepError::InvalidRange(_))
        ));
        assert!(matches!(
            expand_range(0.0, 1.0, -1.0),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn range_rejects_empty_expansion() {
        assert!(matches!(
            expand_range(5.0, 1.0, 1.0),
            Err(SweepError::InvalidRange(_))
        ));
    }

    #[test]
    fn range_fails_instead_of_truncating() {
        // 11 values would be produced, one over the bound
        assert!(matches!(
            expand_range(0.0, 10.0, 1.0),
            Err(SweepError::InvalidRange(_))
        ));
        // exactly at the bound is fine
        assert_eq!(expand_range(0.0, 9.0, 1.0).unwrap().len(), 10);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(NumericSweep::List(vec![]).expand().is_err());
        assert!(TextSweep::List(vec![]).expand().is_err());
    }

    #[test]
    fn mode_derivation() {
        assert_eq!(
            OperationMode::derive(1, 1).unwrap(),
            OperationMode::TransmitAndReceive
        );
        assert_eq!(
            OperationMode::derive(2, 0).unwrap(),
            OperationMode::TransmitOnly
        );
        assert_eq!(
            OperationMode::derive(0, 1).unwrap(),
            OperationMode::ReceiveOnly
        );
        assert!(OperationMode::derive(0, 0).is_err());
    }

    #[test]
    fn table_size_is_product_of_cardinalities() {
        let mut desc = RunDescription::default();
        let mut tx = transmitter_spec();
        tx.freq = NumericSweep::List(vec![2.4e9, 2.45e9]);
        tx.gain = NumericSweep::List(vec![10.0, 20.0, 30.0]);
        desc.transmitters.push(tx);
        desc.receivers.push(receiver_spec());

        let table = build_variations(&desc).unwrap();
        assert_eq!(table.variations.len(), 6);
        assert_eq!(table.mode, OperationMode::TransmitAndReceive);
        assert_eq!(table.num_transmitters, 1);
        assert_eq!(table.num_receivers, 1);
    }

    #[test]
    fn row_order_is_nested_loop_and_deterministic() {
        let mut desc = RunDescription::default();
        let mut tx = transmitter_spec();
        tx.freq = NumericSweep::List(vec![2.4e9, 2.45e9]);
        tx.gain = NumericSweep::List(vec![10.0, 20.0]);
        desc.transmitters.push(tx);

        let table = build_variations(&desc).unwrap();
        let pairs: Vec<(f64, f64)> = table
            .variations
            .iter()
            .map(|v| (v.transmitters[0].freq, v.transmitters[0].gain))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (2.4e9, 10.0),
                (2.4e9, 20.0),
                (2.45e9, 10.0),
                (2.45e9, 20.0)
            ]
        );

        let again = build_variations(&desc).unwrap();
        assert_eq!(table.variations, again.variations);
    }

    #[test]
    fn two_transmitters_do_not_collide() {
        let mut desc = RunDescription::default();
        let mut tx1 = transmitter_spec();
        tx1.gain = NumericSweep::List(vec![10.0, 20.0]);
        let mut tx2 = transmitter_spec();
        tx2.gain = NumericSweep::Single(5.0);
        desc.transmitters.push(tx1);
        desc.transmitters.push(tx2);

        let table = build_variations(&desc).unwrap();
        assert_eq!(table.variations.len(), 2);
        for v in &table.variations {
            assert_eq!(v.transmitters[1].gain, 5.0);
        }
    }
}
