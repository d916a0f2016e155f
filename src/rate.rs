//! Rate and master-clock resolution for one variation. Runs exactly once per
//! variation, after waveform descriptions are attached and before any task
//! starts.

use tracing::{debug, warn};

use crate::config::RateSource;
use crate::device::{ReceiverConfig, TransmitterConfig};
use crate::errors::{Result, SweepError};

/// Master clock rates supported by the X300/X310 family. Requested sample
/// rates are derived from the clock by an even decimation factor.
pub const X3XX_CLOCK_RATES: [f64; 2] = [200e6, 184.32e6];

/// Decimation sentinel for a clock candidate with no usable even factor.
const NO_EVEN_DECIMATION: f64 = 0.0;

/// Resolve every device's rate/bandwidth, then annotate each radio's
/// connection args with the best-fit master clock.
pub fn resolve(txs: &mut [TransmitterConfig], rxs: &mut [ReceiverConfig]) -> Result<()> {
    resolve_rates(txs, rxs)?;
    resolve_clocks(txs, rxs);
    Ok(())
}

/// Rate propagation: waveform-derived transmitters take their waveform's
/// rate/bandwidth, waveform-derived receivers take the maximum across all
/// transmitters. A shared capture window has to cover the widest emitted
/// signal, so the max, not an average.
pub fn resolve_rates(txs: &mut [TransmitterConfig], rxs: &mut [ReceiverConfig]) -> Result<()> {
    for tx in txs.iter_mut() {
        if tx.rate_source == RateSource::WaveformDerived {
            let wf = tx.waveform.as_ref().ok_or_else(|| {
                SweepError::Precondition(format!(
                    "{} derives its rate from a waveform that has not been loaded",
                    tx.label()
                ))
            })?;
            tx.rate = wf.sample_rate;
            tx.bandwidth = wf.bandwidth;
        }
    }

    let max_rate = txs.iter().map(|t| t.rate).fold(0.0, f64::max);
    let max_bandwidth = txs.iter().map(|t| t.bandwidth).fold(0.0, f64::max);

    for rx in rxs.iter_mut() {
        if rx.rate_source == RateSource::WaveformDerived {
            if txs.is_empty() {
                return Err(SweepError::Configuration(format!(
                    "{} derives its rate from transmitter waveforms but the run has no transmitters",
                    rx.label()
                )));
            }
            rx.rate = max_rate;
            rx.bandwidth = max_bandwidth;
        }
    }
    Ok(())
}

fn round_up_to_even(f: f64) -> f64 {
    (f / 2.0).ceil() * 2.0
}

/// The decimation factor a candidate clock would use for the requested rate:
/// the exact ratio when it is an integer, otherwise the nearest ratio rounded
/// up to an even factor. Below 1 the smallest valid even factor (2) is used;
/// between 1 and 2 there is no valid even factor at all.
fn decimation_for(candidate: f64, requested: f64) -> f64 {
    let ratio = candidate / requested;
    let rounded = ratio.round();
    if rounded < 1.0 {
        2.0
    } else if rounded < 2.0 {
        NO_EVEN_DECIMATION
    } else if (ratio - rounded).abs() < 1e-9 {
        rounded
    } else {
        round_up_to_even(rounded)
    }
}

/// Pick the candidate clock whose decimation deviates least from the true
/// clock/rate ratio. Ties keep the earliest candidate.
pub fn best_clock_rate(requested: f64, candidates: &[f64]) -> f64 {
    let mut best = candidates[0];
    let mut best_dev = f64::INFINITY;
    for &candidate in candidates {
        let ratio = candidate / requested;
        let dev = (decimation_for(candidate, requested) - ratio).abs();
        if dev < best_dev {
            best = candidate;
            best_dev = dev;
        }
    }
    best
}

/// Append the master-clock annotation to every radio of a known hardware
/// family. Unknown families keep their default clock, that is not an error.
pub fn resolve_clocks(txs: &mut [TransmitterConfig], rxs: &mut [ReceiverConfig]) {
    for (label, model, rate, args) in txs
        .iter_mut()
        .map(|t| (t.label(), t.hardware_model.clone(), t.rate, &mut t.args))
        .chain(
            rxs.iter_mut()
                .map(|r| (r.label(), r.hardware_model.clone(), r.rate, &mut r.args)),
        )
    {
        if model.contains("X3") {
            let clock = best_clock_rate(rate, &X3XX_CLOCK_RATES);
            if clock == 184.32e6 {
                args.push_str(",master_clock_rate=184.32e6");
            } else {
                args.push_str(",master_clock_rate=200e6");
            }
            debug!(%label, rate, clock, "selected master clock");
        } else {
            warn!(%label, %model, "no clock table for this hardware model, keeping default clock");
        }
    }
}
