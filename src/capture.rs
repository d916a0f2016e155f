//! The capture task: configure the radio, wait for the go latch, record the
//! configured number of records, report captured bytes, release the
//! emitters.

use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::device::{ReceiverConfig, TransmitterConfig};
use crate::errors::{Result, SweepError};
use crate::hardware::CaptureControl;
use crate::recorder;
use crate::sync::AcquisitionSync;

pub fn run_capture(
    mut cfg: ReceiverConfig,
    txs: &[TransmitterConfig],
    hw: &dyn CaptureControl,
    sync: &AcquisitionSync,
    variation: usize,
    bytes_tx: &Sender<u64>,
) -> Result<()> {
    let result = capture_records(&mut cfg, txs, hw, sync, variation, bytes_tx);
    // The first finisher releases the emitters; doing it on the failure path
    // too means a broken receiver can never strand them polling.
    sync.release_emitters();
    result
}

fn capture_records(
    cfg: &mut ReceiverConfig,
    txs: &[TransmitterConfig],
    hw: &dyn CaptureControl,
    sync: &AcquisitionSync,
    variation: usize,
    bytes_tx: &Sender<u64>,
) -> Result<()> {
    let label = cfg.label();
    let coerced = hw.configure(cfg)?;
    cfg.coerced = Some(coerced);
    info!(
        %label,
        freq = coerced.freq,
        rate = coerced.rate,
        gain = coerced.gain,
        "receiver configured, waiting for emitter"
    );

    if !sync.wait_capture_go() {
        return Err(SweepError::hardware(
            label,
            "emitter failed before capture could start",
        ));
    }

    let num_samps = cfg.num_samps();
    let mut nbytes = 0u64;
    for record in 0..cfg.records {
        let samples = hw.capture_record(cfg, num_samps)?;
        nbytes += (samples.len() * 2 * std::mem::size_of::<f32>()) as u64;
        info!(%label, record, samples = samples.len(), "captured record");
        // Persist failures are reported but do not invalidate the capture
        if let Err(e) = recorder::write_sigmf(cfg, txs, variation, record, &samples) {
            warn!(%label, record, %e, "failed to persist record");
        }
    }
    bytes_tx.send(nbytes).ok();
    info!(%label, bytes = nbytes, "capture complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::receiver_spec;
    use crate::config::RunDescription;
    use crate::hardware::SimRadio;
    use crate::sweep::build_variations;
    use crossbeam_channel::unbounded;

    fn rx_config(dir: &std::path::Path) -> ReceiverConfig {
        let mut desc = RunDescription::default();
        desc.general.output_dir = dir.to_path_buf();
        desc.general.records_per_capture = 2;
        desc.receivers.push(receiver_spec());
        let table = build_variations(&desc).unwrap();
        ReceiverConfig::new(
            &desc.receivers[0],
            &table.variations[0].receivers[0],
            &desc.general,
            1,
        )
    }

    #[test]
    fn capture_reports_bytes_and_releases_emitters() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = rx_config(dir.path());
        let expected = cfg.num_samps() as u64 * 8 * cfg.records as u64;
        let radio = SimRadio::new();
        let sync = AcquisitionSync::new();
        sync.allow_capture();
        let (tx, rx) = unbounded();

        run_capture(cfg, &[], &radio, &sync, 0, &tx).unwrap();
        assert!(sync.emitters_released());
        assert_eq!(rx.try_recv().unwrap(), expected);
    }

    #[test]
    fn failed_capture_still_releases_emitters() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = rx_config(dir.path());
        let radio = SimRadio::failing("Rx1", 0);
        let sync = AcquisitionSync::new();
        sync.allow_capture();
        let (tx, rx) = unbounded();

        assert!(run_capture(cfg, &[], &radio, &sync, 0, &tx).is_err());
        assert!(sync.emitters_released());
        // the failed variation contributes nothing to the telemetry
        assert!(rx.try_recv().is_err());
    }
}
