//! The emitter task: configure the radio, start waveform playback, open the
//! capture latch, then keep emitting until released.

use tracing::{debug, info};

use crate::device::TransmitterConfig;
use crate::errors::Result;
use crate::hardware::EmitterControl;
use crate::sync::AcquisitionSync;

pub fn run_emitter(
    cfg: &TransmitterConfig,
    hw: &dyn EmitterControl,
    sync: &AcquisitionSync,
) -> Result<()> {
    match emit(cfg, hw, sync) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Unblock any capture task still waiting on the go latch
            sync.abort();
            Err(e)
        }
    }
}

fn emit(cfg: &TransmitterConfig, hw: &dyn EmitterControl, sync: &AcquisitionSync) -> Result<()> {
    let label = cfg.label();
    let coerced = hw.configure(cfg)?;
    info!(
        %label,
        freq = coerced.freq,
        rate = coerced.rate,
        gain = coerced.gain,
        waveform = %cfg.waveform_name,
        "emitter configured"
    );
    hw.start_playback(cfg)?;
    // Signal is on the air, receivers may begin
    sync.allow_capture();
    debug!(%label, "playback running, waiting for release");
    sync.wait_release();
    info!(%label, "stopping playback");
    hw.stop_playback(cfg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::transmitter_spec;
    use crate::config::RunDescription;
    use crate::hardware::SimRadio;
    use crate::sweep::build_variations;
    use std::sync::Arc;

    fn tx_config() -> TransmitterConfig {
        let mut desc = RunDescription::default();
        desc.transmitters.push(transmitter_spec());
        let table = build_variations(&desc).unwrap();
        TransmitterConfig::new(&desc.transmitters[0], &table.variations[0].transmitters[0], 1)
    }

    #[test]
    fn emitter_opens_latch_and_waits_for_release() {
        let cfg = tx_config();
        let radio = SimRadio::new();
        let sync = Arc::new(AcquisitionSync::new());
        // pre-release so the task does not block the test
        sync.release_emitters();
        run_emitter(&cfg, &radio, &sync).unwrap();
        assert!(sync.capture_allowed());
    }

    #[test]
    fn failed_configure_aborts_the_variation() {
        let cfg = tx_config();
        let radio = SimRadio::failing("Tx1", 0);
        let sync = AcquisitionSync::new();
        assert!(run_emitter(&cfg, &radio, &sync).is_err());
        assert!(sync.is_aborted());
        assert!(!sync.capture_allowed());
    }
}
