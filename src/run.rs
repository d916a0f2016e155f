//! The execution orchestrator: walks the variation table in order, builds
//! the device configs for each row, resolves rates and clocks, then spawns
//! and joins the emitter/capture task set under a fresh rendezvous.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use tracing::{error, info};

use crate::capture::run_capture;
use crate::config::RunDescription;
use crate::device::{ReceiverConfig, TransmitterConfig};
use crate::emit::run_emitter;
use crate::errors::{Result, SweepError};
use crate::hardware::{CaptureControl, EmitterControl};
use crate::rate;
use crate::sweep::{build_variations, OperationMode, Variation};
use crate::sync::{AcquisitionSync, POLL_INTERVAL};
use crate::waveform::WaveformDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOrder {
    /// All emitters and receivers of a variation run concurrently.
    Parallel,
    /// One emitter at a time, each with the full receiver set. Emitters
    /// sharing a receiver set are never active simultaneously.
    Sequential,
}

impl ExecutionOrder {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "parallel" => Ok(ExecutionOrder::Parallel),
            "sequential" => Ok(ExecutionOrder::Sequential),
            other => Err(SweepError::UnsupportedMode(format!(
                "unknown tx execution order '{other}'"
            ))),
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub variations: usize,
    pub failed_variations: usize,
    pub total_rx_bytes: u64,
    pub elapsed: Duration,
}

pub struct Runner {
    desc: RunDescription,
    emitter_hw: Arc<dyn EmitterControl>,
    capture_hw: Arc<dyn CaptureControl>,
    operator_stop: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        desc: RunDescription,
        emitter_hw: Arc<dyn EmitterControl>,
        capture_hw: Arc<dyn CaptureControl>,
    ) -> Self {
        Self {
            desc,
            emitter_hw,
            capture_hw,
            operator_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag raised by the operator interrupt (Ctrl-C). In transmit-only
    /// mode it substitutes for the missing capture-side latch.
    pub fn operator_stop(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.operator_stop)
    }

    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let order = ExecutionOrder::parse(&self.desc.general.execution_order)?;
        if !self.desc.general.saving_format.eq_ignore_ascii_case("sigmf") {
            return Err(SweepError::UnsupportedMode(format!(
                "unsupported capture saving format '{}'",
                self.desc.general.saving_format
            )));
        }

        let table = build_variations(&self.desc)?;
        info!(
            variations = table.variations.len(),
            mode = %table.mode,
            transmitters = table.num_transmitters,
            receivers = table.num_receivers,
            "variation table built"
        );

        let (bytes_tx, bytes_rx) = unbounded();
        let settle = Duration::from_millis(self.desc.general.settle_delay_ms);
        let mut failed = 0usize;
        for (idx, variation) in table.variations.iter().enumerate() {
            info!(variation = idx, "starting variation");
            match self.run_variation(idx, variation, table.mode, order, settle, &bytes_tx) {
                Ok(()) => {}
                Err(e) if !e.is_fatal() && idx > 0 => {
                    error!(variation = idx, %e, "variation failed, continuing with the next");
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
            // Hardware release latency, give the devices a moment
            thread::sleep(settle);
        }
        drop(bytes_tx);

        Ok(RunSummary {
            variations: table.variations.len(),
            failed_variations: failed,
            total_rx_bytes: bytes_rx.try_iter().sum(),
            elapsed: start.elapsed(),
        })
    }

    fn run_variation(
        &self,
        idx: usize,
        variation: &Variation,
        mode: OperationMode,
        order: ExecutionOrder,
        settle: Duration,
        bytes_tx: &Sender<u64>,
    ) -> Result<()> {
        let mut txs: Vec<TransmitterConfig> = variation
            .transmitters
            .iter()
            .enumerate()
            .map(|(k, p)| TransmitterConfig::new(&self.desc.transmitters[k], p, k + 1))
            .collect();
        let mut rxs: Vec<ReceiverConfig> = variation
            .receivers
            .iter()
            .enumerate()
            .map(|(k, p)| ReceiverConfig::new(&self.desc.receivers[k], p, &self.desc.general, k + 1))
            .collect();

        for tx in &mut txs {
            tx.waveform = Some(WaveformDescription::load(
                &self.desc.general.waveform_dir,
                &tx.waveform_name,
            )?);
        }
        rate::resolve(&mut txs, &mut rxs)?;

        match (mode, order) {
            (OperationMode::ReceiveOnly, _) => self.run_task_set(idx, &[], &rxs, mode, bytes_tx),
            (_, ExecutionOrder::Parallel) => self.run_task_set(idx, &txs, &rxs, mode, bytes_tx),
            (_, ExecutionOrder::Sequential) => {
                for (k, tx) in txs.iter().enumerate() {
                    info!(variation = idx, emitter = %tx.label(), "sequential sub-iteration");
                    self.run_task_set(idx, std::slice::from_ref(tx), &rxs, mode, bytes_tx)?;
                    if k + 1 < txs.len() {
                        thread::sleep(settle);
                    }
                }
                Ok(())
            }
        }
    }

    /// Spawn one task per device under a fresh rendezvous and join them all.
    fn run_task_set(
        &self,
        idx: usize,
        txs: &[TransmitterConfig],
        rxs: &[ReceiverConfig],
        mode: OperationMode,
        bytes_tx: &Sender<u64>,
    ) -> Result<()> {
        let sync = Arc::new(AcquisitionSync::new());
        if mode == OperationMode::ReceiveOnly {
            // No emitter exists to open the latch
            sync.allow_capture();
        }

        let mut handles = Vec::with_capacity(txs.len() + rxs.len());
        for tx in txs {
            let cfg = tx.clone();
            let hw = Arc::clone(&self.emitter_hw);
            let sync = Arc::clone(&sync);
            handles.push(thread::spawn(move || run_emitter(&cfg, hw.as_ref(), &sync)));
        }
        for rx in rxs {
            let cfg = rx.clone();
            let txs_ctx = txs.to_vec();
            let hw = Arc::clone(&self.capture_hw);
            let sync = Arc::clone(&sync);
            let bytes_tx = bytes_tx.clone();
            handles.push(thread::spawn(move || {
                run_capture(cfg, &txs_ctx, hw.as_ref(), &sync, idx, &bytes_tx)
            }));
        }

        if mode == OperationMode::TransmitOnly {
            self.operator_release(&sync);
        }

        let mut first_err: Option<SweepError> = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(variation = idx, %e, "device task failed");
                    first_err.get_or_insert(e);
                }
                Err(_) => {
                    error!(variation = idx, "device task panicked");
                    first_err.get_or_insert(SweepError::hardware("task", "device task panicked"));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Transmit-only: there is no capture task to release the emitters, the
    /// operator interrupt stands in for it.
    fn operator_release(&self, sync: &AcquisitionSync) {
        while !sync.capture_allowed() && !sync.is_aborted() {
            thread::sleep(POLL_INTERVAL);
        }
        if !sync.is_aborted() {
            info!("emission active, press Ctrl-C to stop this iteration");
            while !self.operator_stop.load(Ordering::SeqCst) && !sync.is_aborted() {
                thread::sleep(POLL_INTERVAL);
            }
            // Re-arm for the next iteration
            self.operator_stop.store(false, Ordering::SeqCst);
        }
        sync.release_emitters();
    }
}
