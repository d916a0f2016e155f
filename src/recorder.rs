//! Persists captured records in SigMF form: an interleaved little-endian
//! f32 IQ `.sigmf-data` file and the matching `.sigmf-meta` JSON document.

use chrono::Utc;
use num_complex::Complex;
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use tracing::debug;

use crate::device::{ReceiverConfig, TransmitterConfig};
use crate::errors::{Result, SweepError};

/// Write one record's samples and metadata. Returns the number of data
/// bytes written.
pub fn write_sigmf(
    rx: &ReceiverConfig,
    txs: &[TransmitterConfig],
    variation: usize,
    record: u32,
    samples: &[Complex<f32>],
) -> Result<u64> {
    fs::create_dir_all(&rx.output_dir)?;
    let prefix = format!("{}-var{variation}-rec{record}", rx.label().to_lowercase());

    let data_path = rx.output_dir.join(format!("{prefix}.sigmf-data"));
    let mut writer = BufWriter::new(File::create(&data_path)?);
    for s in samples {
        writer.write_all(&s.re.to_le_bytes())?;
        writer.write_all(&s.im.to_le_bytes())?;
    }
    writer.flush()?;
    let nbytes = (samples.len() * 2 * std::mem::size_of::<f32>()) as u64;

    // Prefer the coerced values the hardware reported over what we asked for
    let (freq, rate) = match rx.coerced {
        Some(c) => (c.freq, c.rate),
        None => (rx.freq, rx.rate),
    };
    let emitters: Vec<_> = txs
        .iter()
        .map(|tx| {
            json!({
                "id": tx.label(),
                "waveform": tx.waveform_name,
                "standard": tx.waveform.as_ref().map(|w| w.standard.clone()).unwrap_or_default(),
                "freq": tx.freq,
                "rate": tx.rate,
                "bandwidth": tx.bandwidth,
                "gain": tx.gain,
            })
        })
        .collect();
    let meta = json!({
        "global": {
            "core:datatype": "cf32_le",
            "core:sample_rate": rate,
            "core:version": "1.0.0",
            "core:description": prefix,
            "emitters": emitters,
        },
        "captures": [{
            "core:sample_start": 0,
            "core:frequency": freq,
            "core:datetime": Utc::now().to_rfc3339(),
        }],
        "annotations": [{
            "core:sample_start": 0,
            "core:sample_count": samples.len(),
            "core:freq_lower_edge": freq - rate / 2.0,
            "core:freq_upper_edge": freq + rate / 2.0,
        }],
    });
    let meta_path = rx.output_dir.join(format!("{prefix}.sigmf-meta"));
    let text = serde_json::to_string_pretty(&meta)
        .map_err(|e| SweepError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(&meta_path, text)?;

    debug!(data = %data_path.display(), bytes = nbytes, "record persisted");
    Ok(nbytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{receiver_spec, transmitter_spec};
    use crate::config::RunDescription;
    use crate::device::{ReceiverConfig, TransmitterConfig};
    use crate::sweep::build_variations;

    #[test]
    fn data_and_meta_land_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut desc = RunDescription::default();
        desc.general.output_dir = dir.path().to_path_buf();
        desc.transmitters.push(transmitter_spec());
        desc.receivers.push(receiver_spec());
        let table = build_variations(&desc).unwrap();
        let v = &table.variations[0];
        let tx = TransmitterConfig::new(&desc.transmitters[0], &v.transmitters[0], 1);
        let rx = ReceiverConfig::new(&desc.receivers[0], &v.receivers[0], &desc.general, 1);

        let samples = vec![Complex::new(0.5f32, -0.5f32); 256];
        let nbytes = write_sigmf(&rx, &[tx], 3, 0, &samples).unwrap();
        assert_eq!(nbytes, 256 * 8);

        let data = fs::read(dir.path().join("rx1-var3-rec0.sigmf-data")).unwrap();
        assert_eq!(data.len(), 256 * 8);

        let meta: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("rx1-var3-rec0.sigmf-meta")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["global"]["core:datatype"], "cf32_le");
        assert_eq!(meta["annotations"][0]["core:sample_count"], 256);
        assert_eq!(meta["global"]["emitters"][0]["id"], "Tx1");
    }
}
