//! Waveform description loading. Each waveform identifier resolves to a
//! sidecar file next to the waveform data: either `<name>.json` or a
//! key/value `<name>.csv` as written by the MATLAB/IEEE generators.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{Result, SweepError};

/// The subset of a waveform's description the sweep needs: its occupied
/// bandwidth and IQ sample rate, plus labelling fields carried into the
/// capture metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformDescription {
    pub standard: String,
    pub bandwidth: f64,
    pub sample_rate: f64,
    pub n_frames: u32,
    pub modulation: String,
    pub link_direction: String,
}

impl Default for WaveformDescription {
    fn default() -> Self {
        Self {
            standard: String::new(),
            bandwidth: 0.0,
            sample_rate: 0.0,
            n_frames: 1,
            modulation: String::new(),
            link_direction: String::new(),
        }
    }
}

impl WaveformDescription {
    /// Resolve a waveform identifier against the waveform directory.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let json_path = dir.join(format!("{name}.json"));
        if json_path.exists() {
            let text = fs::read_to_string(&json_path)?;
            let mut wf: WaveformDescription = serde_json::from_str(&text).map_err(|e| {
                SweepError::Configuration(format!("{}: {e}", json_path.display()))
            })?;
            wf.finish(name)?;
            return Ok(wf);
        }
        let csv_path = dir.join(format!("{name}.csv"));
        if csv_path.exists() {
            let text = fs::read_to_string(&csv_path)?;
            let mut wf = Self::from_csv(&text, &csv_path.display().to_string())?;
            wf.finish(name)?;
            return Ok(wf);
        }
        Err(SweepError::Configuration(format!(
            "waveform description '{name}' not found in {}",
            dir.display()
        )))
    }

    /// Key/value rows, `#` starts a comment, `;` or `,` separates.
    fn from_csv(text: &str, origin: &str) -> Result<Self> {
        let mut wf = WaveformDescription::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(';')
                .or_else(|| line.split_once(','))
                .ok_or_else(|| {
                    SweepError::Configuration(format!("{origin}: malformed row '{line}'"))
                })?;
            let value = value.trim();
            match key.trim() {
                "standard" => wf.standard = value.to_owned(),
                "bandwidth" => wf.bandwidth = parse_freq(value)?,
                "rate" | "sample_rate" => wf.sample_rate = parse_freq(value)?,
                "n_frames" => {
                    wf.n_frames = value.parse().map_err(|_| {
                        SweepError::Configuration(format!(
                            "{origin}: bad frame count '{value}'"
                        ))
                    })?
                }
                "modulation" => wf.modulation = value.to_owned(),
                "link_direction" => wf.link_direction = value.to_owned(),
                // generator sidecars carry extra fields we don't need
                _ => {}
            }
        }
        Ok(wf)
    }

    fn finish(&mut self, name: &str) -> Result<()> {
        if self.standard.is_empty() {
            self.standard = name.to_owned();
        }
        if self.bandwidth <= 0.0 {
            return Err(SweepError::Configuration(format!(
                "waveform '{name}' declares no bandwidth"
            )));
        }
        // IEEE-style sidecars omit the rate, sampling rate equals bandwidth
        if self.sample_rate <= 0.0 {
            self.sample_rate = self.bandwidth;
        }
        Ok(())
    }
}

/// Parse a frequency value with an optional `k`/`M`/`G` suffix.
pub fn parse_freq(s: &str) -> Result<f64> {
    let s = s.trim();
    let (digits, mult) = match s.as_bytes().last() {
        Some(b'k') => (&s[..s.len() - 1], 1e3),
        Some(b'M') => (&s[..s.len() - 1], 1e6),
        Some(b'G') => (&s[..s.len() - 1], 1e9),
        _ => (s, 1.0),
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|v| v * mult)
        .map_err(|_| SweepError::Configuration(format!("bad frequency value '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn freq_suffixes() {
        assert_eq!(parse_freq("10k").unwrap(), 10e3);
        assert_eq!(parse_freq("20M").unwrap(), 20e6);
        assert_eq!(parse_freq("2.4G").unwrap(), 2.4e9);
        assert_eq!(parse_freq("30720000").unwrap(), 30.72e6);
        assert!(parse_freq("fast").is_err());
    }

    #[test]
    fn loads_csv_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("wifi_mcs7.csv")).unwrap();
        writeln!(f, "# generator output").unwrap();
        writeln!(f, "standard;802.11ax").unwrap();
        writeln!(f, "bandwidth;20M").unwrap();
        writeln!(f, "modulation;64QAM").unwrap();
        drop(f);

        let wf = WaveformDescription::load(dir.path(), "wifi_mcs7").unwrap();
        assert_eq!(wf.standard, "802.11ax");
        assert_eq!(wf.bandwidth, 20e6);
        // no rate row: sampling rate falls back to the bandwidth
        assert_eq!(wf.sample_rate, 20e6);
        assert_eq!(wf.n_frames, 1);
    }

    #[test]
    fn loads_json_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("nr_tm31.json"),
            r#"{"standard": "NR", "bandwidth": 40e6, "sample_rate": 61.44e6, "n_frames": 2}"#,
        )
        .unwrap();

        let wf = WaveformDescription::load(dir.path(), "nr_tm31").unwrap();
        assert_eq!(wf.standard, "NR");
        assert_eq!(wf.sample_rate, 61.44e6);
        assert_eq!(wf.n_frames, 2);
    }

    #[test]
    fn unresolvable_identifier_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            WaveformDescription::load(dir.path(), "missing"),
            Err(SweepError::Configuration(_))
        ));
    }

    #[test]
    fn missing_bandwidth_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), r#"{"standard": "NR"}"#).unwrap();
        assert!(WaveformDescription::load(dir.path(), "bad").is_err());
    }
}
